pub mod colorspace;
pub mod display;
pub mod factors;
pub mod score;
pub mod timeline;
pub mod trial;

pub use colorspace::ColorWheel;
pub use display::Display;
pub use factors::{FactorSet, ToneOnset, TrialFactors, Validity, Warning};
pub use score::{ResponseScore, score};
pub use timeline::{Anchor, Timeline, TimelineError};
pub use trial::{ResponseInput, TrialRecord, TrialSetup, TrialState};

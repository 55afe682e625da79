pub mod mask;
pub mod scene;
pub mod stimuli;
pub mod text;
pub mod wheel;

pub use mask::{generate_mask, MaskError};
pub use scene::SceneRenderer;
pub use text::TextRenderer;
pub use wheel::{render_wheel, WheelGeometry};

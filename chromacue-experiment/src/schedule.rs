//! Per-trial timeline construction.

use chromacue_core::{Anchor, Timeline, TimelineError, ToneOnset, TrialFactors};

use crate::config::ExperimentConfig;

pub const PLAY_TONE: &str = "play_tone";
pub const TARGET_ON: &str = "target_on";
pub const TARGET_OFF: &str = "target_off";
pub const MASK_ON: &str = "mask_on";
pub const MASK_OFF: &str = "mask_off";
pub const RESPONSE_PERIOD: &str = "response_period";

/// Builds the event timeline for one trial from its factor levels. Trials
/// without a tone never register `play_tone`; the runner guards on the
/// tone-onset factor before polling it.
pub fn build_timeline(
    config: &ExperimentConfig,
    factors: &TrialFactors,
) -> Result<Timeline, TimelineError> {
    let mut tl = Timeline::new();

    match factors.tone_onset {
        ToneOnset::NoTone => {}
        ToneOnset::TrialStart => tl.add(PLAY_TONE, 0, Anchor::TrialStart)?,
        ToneOnset::PreTarget => tl.add(
            PLAY_TONE,
            factors.foreperiod_ms.saturating_sub(config.tone_lead_ms),
            Anchor::TrialStart,
        )?,
    }

    tl.add(TARGET_ON, factors.foreperiod_ms, Anchor::TrialStart)?;
    tl.add(TARGET_OFF, factors.target_duration_ms, Anchor::after(TARGET_ON))?;
    tl.add(MASK_ON, config.target_mask_gap_ms, Anchor::after(TARGET_OFF))?;
    tl.add(MASK_OFF, config.mask_duration_ms, Anchor::after(MASK_ON))?;
    tl.add(RESPONSE_PERIOD, config.mask_wheel_gap_ms, Anchor::after(MASK_OFF))?;

    Ok(tl)
}

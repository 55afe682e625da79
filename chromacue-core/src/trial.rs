use serde::{Deserialize, Serialize};

use crate::factors::{ToneOnset, TrialFactors, Validity, Warning};

/// Per-trial presentation states, visited strictly in this order. No state
/// is revisited within a trial; the only branches are the conditional gap
/// states (skipped when the configured asynchrony is zero) and the
/// feedback/timeout split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    /// Warning cue on screen; key presses are ignored until the gate opens.
    CueGate,
    /// Warning cue still on screen; any key starts the trial clock.
    CueReady,
    Fixation,
    Target,
    /// Blank between target offset and mask onset.
    TargetMaskGap,
    Mask,
    /// Blank between mask offset and wheel onset.
    MaskWheelGap,
    Response,
    Feedback,
    TimeoutNotice,
    Complete,
}

/// Everything randomised or resolved while preparing one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSetup {
    pub factors: TrialFactors,
    pub wheel_rotation_deg: u16,
    pub target_angle_deg: f64,
    pub target_color: [u8; 3],
    /// Minimum wait under the warning cue before the start key is honoured.
    pub gate_ms: u64,
}

/// A colour-wheel click mapped back to wheel coordinates by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseInput {
    pub angle_deg: f64,
    pub color: [u8; 3],
}

/// One row handed to the result writer per completed trial. The field set
/// is fixed for downstream compatibility; missing responses serialise the
/// three response fields as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub block_num: usize,
    pub trial_num: usize,
    pub practicing: bool,
    pub warning_type: Warning,
    pub warning_validity: Validity,
    pub foreperiod: u64,
    pub tone_onset: ToneOnset,
    pub target_duration: u64,
    pub target_colour: [u8; 3],
    pub response_colour: Option<[u8; 3]>,
    pub response_angular_error: Option<f64>,
    pub response_time: Option<f64>,
}

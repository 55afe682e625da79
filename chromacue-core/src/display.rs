/// What the presentation surface should show this frame.
///
/// Produced by the trial runner, consumed by the scene renderer. Carries
/// plain data only; the renderer owns the pixmaps (mask, wheel) it prepared
/// for the current trial.
#[derive(Debug, Clone, PartialEq)]
pub enum Display {
    BlockIntro {
        block_num: usize,
        blocks: usize,
        practicing: bool,
    },
    Cue {
        label: &'static str,
    },
    Blank,
    Fixation,
    Target {
        color: [u8; 3],
    },
    Mask,
    Wheel,
    Feedback {
        target: [u8; 3],
        response: [u8; 3],
        accuracy_pct: f64,
    },
    TimeoutNotice,
    Done,
}

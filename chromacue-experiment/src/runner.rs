use chromacue_core::{
    ColorWheel, Display, FactorSet, ResponseInput, ResponseScore, Timeline, TrialFactors,
    TrialRecord, TrialSetup, TrialState, score,
};
use chromacue_timing::Timer;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::config::ExperimentConfig;
use crate::error::RunError;
use crate::schedule::{
    MASK_OFF, MASK_ON, PLAY_TONE, RESPONSE_PERIOD, TARGET_OFF, TARGET_ON, build_timeline,
};

/// Run-wide counters, passed explicitly instead of living in globals.
/// `block_num` and `trial_num` are 1-based; `trial_num` resets per block.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub block_num: usize,
    pub trial_num: usize,
    pub practicing: bool,
}

/// Actions the shell must perform in response to an update.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerAction {
    /// Sound the alerting tone now.
    PlayTone {
        freq_hz: f32,
        duration_ms: u64,
        volume: f32,
    },
    /// A new trial was prepared; regenerate the trial visuals (mask, wheel).
    TrialPrepared(TrialSetup),
    /// A trial finished; persist its record.
    TrialComplete(TrialRecord),
    /// All blocks done.
    RunComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    BlockIntro,
    Trial,
    Done,
}

/// The trial currently in flight. Wall-clock fields are timer timestamps in
/// ns; the trial clock (t = 0) starts at the CueReady key press.
struct ActiveTrial {
    setup: TrialSetup,
    timeline: Timeline,
    state: TrialState,
    gate_opens_ns: u64,
    start_ns: Option<u64>,
    response_open_ns: Option<u64>,
    tone_played: bool,
    score: Option<ResponseScore>,
    response_color: Option<[u8; 3]>,
    response_rt_ms: Option<f64>,
    state_until_ns: Option<u64>,
}

impl ActiveTrial {
    fn elapsed_ms(&self, now_ns: u64) -> f64 {
        self.start_ns
            .map_or(0.0, |s| now_ns.saturating_sub(s) as f64 / 1e6)
    }
}

/// Frame-polled trial state machine.
///
/// The shell calls [`update`](Self::update) once per frame; every wait state
/// is a poll against the trial timeline, never a blocking sleep, so the
/// event pump stays responsive to global abort between polls.
pub struct TrialRunner<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    config: ExperimentConfig,
    factor_set: FactorSet,
    timer: T,
    rng: R,
    ctx: RunContext,
    phase: RunPhase,
    deck: Vec<TrialFactors>,
    trial: Option<ActiveTrial>,
}

impl<T, R> TrialRunner<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(config: ExperimentConfig, factor_set: FactorSet, timer: T, rng: R) -> Self {
        let phase = if config.total_blocks() == 0 {
            RunPhase::Done
        } else {
            RunPhase::BlockIntro
        };
        let practicing = config.practice_blocks > 0;
        Self {
            config,
            factor_set,
            timer,
            rng,
            ctx: RunContext {
                block_num: 1,
                trial_num: 0,
                practicing,
            },
            phase,
            deck: Vec::new(),
            trial: None,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn is_done(&self) -> bool {
        self.phase == RunPhase::Done
    }

    /// Any-key press. Dismisses the block intro (preparing the block's first
    /// trial) or, once the cue gate has opened, starts the trial clock.
    pub fn handle_key(&mut self) -> Result<Option<RunnerAction>, RunError> {
        match self.phase {
            RunPhase::BlockIntro => {
                self.phase = RunPhase::Trial;
                info!(
                    block = self.ctx.block_num,
                    practicing = self.ctx.practicing,
                    "block started"
                );
                let setup = self.prepare_trial()?;
                Ok(Some(RunnerAction::TrialPrepared(setup)))
            }
            RunPhase::Trial => {
                let now = self.timer.now();
                if let Some(trial) = self.trial.as_mut() {
                    if trial.state == TrialState::CueReady {
                        trial.start_ns = Some(now);
                        trial.state = TrialState::Fixation;
                        debug!("trial clock started");
                    }
                }
                Ok(None)
            }
            RunPhase::Done => Ok(None),
        }
    }

    /// A colour-wheel click. Ignored outside the response period.
    pub fn submit_response(&mut self, input: ResponseInput) {
        let now = self.timer.now();
        let feedback_ns = self.config.feedback_duration_ms * 1_000_000;
        if let Some(trial) = self.trial.as_mut() {
            if trial.state != TrialState::Response {
                return;
            }
            let rt_ms = trial
                .response_open_ns
                .map(|open| now.saturating_sub(open) as f64 / 1e6);
            trial.score = Some(score(trial.setup.target_angle_deg, input.angle_deg));
            trial.response_color = Some(input.color);
            trial.response_rt_ms = rt_ms;
            trial.state = TrialState::Feedback;
            trial.state_until_ns = Some(now + feedback_ns);
            info!(angle = input.angle_deg, rt_ms = ?rt_ms, "response recorded");
        }
    }

    /// One poll of the trial timeline. Processes every state boundary the
    /// clock has passed since the last call.
    pub fn update(&mut self) -> Result<Vec<RunnerAction>, RunError> {
        let mut actions = Vec::new();
        if self.phase != RunPhase::Trial {
            return Ok(actions);
        }
        let now = self.timer.now();
        let mut finished = false;

        if let Some(trial) = self.trial.as_mut() {
            loop {
                match trial.state {
                    TrialState::CueGate => {
                        if now >= trial.gate_opens_ns {
                            trial.state = TrialState::CueReady;
                            continue;
                        }
                    }
                    TrialState::CueReady => {}
                    TrialState::Fixation => {
                        let elapsed = trial.elapsed_ms(now);
                        if trial.timeline.contains(PLAY_TONE)
                            && !trial.tone_played
                            && !trial.timeline.before(PLAY_TONE, elapsed)?
                        {
                            trial.tone_played = true;
                            actions.push(RunnerAction::PlayTone {
                                freq_hz: self.config.tone_freq_hz,
                                duration_ms: self.config.tone_duration_ms,
                                volume: self.config.tone_volume,
                            });
                            debug!(elapsed_ms = elapsed, "tone fired");
                        }
                        if !trial.timeline.before(TARGET_ON, elapsed)? {
                            trial.state = TrialState::Target;
                            continue;
                        }
                    }
                    TrialState::Target => {
                        if !trial.timeline.before(TARGET_OFF, trial.elapsed_ms(now))? {
                            trial.state = if self.config.target_mask_gap_ms > 0 {
                                TrialState::TargetMaskGap
                            } else {
                                TrialState::Mask
                            };
                            continue;
                        }
                    }
                    TrialState::TargetMaskGap => {
                        if !trial.timeline.before(MASK_ON, trial.elapsed_ms(now))? {
                            trial.state = TrialState::Mask;
                            continue;
                        }
                    }
                    TrialState::Mask => {
                        if !trial.timeline.before(MASK_OFF, trial.elapsed_ms(now))? {
                            if self.config.mask_wheel_gap_ms > 0 {
                                trial.state = TrialState::MaskWheelGap;
                            } else {
                                trial.state = TrialState::Response;
                                trial.response_open_ns = Some(now);
                            }
                            continue;
                        }
                    }
                    TrialState::MaskWheelGap => {
                        if !trial
                            .timeline
                            .before(RESPONSE_PERIOD, trial.elapsed_ms(now))?
                        {
                            trial.state = TrialState::Response;
                            trial.response_open_ns = Some(now);
                            continue;
                        }
                    }
                    TrialState::Response => {
                        let window_ns = self.config.response_window_ms * 1_000_000;
                        if let Some(open) = trial.response_open_ns {
                            if now.saturating_sub(open) >= window_ns {
                                trial.score =
                                    Some(ResponseScore::timeout(trial.setup.target_angle_deg));
                                trial.state = TrialState::TimeoutNotice;
                                trial.state_until_ns =
                                    Some(now + self.config.feedback_duration_ms * 1_000_000);
                                info!("response window expired");
                                continue;
                            }
                        }
                    }
                    TrialState::Feedback | TrialState::TimeoutNotice => {
                        if let Some(until) = trial.state_until_ns {
                            if now >= until {
                                trial.state = TrialState::Complete;
                                continue;
                            }
                        }
                    }
                    TrialState::Complete => {
                        finished = true;
                    }
                }
                break;
            }
        }

        if finished {
            self.complete_trial(&mut actions)?;
        }
        Ok(actions)
    }

    /// What the surface should show this frame.
    pub fn display(&self) -> Display {
        match self.phase {
            RunPhase::BlockIntro => Display::BlockIntro {
                block_num: self.ctx.block_num,
                blocks: self.config.total_blocks(),
                practicing: self.ctx.practicing,
            },
            RunPhase::Done => Display::Done,
            RunPhase::Trial => match self.trial.as_ref() {
                None => Display::Blank,
                Some(trial) => match trial.state {
                    TrialState::CueGate | TrialState::CueReady => Display::Cue {
                        label: trial
                            .setup
                            .factors
                            .warning
                            .cue_label(trial.setup.factors.warning_validity),
                    },
                    TrialState::Fixation => Display::Fixation,
                    TrialState::Target => Display::Target {
                        color: trial.setup.target_color,
                    },
                    TrialState::TargetMaskGap
                    | TrialState::MaskWheelGap
                    | TrialState::Complete => Display::Blank,
                    TrialState::Mask => Display::Mask,
                    TrialState::Response => Display::Wheel,
                    TrialState::Feedback => match (&trial.score, trial.response_color) {
                        (Some(s), Some(color)) if !s.is_timeout() => Display::Feedback {
                            target: trial.setup.target_color,
                            response: color,
                            accuracy_pct: s.accuracy_pct.unwrap_or(0.0),
                        },
                        _ => Display::TimeoutNotice,
                    },
                    TrialState::TimeoutNotice => Display::TimeoutNotice,
                },
            },
        }
    }

    fn draw_factors(&mut self) -> TrialFactors {
        if self.deck.is_empty() {
            self.deck = self.factor_set.crossing();
            self.deck.shuffle(&mut self.rng);
            debug!(len = self.deck.len(), "factor deck reshuffled");
        }
        // Deck is never empty here: the crossing of non-empty level sets
        // has at least one cell.
        self.deck.pop().unwrap_or(TrialFactors {
            tone_onset: chromacue_core::ToneOnset::NoTone,
            foreperiod_ms: 400,
            warning: chromacue_core::Warning::Short,
            warning_validity: chromacue_core::Validity::Valid,
            target_duration_ms: 33,
        })
    }

    fn prepare_trial(&mut self) -> Result<TrialSetup, RunError> {
        let factors = self.draw_factors();
        let timeline = build_timeline(&self.config, &factors)?;

        let wheel_rotation_deg = self.rng.random_range(0..360u16);
        let target_angle_deg = self.rng.random_range(0..360u32) as f64;
        let wheel = ColorWheel::with_rotation(wheel_rotation_deg);
        let target_color = wheel.color_from_angle(target_angle_deg);

        let (lo, hi) = self.config.warn_gate_range_ms;
        let gate_ms = self.rng.random_range(lo..=hi);

        let setup = TrialSetup {
            factors,
            wheel_rotation_deg,
            target_angle_deg,
            target_color,
            gate_ms,
        };

        self.ctx.trial_num += 1;
        let now = self.timer.now();
        debug!(
            block = self.ctx.block_num,
            trial = self.ctx.trial_num,
            ?factors,
            gate_ms,
            "trial prepared"
        );

        self.trial = Some(ActiveTrial {
            setup: setup.clone(),
            timeline,
            state: TrialState::CueGate,
            gate_opens_ns: now + gate_ms * 1_000_000,
            start_ns: None,
            response_open_ns: None,
            tone_played: false,
            score: None,
            response_color: None,
            response_rt_ms: None,
            state_until_ns: None,
        });
        Ok(setup)
    }

    fn complete_trial(&mut self, actions: &mut Vec<RunnerAction>) -> Result<(), RunError> {
        let Some(trial) = self.trial.take() else {
            return Ok(());
        };

        let angular_error = trial.score.as_ref().and_then(|s| s.angular_error);
        let record = TrialRecord {
            block_num: self.ctx.block_num,
            trial_num: self.ctx.trial_num,
            practicing: self.ctx.practicing,
            warning_type: trial.setup.factors.warning,
            warning_validity: trial.setup.factors.warning_validity,
            foreperiod: trial.setup.factors.foreperiod_ms,
            tone_onset: trial.setup.factors.tone_onset,
            target_duration: trial.setup.factors.target_duration_ms,
            target_colour: trial.setup.target_color,
            response_colour: trial.response_color,
            response_angular_error: angular_error,
            response_time: trial.response_rt_ms,
        };
        info!(
            block = record.block_num,
            trial = record.trial_num,
            timed_out = record.response_colour.is_none(),
            "trial complete"
        );
        actions.push(RunnerAction::TrialComplete(record));

        if self.ctx.trial_num < self.config.trials_in_block(self.ctx.block_num) {
            let setup = self.prepare_trial()?;
            actions.push(RunnerAction::TrialPrepared(setup));
        } else if self.ctx.block_num < self.config.total_blocks() {
            self.ctx.block_num += 1;
            self.ctx.trial_num = 0;
            self.ctx.practicing = self.ctx.block_num <= self.config.practice_blocks;
            self.phase = RunPhase::BlockIntro;
        } else {
            self.phase = RunPhase::Done;
            info!("run complete");
            actions.push(RunnerAction::RunComplete);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromacue_core::{ToneOnset, Validity, Warning};
    use chromacue_timing::FrameStats;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct ManualTimer {
        now_ns: Arc<AtomicU64>,
    }

    impl ManualTimer {
        fn advance_ms(&self, ms: u64) {
            self.now_ns.fetch_add(ms * 1_000_000, Ordering::SeqCst);
        }
    }

    impl Timer for ManualTimer {
        type Timestamp = u64;
        fn now(&self) -> u64 {
            self.now_ns.load(Ordering::SeqCst)
        }
        fn elapsed(&self, ts: u64) -> Duration {
            Duration::from_nanos(self.now().saturating_sub(ts))
        }
        fn sleep(&self, _d: Duration) {}
        fn record_frame(&mut self, _d: Duration) {}
        fn frame_count(&self) -> usize {
            0
        }
        fn frame_stats(&self) -> FrameStats {
            FrameStats {
                average_frame_time_ns: 0.0,
                min_frame_time_ns: 0.0,
                max_frame_time_ns: 0.0,
                effective_fps: 0.0,
            }
        }
    }

    fn single_cell(tone: ToneOnset) -> FactorSet {
        FactorSet {
            tone_onset: vec![(tone, 1)],
            foreperiod_ms: vec![400],
            warning: vec![Warning::Short],
            warning_validity: vec![(Validity::Valid, 1)],
            target_duration_ms: vec![33],
        }
    }

    fn one_trial_config() -> ExperimentConfig {
        ExperimentConfig {
            blocks: 1,
            trials_per_block: 1,
            practice_blocks: 0,
            trials_per_practice_block: 0,
            ..Default::default()
        }
    }

    fn runner(
        config: ExperimentConfig,
        factors: FactorSet,
    ) -> (TrialRunner<ManualTimer, StdRng>, ManualTimer) {
        let timer = ManualTimer::default();
        let clock = timer.clone();
        let r = TrialRunner::new(config, factors, timer, StdRng::seed_from_u64(7));
        (r, clock)
    }

    /// Drives a freshly prepared trial up to the open response wheel.
    fn advance_to_wheel(
        r: &mut TrialRunner<ManualTimer, StdRng>,
        clock: &ManualTimer,
        setup: &TrialSetup,
    ) {
        clock.advance_ms(setup.gate_ms + 1);
        r.update().unwrap();
        r.handle_key().unwrap(); // start trial clock
        clock.advance_ms(setup.factors.foreperiod_ms + setup.factors.target_duration_ms + 200);
        r.update().unwrap();
        assert_eq!(r.display(), Display::Wheel);
    }

    #[test]
    fn full_trial_walks_the_timeline() {
        let (mut r, clock) = runner(one_trial_config(), single_cell(ToneOnset::PreTarget));
        assert!(matches!(r.display(), Display::BlockIntro { block_num: 1, .. }));

        let action = r.handle_key().unwrap().unwrap();
        let RunnerAction::TrialPrepared(setup) = action else {
            panic!("expected TrialPrepared, got {action:?}");
        };
        assert_eq!(r.display(), Display::Cue { label: "SHORT" });

        // Gate still closed: the start key is ignored.
        r.handle_key().unwrap();
        r.update().unwrap();
        assert_eq!(r.display(), Display::Cue { label: "SHORT" });

        clock.advance_ms(setup.gate_ms + 1);
        r.update().unwrap();
        r.handle_key().unwrap();
        assert_eq!(r.display(), Display::Fixation);

        // 349 ms: one ms shy of the pre-target tone.
        clock.advance_ms(349);
        assert!(r.update().unwrap().is_empty());
        assert_eq!(r.display(), Display::Fixation);

        // 350 ms: tone fires exactly once.
        clock.advance_ms(1);
        let actions = r.update().unwrap();
        assert!(matches!(actions[..], [RunnerAction::PlayTone { .. }]));
        assert!(r.update().unwrap().is_empty());

        // 400 ms: target onset.
        clock.advance_ms(50);
        r.update().unwrap();
        assert_eq!(
            r.display(),
            Display::Target {
                color: setup.target_color
            }
        );

        // 433 ms: target offset, zero-gap mask onset.
        clock.advance_ms(33);
        r.update().unwrap();
        assert_eq!(r.display(), Display::Mask);

        // 633 ms: mask offset, wheel opens.
        clock.advance_ms(200);
        r.update().unwrap();
        assert_eq!(r.display(), Display::Wheel);

        clock.advance_ms(500);
        r.submit_response(ResponseInput {
            angle_deg: setup.target_angle_deg + 30.0,
            color: [9, 9, 9],
        });
        let Display::Feedback {
            target,
            response,
            accuracy_pct,
        } = r.display()
        else {
            panic!("expected feedback, got {:?}", r.display());
        };
        assert_eq!(target, setup.target_color);
        assert_eq!(response, [9, 9, 9]);
        assert!((accuracy_pct - (1.0 - 30.0 / 360.0)).abs() < 1e-12);

        clock.advance_ms(2001);
        let actions = r.update().unwrap();
        let RunnerAction::TrialComplete(record) = &actions[0] else {
            panic!("expected TrialComplete, got {actions:?}");
        };
        assert_eq!(record.block_num, 1);
        assert_eq!(record.trial_num, 1);
        assert_eq!(record.response_angular_error, Some(30.0));
        assert_eq!(record.response_time, Some(500.0));
        assert_eq!(record.response_colour, Some([9, 9, 9]));
        assert!(matches!(actions[1], RunnerAction::RunComplete));
        assert!(r.is_done());
        assert_eq!(r.display(), Display::Done);
    }

    #[test]
    fn no_tone_trial_never_emits_play_tone() {
        let (mut r, clock) = runner(one_trial_config(), single_cell(ToneOnset::NoTone));
        let Some(RunnerAction::TrialPrepared(setup)) = r.handle_key().unwrap() else {
            panic!("expected TrialPrepared");
        };
        clock.advance_ms(setup.gate_ms + 1);
        r.update().unwrap();
        r.handle_key().unwrap();
        for _ in 0..10 {
            clock.advance_ms(100);
            let actions = r.update().unwrap();
            assert!(
                !actions
                    .iter()
                    .any(|a| matches!(a, RunnerAction::PlayTone { .. }))
            );
        }
    }

    #[test]
    fn timeout_propagates_sentinels_into_the_record() {
        let mut config = one_trial_config();
        config.response_window_ms = 1000;
        let (mut r, clock) = runner(config, single_cell(ToneOnset::NoTone));
        let Some(RunnerAction::TrialPrepared(setup)) = r.handle_key().unwrap() else {
            panic!("expected TrialPrepared");
        };
        advance_to_wheel(&mut r, &clock, &setup);

        clock.advance_ms(1000);
        r.update().unwrap();
        assert_eq!(r.display(), Display::TimeoutNotice);

        clock.advance_ms(2001);
        let actions = r.update().unwrap();
        let RunnerAction::TrialComplete(record) = &actions[0] else {
            panic!("expected TrialComplete, got {actions:?}");
        };
        assert_eq!(record.response_colour, None);
        assert_eq!(record.response_angular_error, None);
        assert_eq!(record.response_time, None);
    }

    #[test]
    fn clicks_outside_the_response_period_are_ignored() {
        let (mut r, clock) = runner(one_trial_config(), single_cell(ToneOnset::NoTone));
        let Some(RunnerAction::TrialPrepared(setup)) = r.handle_key().unwrap() else {
            panic!("expected TrialPrepared");
        };
        r.submit_response(ResponseInput {
            angle_deg: 10.0,
            color: [1, 1, 1],
        });
        assert!(matches!(r.display(), Display::Cue { .. }));

        clock.advance_ms(setup.gate_ms + 1);
        r.update().unwrap();
        r.handle_key().unwrap();
        r.submit_response(ResponseInput {
            angle_deg: 10.0,
            color: [1, 1, 1],
        });
        assert_eq!(r.display(), Display::Fixation);
    }

    #[test]
    fn practice_block_precedes_experiment_blocks() {
        let config = ExperimentConfig {
            blocks: 1,
            trials_per_block: 1,
            practice_blocks: 1,
            trials_per_practice_block: 1,
            ..Default::default()
        };
        let (mut r, clock) = runner(config, single_cell(ToneOnset::NoTone));
        assert!(matches!(
            r.display(),
            Display::BlockIntro {
                block_num: 1,
                blocks: 2,
                practicing: true
            }
        ));

        let mut records = Vec::new();
        for _ in 0..2 {
            let Some(RunnerAction::TrialPrepared(setup)) = r.handle_key().unwrap() else {
                panic!("expected TrialPrepared");
            };
            advance_to_wheel(&mut r, &clock, &setup);
            r.submit_response(ResponseInput {
                angle_deg: setup.target_angle_deg,
                color: [0, 0, 0],
            });
            clock.advance_ms(2001);
            for action in r.update().unwrap() {
                if let RunnerAction::TrialComplete(record) = action {
                    records.push(record);
                }
            }
        }

        assert_eq!(records.len(), 2);
        assert!(records[0].practicing);
        assert_eq!(records[0].block_num, 1);
        assert!(!records[1].practicing);
        assert_eq!(records[1].block_num, 2);
        assert!(r.is_done());
    }

    #[test]
    fn deck_reshuffles_and_never_runs_dry() {
        let config = ExperimentConfig {
            blocks: 1,
            trials_per_block: 3,
            practice_blocks: 0,
            trials_per_practice_block: 0,
            ..Default::default()
        };
        // A one-cell crossing forces a reshuffle on every draw.
        let (mut r, clock) = runner(config, single_cell(ToneOnset::NoTone));
        let Some(RunnerAction::TrialPrepared(mut setup)) = r.handle_key().unwrap() else {
            panic!("expected TrialPrepared");
        };
        for _ in 0..3 {
            advance_to_wheel(&mut r, &clock, &setup);
            r.submit_response(ResponseInput {
                angle_deg: 0.0,
                color: [0, 0, 0],
            });
            clock.advance_ms(2001);
            let actions = r.update().unwrap();
            if let Some(RunnerAction::TrialPrepared(next)) = actions
                .iter()
                .find(|a| matches!(a, RunnerAction::TrialPrepared(_)))
                .cloned()
            {
                setup = next;
            }
        }
        assert!(r.is_done());
    }
}

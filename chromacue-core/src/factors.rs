use serde::{Deserialize, Serialize};

/// When the alerting tone sounds, relative to the trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneOnset {
    NoTone,
    TrialStart,
    PreTarget,
}

/// Temporal cue shown before the foreperiod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    Short,
    Long,
}

/// Whether the displayed cue truthfully predicts the foreperiod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    Valid,
    Invalid,
}

impl Warning {
    /// The cue text to display under the given validity. Invalid trials
    /// show the opposite cue.
    pub fn cue_label(self, validity: Validity) -> &'static str {
        match (self, validity) {
            (Warning::Short, Validity::Valid) | (Warning::Long, Validity::Invalid) => "SHORT",
            _ => "LONG",
        }
    }
}

/// One cell of the factor crossing: the parameter values manipulated on a
/// single trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialFactors {
    pub tone_onset: ToneOnset,
    pub foreperiod_ms: u64,
    pub warning: Warning,
    pub warning_validity: Validity,
    pub target_duration_ms: u64,
}

/// Weighted factor levels. The crossing enumerates every combination of
/// levels, repeating a level as many times as its weight.
#[derive(Debug, Clone)]
pub struct FactorSet {
    pub tone_onset: Vec<(ToneOnset, usize)>,
    pub foreperiod_ms: Vec<u64>,
    pub warning: Vec<Warning>,
    pub warning_validity: Vec<(Validity, usize)>,
    pub target_duration_ms: Vec<u64>,
}

impl Default for FactorSet {
    fn default() -> Self {
        Self {
            tone_onset: vec![
                (ToneOnset::NoTone, 2),
                (ToneOnset::TrialStart, 1),
                (ToneOnset::PreTarget, 1),
            ],
            foreperiod_ms: vec![400, 1600],
            warning: vec![Warning::Short, Warning::Long],
            warning_validity: vec![(Validity::Valid, 3), (Validity::Invalid, 1)],
            target_duration_ms: vec![33, 84],
        }
    }
}

impl FactorSet {
    /// The full weighted crossing, in deterministic order. Callers shuffle.
    pub fn crossing(&self) -> Vec<TrialFactors> {
        let mut out = Vec::with_capacity(self.crossing_len());
        for &(tone_onset, tone_w) in &self.tone_onset {
            for _ in 0..tone_w {
                for &foreperiod_ms in &self.foreperiod_ms {
                    for &warning in &self.warning {
                        for &(warning_validity, validity_w) in &self.warning_validity {
                            for _ in 0..validity_w {
                                for &target_duration_ms in &self.target_duration_ms {
                                    out.push(TrialFactors {
                                        tone_onset,
                                        foreperiod_ms,
                                        warning,
                                        warning_validity,
                                        target_duration_ms,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }

    pub fn crossing_len(&self) -> usize {
        let tone: usize = self.tone_onset.iter().map(|&(_, w)| w).sum();
        let validity: usize = self.warning_validity.iter().map(|&(_, w)| w).sum();
        tone * self.foreperiod_ms.len()
            * self.warning.len()
            * validity
            * self.target_duration_ms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_crossing_has_weighted_size() {
        let set = FactorSet::default();
        // tone (2+1+1) x foreperiod 2 x warning 2 x validity (3+1) x duration 2
        assert_eq!(set.crossing_len(), 128);
        assert_eq!(set.crossing().len(), 128);
    }

    #[test]
    fn weights_repeat_levels_in_crossing() {
        let set = FactorSet::default();
        let crossing = set.crossing();
        let no_tone = crossing
            .iter()
            .filter(|f| f.tone_onset == ToneOnset::NoTone)
            .count();
        let pre_target = crossing
            .iter()
            .filter(|f| f.tone_onset == ToneOnset::PreTarget)
            .count();
        assert_eq!(no_tone, 2 * pre_target);

        let valid = crossing
            .iter()
            .filter(|f| f.warning_validity == Validity::Valid)
            .count();
        let invalid = crossing
            .iter()
            .filter(|f| f.warning_validity == Validity::Invalid)
            .count();
        assert_eq!(valid, 3 * invalid);
    }

    #[test]
    fn invalid_trials_show_the_opposite_cue() {
        assert_eq!(Warning::Short.cue_label(Validity::Valid), "SHORT");
        assert_eq!(Warning::Short.cue_label(Validity::Invalid), "LONG");
        assert_eq!(Warning::Long.cue_label(Validity::Valid), "LONG");
        assert_eq!(Warning::Long.cue_label(Validity::Invalid), "SHORT");
    }
}

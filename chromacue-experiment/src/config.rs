use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RunError;

/// Experiment-wide parameters. Defaults are the standard task constants; a
/// JSON file may override any subset of fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub blocks: usize,
    pub trials_per_block: usize,
    pub practice_blocks: usize,
    pub trials_per_practice_block: usize,

    /// Uniform range for the enforced wait under the warning cue, ms.
    pub warn_gate_range_ms: (u64, u64),
    /// Tone onset precedes target onset by this much on pre-target trials.
    pub tone_lead_ms: u64,
    pub tone_duration_ms: u64,
    /// Target-offset to mask-onset asynchrony.
    pub target_mask_gap_ms: u64,
    pub mask_duration_ms: u64,
    /// Mask-offset to wheel-onset asynchrony.
    pub mask_wheel_gap_ms: u64,
    pub feedback_duration_ms: u64,
    pub response_window_ms: u64,

    pub tone_freq_hz: f32,
    pub tone_volume: f32,

    /// Target / mask canvas edge, px.
    pub box_size_px: u32,
    /// Mask cell count; must be a perfect square.
    pub mask_cells: u32,
    /// Wheel diameter as a fraction of screen height.
    pub wheel_relative_size: f32,
    pub font_size_px: f32,

    pub results_path: PathBuf,
    /// Explicit font file; when absent the app probes system font paths.
    pub font_path: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            blocks: 4,
            trials_per_block: 32,
            practice_blocks: 1,
            trials_per_practice_block: 8,
            warn_gate_range_ms: (2000, 4000),
            tone_lead_ms: 50,
            tone_duration_ms: 50,
            target_mask_gap_ms: 0,
            mask_duration_ms: 200,
            mask_wheel_gap_ms: 0,
            feedback_duration_ms: 2000,
            response_window_ms: 50_000,
            tone_freq_hz: 784.0,
            tone_volume: 0.5,
            box_size_px: 120,
            mask_cells: 49,
            wheel_relative_size: 0.5,
            font_size_px: 28.0,
            results_path: PathBuf::from("chromacue-results.jsonl"),
            font_path: None,
        }
    }
}

impl ExperimentConfig {
    /// Loads configuration from a JSON file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, RunError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Total blocks including leading practice blocks.
    pub fn total_blocks(&self) -> usize {
        self.practice_blocks + self.blocks
    }

    /// Trial count for the given 1-based block number.
    pub fn trials_in_block(&self, block_num: usize) -> usize {
        if block_num <= self.practice_blocks {
            self.trials_per_practice_block
        } else {
            self.trials_per_block
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ExperimentConfig::load(Path::new("/nonexistent/chromacue.json")).unwrap();
        assert_eq!(config.mask_cells, 49);
        assert_eq!(config.response_window_ms, 50_000);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{"blocks": 2, "mask_duration_ms": 300}"#).unwrap();
        assert_eq!(config.blocks, 2);
        assert_eq!(config.mask_duration_ms, 300);
        assert_eq!(config.tone_freq_hz, 784.0);
    }

    #[test]
    fn practice_blocks_lead_and_use_their_own_count() {
        let config = ExperimentConfig::default();
        assert_eq!(config.total_blocks(), 5);
        assert_eq!(config.trials_in_block(1), 8);
        assert_eq!(config.trials_in_block(2), 32);
    }
}

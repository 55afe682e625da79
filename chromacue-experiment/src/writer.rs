use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chromacue_core::TrialRecord;
use tracing::info;

use crate::error::RunError;

/// Appends one JSON line per trial record, flushing after each so a crash
/// mid-run loses at most the in-flight trial.
pub struct ResultWriter {
    out: BufWriter<File>,
}

impl ResultWriter {
    pub fn create(path: &Path) -> Result<Self, RunError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(path = %path.display(), "result file opened");
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    pub fn write(&mut self, record: &TrialRecord) -> Result<(), RunError> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

//! Raw reply dump: prompts, replies and the run report written to disk.
//!
//! Lets an operator inspect or replay a single stage after a partial run.
//! Enabled by `dump_raw_replies`; output goes to `<output_dir>/raw/`:
//! ```text
//! 01-participants-prompt.json
//! 01-participants-reply.txt
//! 02-<participant>-prompt.json
//! 02-<participant>-reply.txt
//! 02-<participant>-send-receive.md
//! 03-message-flows-prompt.json
//! 03-message-flows-reply.txt
//! run-report.json
//! ```
//! Write failures are logged and never block the pipeline.

use std::path::{Path, PathBuf};

/// Handle on an existing dump directory.
#[derive(Debug, Clone)]
pub struct RawDump {
    dir: PathBuf,
}

impl RawDump {
    /// Create the directory tree. Returns `None` (with a warning) if that
    /// fails.
    pub fn create(dir: &Path) -> Option<Self> {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Raw dump: failed to create directory"
            );
            return None;
        }
        Some(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a JSON artifact (any serde-serializable value), pretty-printed.
    pub fn json<T: serde::Serialize>(&self, filename: &str, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => self.text(filename, &json),
            Err(e) => tracing::warn!(
                file = filename,
                error = %e,
                "Raw dump: failed to serialize JSON"
            ),
        }
    }

    /// Write a text artifact (raw reply, derived table).
    pub fn text(&self, filename: &str, text: &str) {
        let path = self.dir.join(filename);
        match std::fs::write(&path, text.as_bytes()) {
            Ok(()) => tracing::debug!(
                path = %path.display(),
                size = text.len(),
                "Raw dump: written"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Raw dump: failed to write"
            ),
        }
    }
}

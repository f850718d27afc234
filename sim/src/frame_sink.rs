//! Debug sink writing one JSON file per frame, for offline viewers.

use anyhow::Context;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracker_core::{DebugFrame, SinkError, SnapshotSink};

/// Writes `state_NNNNNN.json` into a directory, keeping the newest
/// `retain` frames.
pub struct JsonFrameSink {
    dir: PathBuf,
    retain: usize,
    written: VecDeque<PathBuf>,
}

impl JsonFrameSink {
    /// Create the sink, creating `dir` if needed. `retain == 0` keeps all.
    pub fn new(dir: impl Into<PathBuf>, retain: usize) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating debug directory {}", dir.display()))?;
        Ok(Self {
            dir,
            retain,
            written: VecDeque::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn frame_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("state_{sequence:06}.json"))
    }
}

impl SnapshotSink for JsonFrameSink {
    fn publish(&mut self, frame: &DebugFrame) -> Result<(), SinkError> {
        let path = self.frame_path(frame.sequence);
        let file = File::create(&path).map_err(SinkError::new)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, frame).map_err(SinkError::new)?;
        writer.flush().map_err(SinkError::new)?;
        self.written.push_back(path);

        while self.retain > 0 && self.written.len() > self.retain {
            if let Some(old) = self.written.pop_front() {
                if let Err(e) = std::fs::remove_file(&old) {
                    tracing::debug!(path = %old.display(), error = %e, "could not remove old frame");
                }
            }
        }
        Ok(())
    }
}

//! Debug frame hand-off to an external renderer.
//!
//! The tracker builds a [`DebugFrame`] and pushes it into a bounded queue
//! drained by a [`SinkWorker`] thread. A full queue drops the frame, a
//! failing or panicking sink is logged; neither reaches the estimator.

use crate::{
    error::SinkError,
    snapshot::{EventRecord, TrackerSnapshot},
    types::Timestamp,
};
use serde::{Deserialize, Serialize};
use std::{
    sync::mpsc::{self, SyncSender, TrySendError},
    thread::{self, JoinHandle},
};

/// One frame for a visualisation / diagnostics consumer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugFrame {
    /// Monotonic frame counter since the sink was attached
    pub sequence: u64,
    pub time: Timestamp,
    pub snapshot: TrackerSnapshot,
    /// Event history inside the retention window, oldest first
    pub recent_events: Vec<EventRecord>,
}

/// Receiver of debug frames, run on the worker thread.
pub trait SnapshotSink: Send + 'static {
    fn publish(&mut self, frame: &DebugFrame) -> Result<(), SinkError>;
}

impl<F> SnapshotSink for F
where
    F: FnMut(&DebugFrame) -> Result<(), SinkError> + Send + 'static,
{
    fn publish(&mut self, frame: &DebugFrame) -> Result<(), SinkError> {
        self(frame)
    }
}

/// Counters reported when a sink is detached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Frames handed to the queue
    pub frames_sent: u64,
    /// Frames dropped because the queue was full or the worker was gone
    pub frames_dropped: u64,
    /// Frames the sink failed to publish
    pub sink_failures: u64,
}

/// Owns the sink thread and the sending half of its queue.
pub struct SinkWorker {
    tx: Option<SyncSender<DebugFrame>>,
    handle: Option<JoinHandle<u64>>,
    stats: SinkStats,
}

impl SinkWorker {
    /// Start a worker draining a queue of `capacity` frames into `sink`.
    pub fn spawn<S: SnapshotSink>(mut sink: S, capacity: usize) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<DebugFrame>(capacity);
        let handle = thread::Builder::new()
            .name("snapshot-sink".into())
            .spawn(move || {
                let mut failures = 0u64;
                for frame in rx {
                    if let Err(e) = sink.publish(&frame) {
                        failures += 1;
                        tracing::warn!(sequence = frame.sequence, error = %e, "snapshot sink failed");
                    }
                }
                failures
            })?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            stats: SinkStats::default(),
        })
    }

    /// Queue a frame without blocking. Returns false if it was dropped.
    pub fn submit(&mut self, frame: DebugFrame) -> bool {
        let Some(tx) = &self.tx else {
            self.stats.frames_dropped += 1;
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                true
            }
            Err(TrySendError::Full(frame)) => {
                self.stats.frames_dropped += 1;
                tracing::trace!(sequence = frame.sequence, "snapshot queue full, frame dropped");
                false
            }
            Err(TrySendError::Disconnected(frame)) => {
                self.stats.frames_dropped += 1;
                tracing::debug!(sequence = frame.sequence, "snapshot worker gone, frame dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    /// Close the queue, wait for the worker to drain it and report counters.
    pub fn shutdown(mut self) -> SinkStats {
        self.finish();
        self.stats
    }

    fn finish(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(failures) => self.stats.sink_failures += failures,
                Err(_) => tracing::warn!("snapshot sink worker panicked"),
            }
        }
    }
}

impl Drop for SinkWorker {
    fn drop(&mut self) {
        self.finish();
    }
}

use std::path::PathBuf;
use tokio::sync::mpsc;

/// Stage label used for scan progress events.
pub const SCAN_LABEL: &str = "Scanning files";

/// Stage label used for processing progress events.
pub const PROCESS_LABEL: &str = "Processing files";

/// Messages sent from the pipeline worker to the driving shell. The channel
/// is strictly one-way; the shell never calls back into the worker.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Percentage for the named stage; non-decreasing within a stage.
    Progress { label: &'static str, percent: u8 },

    /// Informational line for the shell's log view.
    Log(String),

    /// The run finished and the spreadsheet was written.
    Completed { videos: usize, output: PathBuf },

    /// The run aborted with a fatal error.
    Failed(String),
}

/// Sink for worker-to-shell notifications. Sends never block; once the
/// receiving shell goes away further events are dropped and the run keeps
/// going.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn progress(&self, label: &'static str, percent: u8) {
        self.send(PipelineEvent::Progress { label, percent });
    }

    pub fn log(&self, line: impl Into<String>) {
        self.send(PipelineEvent::Log(line.into()));
    }
}

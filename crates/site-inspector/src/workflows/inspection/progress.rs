use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    /// Compress, geotag and watermark; the first half of the bar.
    Preparing,
    /// Object storage uploads; the second half.
    Uploading,
    Complete,
}

impl ProgressPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Preparing => "Preparing photos",
            Self::Uploading => "Uploading photos",
            Self::Complete => "Complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmissionProgress {
    pub phase: ProgressPhase,
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: SubmissionProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(SubmissionProgress) + Send + Sync,
{
    fn report(&self, progress: SubmissionProgress) {
        self(progress)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: SubmissionProgress) {}
}

/// Logs each step at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, progress: SubmissionProgress) {
        info!(
            phase = progress.phase.label(),
            current = progress.current,
            total = progress.total,
            percentage = progress.percentage,
            "submission progress"
        );
    }
}

/// Maps per-photo steps onto a 0-100 bar that never moves backwards.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    total: usize,
    last: u8,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, total: usize) -> Self {
        Self {
            sink,
            total,
            last: 0,
        }
    }

    pub(crate) fn start(&mut self) {
        self.emit(ProgressPhase::Preparing, 0, 0);
    }

    /// `done` photos have been through compression and watermarking.
    pub(crate) fn prepared(&mut self, done: usize) {
        let percentage = self.half(done);
        self.emit(ProgressPhase::Preparing, done, percentage);
    }

    /// `done` photos have had their upload attempted, successful or not.
    pub(crate) fn uploaded(&mut self, done: usize) {
        let percentage = 50 + self.half(done);
        self.emit(ProgressPhase::Uploading, done, percentage);
    }

    pub(crate) fn complete(&mut self) {
        self.emit(ProgressPhase::Complete, self.total, 100);
    }

    fn half(&self, done: usize) -> u8 {
        if self.total == 0 {
            return 50;
        }
        (done.min(self.total) * 50 / self.total) as u8
    }

    fn emit(&mut self, phase: ProgressPhase, current: usize, percentage: u8) {
        self.last = self.last.max(percentage.min(100));
        self.sink.report(SubmissionProgress {
            phase,
            current,
            total: self.total,
            percentage: self.last,
        });
    }
}

//! Per-job progress reporting.
//!
//! Each job gets its own channel. The sender enforces the reporting rules:
//! percentages never decrease, and nothing is sent after the terminal event.

use tokio::sync::mpsc;
use tracing::debug;

use reel_models::{ProgressEvent, Stage};

pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Create a progress channel for one job.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender::new(tx), rx)
}

/// Sending half of a job's progress channel.
#[derive(Debug)]
pub struct ProgressSender {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    last_percent: u8,
    finished: bool,
}

impl ProgressSender {
    fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            tx: Some(tx),
            last_percent: 0,
            finished: false,
        }
    }

    /// A sender whose events go nowhere.
    pub fn detached() -> Self {
        Self {
            tx: None,
            last_percent: 0,
            finished: false,
        }
    }

    /// Report entry into `stage` at its checkpoint.
    pub fn stage(&mut self, stage: Stage, message: impl Into<String>) {
        let percent = stage
            .checkpoint()
            .unwrap_or(self.last_percent)
            .max(self.last_percent);
        self.emit(stage, percent, message.into());
    }

    pub fn completed(&mut self, message: impl Into<String>) {
        self.stage(Stage::Completed, message);
    }

    /// Terminal failure; repeats the last reported percentage.
    pub fn failed(&mut self, message: impl Into<String>) {
        let percent = self.last_percent;
        self.emit(Stage::Failed, percent, message.into());
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn emit(&mut self, stage: Stage, percent: u8, message: String) {
        if self.finished {
            debug!(stage = %stage, "Dropping progress event after terminal event");
            return;
        }
        self.last_percent = percent;
        self.finished = stage.is_terminal();

        if let Some(tx) = &self.tx {
            if tx.send(ProgressEvent::new(stage, percent, message)).is_err() {
                debug!("Progress receiver dropped");
                self.tx = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut ProgressReceiver) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_full_pipeline_is_monotonic() {
        let (mut tx, mut rx) = progress_channel();
        for stage in Stage::PIPELINE {
            tx.stage(*stage, stage.as_str());
        }
        let events = drain(&mut rx);
        assert_eq!(events.len(), Stage::PIPELINE.len());
        assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
        assert_eq!(events.last().unwrap().stage, Stage::Completed);
        assert_eq!(events.last().unwrap().percent, 100);
    }

    #[test]
    fn test_failed_repeats_last_percent_and_is_final() {
        let (mut tx, mut rx) = progress_channel();
        tx.stage(Stage::Starting, "start");
        tx.stage(Stage::Downloading, "download");
        tx.stage(Stage::Assembling, "assemble");
        tx.failed("boom");
        tx.stage(Stage::Mixing, "late");
        tx.completed("late");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        let last = events.last().unwrap();
        assert_eq!(last.stage, Stage::Failed);
        assert_eq!(last.percent, 40);
        assert!(tx.is_finished());
    }

    #[test]
    fn test_out_of_order_stage_does_not_go_backwards() {
        let (mut tx, mut rx) = progress_channel();
        tx.stage(Stage::Mixing, "mix");
        tx.stage(Stage::Downloading, "oops");
        let events = drain(&mut rx);
        assert_eq!(events[1].percent, 60);
    }

    #[test]
    fn test_detached_and_dropped_receivers_are_ignored() {
        let mut detached = ProgressSender::detached();
        detached.stage(Stage::Starting, "start");
        detached.completed("done");
        assert!(detached.is_finished());

        let (mut tx, rx) = progress_channel();
        drop(rx);
        tx.stage(Stage::Starting, "start");
        tx.stage(Stage::Downloading, "download");
        assert_eq!(tx.last_percent(), 10);
    }
}

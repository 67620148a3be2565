//! Stage progress events.
//!
//! Each assembly run walks the stages in declaration order and emits one
//! [`ProgressEvent`] per stage entry. `Failed` can follow any stage.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Assembly pipeline stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Starting,
    Downloading,
    Assembling,
    Mixing,
    Reviewing,
    Uploading,
    Completed,
    Failed,
}

impl Stage {
    /// Stages of a successful run, in order.
    pub const PIPELINE: &'static [Stage] = &[
        Stage::Starting,
        Stage::Downloading,
        Stage::Assembling,
        Stage::Mixing,
        Stage::Reviewing,
        Stage::Uploading,
        Stage::Completed,
    ];

    /// Progress checkpoint reported on entry to the stage.
    ///
    /// `Failed` has no checkpoint of its own; it repeats the last one.
    pub fn checkpoint(&self) -> Option<u8> {
        match self {
            Stage::Starting => Some(0),
            Stage::Downloading => Some(10),
            Stage::Assembling => Some(40),
            Stage::Mixing => Some(60),
            Stage::Reviewing => Some(80),
            Stage::Uploading => Some(90),
            Stage::Completed => Some(100),
            Stage::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Starting => "starting",
            Stage::Downloading => "downloading",
            Stage::Assembling => "assembling",
            Stage::Mixing => "mixing",
            Stage::Reviewing => "reviewing",
            Stage::Uploading => "uploading",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress report for a running job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    pub stage: Stage,
    /// 0-100
    pub percent: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(stage: Stage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent: percent.min(100),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

//! Terminal results of an assembly run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engagement label produced by the quality review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

impl EngagementLevel {
    /// Map a review score onto a label.
    pub fn from_score(score: u32) -> Self {
        if score > 80 {
            EngagementLevel::High
        } else if score > 50 {
            EngagementLevel::Medium
        } else {
            EngagementLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementLevel::High => "High",
            EngagementLevel::Medium => "Medium",
            EngagementLevel::Low => "Low",
        }
    }
}

impl fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Heuristic assessment of an assembled video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub score: u32,
    pub predicted_engagement: EngagementLevel,
    pub suggestions: Vec<String>,
    /// `m:ss` timestamps worth featuring
    pub best_moments: Vec<String>,
}

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyErrorKind {
    InvalidSpec,
    NoValidClips,
    Transcode,
    AudioMix,
    Publish,
    Timeout,
    Internal,
}

impl AssemblyErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblyErrorKind::InvalidSpec => "invalid_spec",
            AssemblyErrorKind::NoValidClips => "no_valid_clips",
            AssemblyErrorKind::Transcode => "transcode",
            AssemblyErrorKind::AudioMix => "audio_mix",
            AssemblyErrorKind::Publish => "publish",
            AssemblyErrorKind::Timeout => "timeout",
            AssemblyErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for AssemblyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one assembly job. Returned exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_asset_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_duration_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewResult>,

    /// Scene refs left out because no rendered clip was found
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_scenes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<AssemblyErrorKind>,
}

impl AssemblyResult {
    /// A failed result carrying the original error message.
    pub fn failure(kind: AssemblyErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            output_asset_key: None,
            output_url: None,
            output_duration_seconds: None,
            file_size_bytes: None,
            review: None,
            skipped_scenes: Vec::new(),
            error: Some(message.into()),
            error_kind: Some(kind),
        }
    }

    pub fn with_skipped(mut self, skipped: Vec<String>) -> Self {
        self.skipped_scenes = skipped;
        self
    }
}

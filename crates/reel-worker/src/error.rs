//! Worker error types.

use thiserror::Error;

use reel_media::MediaError;
use reel_models::AssemblyErrorKind;
use reel_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Result of an assembly stage.
pub type PipelineResult<T> = Result<T, AssemblyError>;

/// Failures of one assembly run.
///
/// Every variant except [`AssemblyError::AssetMissing`] is fatal to the job.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Invalid job spec: {0}")]
    InvalidSpec(String),

    /// A single scene has no rendered clip; the scene is skipped.
    #[error("No rendered clip for scene {scene_id}")]
    AssetMissing { scene_id: String },

    #[error("No valid clips: none of {requested} scene(s) resolved to a rendered clip")]
    NoValidClips { requested: usize },

    /// Media engine rejected the timeline; `diagnostic` is the engine output.
    #[error("Transcode failed: {diagnostic}")]
    Transcode { diagnostic: String },

    #[error("Audio mix failed: {0}")]
    AudioMix(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AssemblyError {
    pub fn asset_missing(scene_id: impl Into<String>) -> Self {
        Self::AssetMissing {
            scene_id: scene_id.into(),
        }
    }

    /// Media failure while rendering the video timeline.
    pub fn transcode(err: MediaError) -> Self {
        match err {
            MediaError::Timeout(secs) => Self::engine_timeout("rendering the timeline", secs),
            err => Self::Transcode {
                diagnostic: err.diagnostic(),
            },
        }
    }

    /// Media failure while validating or mixing audio.
    pub fn audio_mix(err: MediaError) -> Self {
        match err {
            MediaError::Timeout(secs) => Self::engine_timeout("mixing audio", secs),
            err => Self::AudioMix(err.diagnostic()),
        }
    }

    fn engine_timeout(step: &str, secs: u64) -> Self {
        Self::Timeout(format!("ffmpeg was still {step} after {secs}s"))
    }

    pub fn publish(err: StorageError) -> Self {
        Self::Publish(err.to_string())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Category reported in the job result.
    pub fn kind(&self) -> AssemblyErrorKind {
        match self {
            AssemblyError::InvalidSpec(_) => AssemblyErrorKind::InvalidSpec,
            AssemblyError::NoValidClips { .. } => AssemblyErrorKind::NoValidClips,
            AssemblyError::Transcode { .. } => AssemblyErrorKind::Transcode,
            AssemblyError::AudioMix(_) => AssemblyErrorKind::AudioMix,
            AssemblyError::Publish(_) => AssemblyErrorKind::Publish,
            AssemblyError::Timeout(_) => AssemblyErrorKind::Timeout,
            AssemblyError::AssetMissing { .. } | AssemblyError::Internal(_) => {
                AssemblyErrorKind::Internal
            }
        }
    }

    /// Whether the queue should spend a retry on this failure.
    pub fn is_retryable(&self) -> bool {
        is_retryable_kind(self.kind())
    }
}

/// Publish, timeout and internal failures may pass on a later attempt;
/// bad specs, clips and audio fail the same way again.
pub fn is_retryable_kind(kind: AssemblyErrorKind) -> bool {
    matches!(
        kind,
        AssemblyErrorKind::Publish | AssemblyErrorKind::Timeout | AssemblyErrorKind::Internal
    )
}

/// Failures of the worker process around the pipeline.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] reel_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_valid_clips_message() {
        let err = AssemblyError::NoValidClips { requested: 3 };
        assert!(err.to_string().to_lowercase().contains("no valid clips"));
        assert_eq!(err.kind(), AssemblyErrorKind::NoValidClips);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retry_policy_by_kind() {
        assert!(is_retryable_kind(AssemblyErrorKind::Publish));
        assert!(is_retryable_kind(AssemblyErrorKind::Timeout));
        assert!(!is_retryable_kind(AssemblyErrorKind::AudioMix));
        assert!(!is_retryable_kind(AssemblyErrorKind::Transcode));
        assert!(!is_retryable_kind(AssemblyErrorKind::InvalidSpec));
    }

    #[test]
    fn test_engine_timeout_is_retryable() {
        let err = AssemblyError::transcode(MediaError::Timeout(1800));
        assert_eq!(err.kind(), AssemblyErrorKind::Timeout);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("1800s"));
    }

    #[test]
    fn test_transcode_keeps_engine_diagnostic() {
        let media = MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("[xfade] First input link main timebase do not match".to_string()),
            Some(1),
        );
        let err = AssemblyError::transcode(media);
        assert_eq!(err.kind(), AssemblyErrorKind::Transcode);
        assert!(err
            .to_string()
            .contains("[xfade] First input link main timebase do not match"));
    }

    #[test]
    fn test_audio_errors_map_to_audio_mix() {
        let err = AssemblyError::audio_mix(MediaError::invalid_audio("/a.mp3", "no audio stream"));
        assert_eq!(err.kind(), AssemblyErrorKind::AudioMix);
        assert!(err.to_string().contains("no audio stream"));
    }
}

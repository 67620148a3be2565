//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// No connection could be established.
    #[error("Redis is unreachable: {0}")]
    Unavailable(#[source] redis::RedisError),

    /// An identical job is still inside its dedup window.
    #[error("Job {idempotency_key} is already queued")]
    DuplicateJob { idempotency_key: String },

    #[error("Redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Job payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

impl QueueError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateJob { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_the_key() {
        let err = QueueError::DuplicateJob {
            idempotency_key: "assemble:p1:s1,s2".to_string(),
        };
        assert!(err.is_duplicate());
        assert_eq!(err.to_string(), "Job assemble:p1:s1,s2 is already queued");
    }

    #[test]
    fn test_payload_errors_convert() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: QueueError = json_err.into();
        assert!(matches!(err, QueueError::Payload(_)));
        assert!(!err.is_duplicate());
    }
}

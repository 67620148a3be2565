//! Assembly job envelope carried on the stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reel_models::{AssemblyJobSpec, JobId};

/// One queued assembly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyJob {
    /// Unique job ID
    pub job_id: JobId,
    pub spec: AssemblyJobSpec,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl AssemblyJob {
    pub fn new(spec: AssemblyJobSpec) -> Self {
        Self {
            job_id: JobId::new(),
            spec,
            created_at: Utc::now(),
        }
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = job_id;
        self
    }

    /// Generate idempotency key for deduplication.
    ///
    /// Two submissions of the same project timeline collapse onto one key.
    pub fn idempotency_key(&self) -> String {
        format!(
            "assemble:{}:{}",
            self.spec.project_id,
            self.spec.scene_refs.join(",")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_tracks_timeline() {
        let a = AssemblyJob::new(AssemblyJobSpec::new(
            "p1",
            vec!["s1".to_string(), "s2".to_string()],
        ));
        let b = AssemblyJob::new(AssemblyJobSpec::new(
            "p1",
            vec!["s1".to_string(), "s2".to_string()],
        ));
        let c = AssemblyJob::new(AssemblyJobSpec::new("p1", vec!["s2".to_string()]));

        assert_ne!(a.job_id, b.job_id);
        assert_eq!(a.idempotency_key(), b.idempotency_key());
        assert_ne!(a.idempotency_key(), c.idempotency_key());
    }

    #[test]
    fn test_envelope_roundtrip_keeps_spec_wire_names() {
        let job = AssemblyJob::new(AssemblyJobSpec::new("p1", vec!["s1".to_string()]));
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"projectId\":\"p1\""));
        assert!(json.contains("\"sceneRefs\""));

        let back: AssemblyJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }
}

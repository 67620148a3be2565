//! Structured lifecycle logging for assembly jobs.

use tracing::{error, info, Span};

use reel_models::{AssemblyErrorKind, AssemblyResult, JobId, Stage};

/// Emits the lifecycle lines of one job with consistent `job_id` and
/// `project_id` fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    project_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, project_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            project_id: project_id.to_string(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Span entered around the whole run.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "assembly",
            job_id = %self.job_id,
            project_id = %self.project_id
        )
    }

    pub fn started(&self, scene_count: usize) {
        info!(
            job_id = %self.job_id,
            project_id = %self.project_id,
            scene_count,
            "Assembly started"
        );
    }

    pub fn stage(&self, stage: Stage, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = stage.as_str(),
            "{}", message
        );
    }

    pub fn completed(&self, result: &AssemblyResult) {
        info!(
            job_id = %self.job_id,
            project_id = %self.project_id,
            output = result.output_asset_key.as_deref().unwrap_or_default(),
            duration_secs = result.output_duration_seconds.unwrap_or_default(),
            skipped = result.skipped_scenes.len(),
            "Assembly completed"
        );
    }

    pub fn failed(&self, kind: AssemblyErrorKind, message: &str) {
        error!(
            job_id = %self.job_id,
            project_id = %self.project_id,
            error_kind = kind.as_str(),
            "Assembly failed: {}", message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_fields() {
        let job_id = JobId::from_string("job-1");
        let logger = JobLogger::new(&job_id, "p1");

        assert_eq!(logger.job_id(), "job-1");
        assert_eq!(logger.project_id(), "p1");
    }
}

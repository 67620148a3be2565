//! Progress and completion events via Redis Pub/Sub.

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;

use reel_models::{AssemblyResult, JobId, ProgressEvent};

use crate::error::QueueResult;

/// How long a completed job's result stays readable.
pub const RESULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Payload of a pub/sub message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProgressMessage {
    Progress(ProgressEvent),
    /// Terminal completion payload
    Completed(AssemblyResult),
}

/// Message published on a job's channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub job_id: JobId,
    pub message: ProgressMessage,
}

/// Channel for publishing/subscribing to progress events.
pub struct ProgressChannel {
    client: redis::Client,
}

impl ProgressChannel {
    /// Create a new progress channel.
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Get the channel name for a job.
    pub fn channel_name(job_id: &JobId) -> String {
        format!("progress:{}", job_id)
    }

    fn result_key(job_id: &JobId) -> String {
        format!("reel:result:{}", job_id)
    }

    /// Publish an update.
    pub async fn publish(&self, update: &ProgressUpdate) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(&update.job_id);
        let payload = serde_json::to_string(update)?;

        debug!("Publishing progress event to {}", channel);
        conn.publish::<_, _, ()>(channel, payload).await?;

        Ok(())
    }

    /// Publish a stage progress event.
    pub async fn progress(&self, job_id: &JobId, event: ProgressEvent) -> QueueResult<()> {
        self.publish(&ProgressUpdate {
            job_id: job_id.clone(),
            message: ProgressMessage::Progress(event),
        })
        .await
    }

    /// Store the terminal result and announce it.
    pub async fn complete(&self, job_id: &JobId, result: &AssemblyResult) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(result)?;
        conn.set_ex::<_, _, ()>(Self::result_key(job_id), payload, RESULT_TTL_SECS)
            .await?;

        self.publish(&ProgressUpdate {
            job_id: job_id.clone(),
            message: ProgressMessage::Completed(result.clone()),
        })
        .await
    }

    /// Fetch a stored result, if the job has completed recently.
    pub async fn result(&self, job_id: &JobId) -> QueueResult<Option<AssemblyResult>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(Self::result_key(job_id)).await?;
        payload
            .map(|p| serde_json::from_str(&p))
            .transpose()
            .map_err(Into::into)
    }

    /// Subscribe to updates for a job.
    /// Returns a pinned stream that can be polled with `.next()`.
    pub async fn subscribe(
        &self,
        job_id: &JobId,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = ProgressUpdate> + Send>>>
    {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        let channel = Self::channel_name(job_id);

        pubsub.subscribe(&channel).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}

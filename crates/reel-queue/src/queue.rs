//! Assembly job queue on Redis Streams.
//!
//! Jobs are XADDed to one stream and read through a consumer group. A job
//! stays pending until it is acked (success) or moved to the dead-letter
//! stream; pending jobs whose worker died are reclaimed with XAUTOCLAIM.

use std::collections::HashMap;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::streams::{StreamAutoClaimReply, StreamId, StreamPendingReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::AssemblyJob;

/// Retry counters outlive any realistic redelivery window.
const RETRY_KEY_TTL_SECS: i64 = 24 * 60 * 60;

/// Stream field holding the serialized [`AssemblyJob`].
const JOB_FIELD: &str = "job";

fn dedup_key(idempotency_key: &str) -> String {
    format!("reel:dedup:{idempotency_key}")
}

fn retry_key(message_id: &str) -> String {
    format!("reel:retry:{message_id}")
}

/// Stream names and delivery limits.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub stream_name: String,
    pub consumer_group: String,
    pub dlq_stream_name: String,
    /// Failed attempts of a retryable job before it is dead-lettered
    pub max_retries: u32,
    /// How long a delivered job may stay unacked before another worker claims it
    pub visibility_timeout: Duration,
    /// How long an enqueued idempotency key blocks duplicates
    pub dedup_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "reel:jobs".to_string(),
            consumer_group: "reel:workers".to_string(),
            dlq_stream_name: "reel:dlq".to_string(),
            max_retries: 3,
            visibility_timeout: Duration::from_secs(900),
            dedup_ttl: Duration::from_secs(3600),
        }
    }
}

impl QueueConfig {
    /// Read `REDIS_URL` and `QUEUE_*` overrides.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, fallback: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            visibility_timeout: secs("QUEUE_VISIBILITY_TIMEOUT", defaults.visibility_timeout),
            dedup_ttl: secs("QUEUE_DEDUP_TTL", defaults.dedup_ttl),
        }
    }
}

/// Producer and consumer handle for the assembly stream.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    async fn connection(&self) -> QueueResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Unavailable)
    }

    /// Create the stream and consumer group if they do not exist yet.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;

        let created: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.config.stream_name, &self.config.consumer_group, "$")
            .await;

        match created {
            Ok(()) => info!(group = %self.config.consumer_group, "Created consumer group"),
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(group = %self.config.consumer_group, "Consumer group already exists");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Add a job to the stream and return its message id.
    ///
    /// A second job with the same idempotency key inside the dedup window is
    /// rejected with [`QueueError::DuplicateJob`].
    pub async fn enqueue(&self, job: &AssemblyJob) -> QueueResult<String> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job)?;
        let idempotency_key = job.idempotency_key();

        // SET NX doubles as the duplicate check
        let claimed: Option<String> = redis::cmd("SET")
            .arg(dedup_key(&idempotency_key))
            .arg(job.job_id.as_str())
            .arg("NX")
            .arg("EX")
            .arg(self.config.dedup_ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        if claimed.is_none() {
            warn!(key = %idempotency_key, "Duplicate job rejected");
            return Err(QueueError::DuplicateJob { idempotency_key });
        }

        let message_id: String = conn
            .xadd(
                &self.config.stream_name,
                "*",
                &[(JOB_FIELD, payload.as_str()), ("key", idempotency_key.as_str())],
            )
            .await?;

        info!(
            job_id = %job.job_id,
            project_id = %job.spec.project_id,
            message_id = %message_id,
            "Enqueued assembly job"
        );
        Ok(message_id)
    }

    /// Mark a job as done and drop it from the stream.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        conn.xack::<_, _, _, ()>(
            &self.config.stream_name,
            &self.config.consumer_group,
            &[message_id],
        )
        .await?;
        conn.xdel::<_, _, ()>(&self.config.stream_name, &[message_id])
            .await?;

        debug!(message_id, "Acknowledged job");
        Ok(())
    }

    /// Copy a job to the dead-letter stream with its error, then ack it.
    pub async fn dlq(&self, message_id: &str, job: &AssemblyJob, error: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job)?;

        conn.xadd::<_, _, _, _, ()>(
            &self.config.dlq_stream_name,
            "*",
            &[
                (JOB_FIELD, payload.as_str()),
                ("error", error),
                ("original_id", message_id),
            ],
        )
        .await?;
        self.ack(message_id).await?;

        warn!(job_id = %job.job_id, "Moved job to DLQ: {}", error);
        Ok(())
    }

    /// Jobs currently on the stream.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        Ok(conn.xlen(&self.config.stream_name).await?)
    }

    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        Ok(conn.xlen(&self.config.dlq_stream_name).await?)
    }

    /// Read up to `count` new jobs for this consumer, blocking up to `block_ms`.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, AssemblyJob)>> {
        let mut conn = self.connection().await?;
        let options = StreamReadOptions::default()
            .group(&self.config.consumer_group, consumer_name)
            .count(count)
            .block(block_ms as usize);

        let reply: StreamReadReply = conn
            .xread_options(&[&self.config.stream_name], &[">"], &options)
            .await?;

        let entries = reply.keys.into_iter().flat_map(|key| key.ids);
        Ok(self.decode_entries(entries, "Consumed job").await)
    }

    /// Take over jobs left unacked longer than the visibility timeout.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        count: usize,
    ) -> QueueResult<Vec<(String, AssemblyJob)>> {
        let mut conn = self.connection().await?;

        let pending: StreamPendingReply = conn
            .xpending(&self.config.stream_name, &self.config.consumer_group)
            .await?;
        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let reply: StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(self.config.visibility_timeout.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        Ok(self.decode_entries(reply.claimed, "Claimed pending job").await)
    }

    async fn decode_entries(
        &self,
        entries: impl IntoIterator<Item = StreamId>,
        what: &str,
    ) -> Vec<(String, AssemblyJob)> {
        let mut jobs = Vec::new();
        for entry in entries {
            if let Some(job) = self.decode_entry(&entry.id, &entry.map).await {
                debug!(job_id = %job.job_id, message_id = %entry.id, "{}", what);
                jobs.push((entry.id, job));
            }
        }
        jobs
    }

    /// Decode a stream entry, acking malformed payloads so they are not redelivered.
    async fn decode_entry(
        &self,
        message_id: &str,
        map: &HashMap<String, redis::Value>,
    ) -> Option<AssemblyJob> {
        let Some(redis::Value::BulkString(payload)) = map.get(JOB_FIELD) else {
            warn!(message_id, "Stream entry has no job payload");
            self.ack(message_id).await.ok();
            return None;
        };

        match serde_json::from_slice::<AssemblyJob>(payload) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(message_id, "Dropping unparseable job payload: {}", e);
                self.ack(message_id).await.ok();
                None
            }
        }
    }

    /// Failed attempts recorded for a message.
    pub async fn get_retry_count(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.connection().await?;
        let count: Option<u32> = conn.get(retry_key(message_id)).await?;
        Ok(count.unwrap_or(0))
    }

    /// Record one more failed attempt and return the new total.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.connection().await?;
        let key = retry_key(message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, RETRY_KEY_TTL_SECS).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_names() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "reel:jobs");
        assert_eq!(config.dlq_stream_name, "reel:dlq");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_bookkeeping_keys() {
        assert_eq!(dedup_key("assemble:p1:s1"), "reel:dedup:assemble:p1:s1");
        assert_eq!(retry_key("1700000000000-0"), "reel:retry:1700000000000-0");
    }

    #[test]
    fn test_new_accepts_valid_url() {
        assert!(JobQueue::new(QueueConfig::default()).is_ok());
        let bad = QueueConfig {
            redis_url: "not a url".to_string(),
            ..QueueConfig::default()
        };
        assert!(JobQueue::new(bad).is_err());
    }
}

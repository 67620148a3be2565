//! Redis Streams job queue for scene assembly.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams with idempotency keys
//! - Worker consumption with retry counters, stale claims and a DLQ
//! - Progress and completion events via Redis Pub/Sub

pub mod error;
pub mod job;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::AssemblyJob;
pub use progress::{ProgressChannel, ProgressMessage, ProgressUpdate, RESULT_TTL_SECS};
pub use queue::{JobQueue, QueueConfig};

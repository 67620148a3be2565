//! Scene assembly worker.
//!
//! This crate provides:
//! - The assembly orchestrator ([`run_assembly`]) and its stages
//! - Asset resolution from the object store and metadata catalog
//! - The deterministic quality reviewer
//! - A queue-driven job executor with per-job progress channels
//! - Graceful shutdown

pub mod arena;
pub mod assembler;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod poll;
pub mod progress;
pub mod resolver;
pub mod review;

pub use assembler::{run_assembly, Assembler};
pub use catalog::{MemoryCatalog, SceneCatalog, StorageCatalog};
pub use config::WorkerConfig;
pub use error::{AssemblyError, PipelineResult, WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use progress::{progress_channel, ProgressReceiver, ProgressSender};
pub use resolver::{AssetResolver, ResolvedScenes};
pub use review::review;

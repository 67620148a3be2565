//! Shared data models for the scene assembly pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Assembly job specs and their validation
//! - Transitions, resolutions and container formats
//! - Scene metadata records and project audio defaults
//! - Progress events and terminal assembly results
//! - Object-store key conventions

pub mod encoding;
pub mod job;
pub mod keys;
pub mod progress;
pub mod resolution;
pub mod result;
pub mod scene;
pub mod transition;

// Re-export common types
pub use encoding::EncodingConfig;
pub use job::{AssemblyJobSpec, AudioSpec, JobId, OutputSpec};
pub use progress::{ProgressEvent, Stage};
pub use resolution::{ContainerFormat, Resolution};
pub use result::{AssemblyErrorKind, AssemblyResult, EngagementLevel, ReviewResult};
pub use scene::{ProjectAudioDefaults, ProjectManifest, SceneRecord};
pub use transition::{TransitionKind, TransitionSpec};

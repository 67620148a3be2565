//! Object storage for the assembly pipeline.
//!
//! This crate provides:
//! - The [`ObjectStore`] trait (get/put/list/exists)
//! - A Cloudflare R2 client with presigned GET URLs
//! - An in-memory store for tests and local runs

pub mod client;
pub mod error;
pub mod memory;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use store::{new_object_key, ObjectInfo, ObjectStore, StoredObject};

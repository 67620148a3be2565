//! Per-job working directory.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Scratch directory owned by exactly one job.
///
/// Removed by [`Arena::close`], or on drop if the job never gets that far.
#[derive(Debug)]
pub struct Arena {
    dir: TempDir,
}

impl Arena {
    /// Create a fresh arena under `work_dir`.
    pub async fn create(work_dir: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix("assembly-")
            .tempdir_in(work_dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Local path for the clip of the scene at `index`.
    pub fn clip_path(&self, index: usize, scene_id: &str, extension: &str) -> PathBuf {
        self.path()
            .join("clips")
            .join(format!("{index:03}-{}.{extension}", sanitize(scene_id)))
    }

    /// Local path for an audio asset.
    pub fn audio_path(&self, name: &str, extension: &str) -> PathBuf {
        self.path()
            .join("audio")
            .join(format!("{}.{extension}", sanitize(name)))
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Delete the arena and everything in it.
    ///
    /// The removal runs on the blocking pool.
    pub async fn close(self) -> io::Result<()> {
        tokio::task::spawn_blocking(move || self.dir.close())
            .await
            .map_err(|e| io::Error::other(format!("arena cleanup task failed: {e}")))?
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

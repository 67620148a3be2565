//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reel_media::{DuckingSettings, MixDefaults};
use reel_models::encoding::DEFAULT_FRAME_RATE;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Maximum concurrent clip downloads per job
    pub max_download_parallel: usize,
    /// Parent directory of per-job working arenas
    pub work_dir: PathBuf,
    /// Wall-clock bound for a single FFmpeg invocation
    pub ffmpeg_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often the worker should scan for orphaned pending jobs
    pub claim_interval: Duration,
    /// Attempts made while waiting for an audio asset to appear
    pub audio_poll_attempts: u32,
    /// Delay between audio readiness attempts
    pub audio_poll_interval: Duration,
    /// Output frame rate of assembled timelines
    pub frame_rate: u32,
    /// Built-in volumes, fades and ducking
    pub mix: MixDefaults,
    /// Prometheus listener; metrics are disabled when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_download_parallel: 4,
            work_dir: std::env::temp_dir().join("reel"),
            ffmpeg_timeout: Duration::from_secs(1800),
            shutdown_timeout: Duration::from_secs(60),
            claim_interval: Duration::from_secs(30),
            audio_poll_attempts: 10,
            audio_poll_interval: Duration::from_secs(3),
            frame_rate: DEFAULT_FRAME_RATE,
            mix: MixDefaults::default(),
            metrics_addr: None,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mix = defaults.mix;

        Self {
            max_concurrent_jobs: env_or("WORKER_MAX_JOBS", defaults.max_concurrent_jobs).max(1),
            max_download_parallel: env_or(
                "WORKER_MAX_DOWNLOAD_PARALLEL",
                defaults.max_download_parallel,
            )
            .max(1),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            ffmpeg_timeout: Duration::from_secs(env_or(
                "WORKER_FFMPEG_TIMEOUT_SECS",
                defaults.ffmpeg_timeout.as_secs(),
            )),
            shutdown_timeout: Duration::from_secs(env_or(
                "WORKER_SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout.as_secs(),
            )),
            claim_interval: Duration::from_secs(env_or(
                "WORKER_CLAIM_INTERVAL_SECS",
                defaults.claim_interval.as_secs(),
            )),
            audio_poll_attempts: env_or("WORKER_AUDIO_POLL_ATTEMPTS", defaults.audio_poll_attempts)
                .max(1),
            audio_poll_interval: Duration::from_millis(env_or(
                "WORKER_AUDIO_POLL_INTERVAL_MS",
                defaults.audio_poll_interval.as_millis() as u64,
            )),
            frame_rate: env_or("WORKER_FRAME_RATE", defaults.frame_rate).max(1),
            mix: MixDefaults {
                narration_volume: env_or("MIX_NARRATION_VOLUME", mix.narration_volume),
                music_volume: env_or("MIX_MUSIC_VOLUME", mix.music_volume),
                music_fade_in_secs: env_or("MIX_MUSIC_FADE_IN_SECS", mix.music_fade_in_secs),
                music_fade_out_secs: env_or("MIX_MUSIC_FADE_OUT_SECS", mix.music_fade_out_secs),
                ducking: DuckingSettings {
                    enabled: env_or("MIX_DUCKING", mix.ducking.enabled),
                    ..mix.ducking
                },
            },
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.audio_poll_attempts, 10);
        assert_eq!(config.frame_rate, 30);
        assert!(config.mix.music_volume < config.mix.narration_volume);
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("REEL_TEST_ENV_OR", "not-a-number");
        assert_eq!(env_or("REEL_TEST_ENV_OR", 7u32), 7);
        std::env::set_var("REEL_TEST_ENV_OR", "12");
        assert_eq!(env_or("REEL_TEST_ENV_OR", 7u32), 12);
        std::env::remove_var("REEL_TEST_ENV_OR");
    }
}

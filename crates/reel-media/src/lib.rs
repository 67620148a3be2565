#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for scene assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2` and stderr diagnostics capture
//! - A typed crossfade filter graph with offset algebra
//! - Narration/music mixing with sidechain ducking
//! - The [`MediaEngine`] seam the worker drives

pub mod audio_mix;
pub mod command;
pub mod engine;
pub mod error;
pub mod probe;
pub mod progress;
pub mod transition;

pub use audio_mix::{
    resolve_volume, AudioMixPlan, AudioMixer, AudioRole, AudioTrack, DuckingSettings, MixDefaults,
};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use engine::{FfmpegEngine, MediaEngine};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_audio, probe_video, AudioInfo, VideoInfo};
pub use progress::FfmpegProgress;
pub use transition::{Crossfade, FilterChain, ResolvedSceneClip, TransitionGraph, VideoOp};

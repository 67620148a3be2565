//! FFprobe inspection of clips and audio assets.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// Whether the container also carries an audio stream
    pub has_audio: bool,
}

/// Audio asset information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Audio codec
    pub codec: String,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u32,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    duration: Option<String>,
}

impl FfprobeOutput {
    fn format_duration(&self) -> Option<f64> {
        self.format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
    }

    fn stream(&self, codec_type: &str) -> Option<&FfprobeStream> {
        self.streams.iter().find(|s| s.codec_type == codec_type)
    }
}

async fn run_ffprobe(path: &Path) -> MediaResult<Vec<u8>> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    Ok(output.stdout)
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let stdout = run_ffprobe(path.as_ref()).await?;
    parse_video_info(&stdout)
}

/// Probe an audio asset.
///
/// Any failure (missing file, ffprobe rejection, no audio stream, zero
/// duration) is reported as [`MediaError::InvalidAudio`] so callers can treat
/// it as a fatal mixing error.
pub async fn probe_audio(path: impl AsRef<Path>) -> MediaResult<AudioInfo> {
    let path = path.as_ref();
    let stdout = run_ffprobe(path)
        .await
        .map_err(|e| MediaError::invalid_audio(path, e.to_string()))?;
    parse_audio_info(&stdout).map_err(|reason| MediaError::invalid_audio(path, reason))
}

fn parse_video_info(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .stream("video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let duration = probe.format_duration().unwrap_or(0.0);

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        has_audio: probe.stream("audio").is_some(),
    })
}

fn parse_audio_info(stdout: &[u8]) -> Result<AudioInfo, String> {
    let probe: FfprobeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("unparseable ffprobe output: {e}"))?;

    let stream = probe
        .stream("audio")
        .ok_or_else(|| "no audio stream".to_string())?;

    let duration = probe
        .format_duration()
        .or_else(|| stream.duration.as_deref().and_then(|d| d.parse().ok()))
        .unwrap_or(0.0);

    if !duration.is_finite() || duration <= 0.0 {
        return Err(format!("audio duration is {duration}"));
    }

    Ok(AudioInfo {
        duration,
        codec: stream.codec_name.clone().unwrap_or_default(),
        sample_rate: stream
            .sample_rate
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or(0),
        channels: stream.channels.unwrap_or(0),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_video_info() {
        let json = br#"{
            "format": {"duration": "5.005"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720,
                 "avg_frame_rate": "0/0", "r_frame_rate": "24/1"},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;
        let info = parse_video_info(json).unwrap();
        assert!((info.duration - 5.005).abs() < 1e-9);
        assert_eq!(info.width, 1280);
        assert!((info.fps - 24.0).abs() < 0.01);
        assert!(info.has_audio);
    }

    #[test]
    fn test_parse_audio_info() {
        let json = br#"{
            "format": {"duration": "42.5"},
            "streams": [{"codec_type": "audio", "codec_name": "mp3", "sample_rate": "44100", "channels": 2}]
        }"#;
        let info = parse_audio_info(json).unwrap();
        assert_eq!(info.codec, "mp3");
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
    }

    #[test]
    fn test_audio_without_stream_is_rejected() {
        let json = br#"{"format": {"duration": "3.0"}, "streams": []}"#;
        let err = parse_audio_info(json).unwrap_err();
        assert!(err.contains("no audio stream"));
    }

    #[test]
    fn test_audio_with_zero_duration_is_rejected() {
        let json = br#"{"streams": [{"codec_type": "audio", "duration": "0.0"}]}"#;
        assert!(parse_audio_info(json).is_err());
    }

    #[tokio::test]
    async fn test_probe_audio_missing_file_is_invalid_audio() {
        let err = probe_audio("/nonexistent/narration.mp3").await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidAudio { .. }));
    }
}

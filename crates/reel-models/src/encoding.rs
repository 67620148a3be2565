//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::resolution::ContainerFormat;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 20;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Frame rate every clip is normalized to before crossfading
pub const DEFAULT_FRAME_RATE: u32 = 30;
/// Pixel format of the assembled timeline
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Encoder settings for the assembled timeline and the final mux.
///
/// Missing fields deserialize to the H.264/AAC defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EncodingConfig {
    /// ffmpeg encoder name, e.g. "libx264" or "libvpx-vp9"
    pub codec: String,
    /// x264/x265 speed preset; ignored by other encoders
    pub preset: String,
    /// Constant Rate Factor (lower is better quality)
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Frame rate every clip is resampled to
    pub frame_rate: u32,
    /// Extra output arguments appended after the codec settings
    pub extra_args: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// Encoder settings suited to a container.
    pub fn for_container(format: ContainerFormat) -> Self {
        match format {
            ContainerFormat::Mp4 => Self {
                extra_args: vec!["-movflags".to_string(), "+faststart".to_string()],
                ..Default::default()
            },
            ContainerFormat::Mov => Self::default(),
            ContainerFormat::Webm => Self {
                codec: "libvpx-vp9".to_string(),
                crf: 32,
                audio_codec: "libopus".to_string(),
                audio_bitrate: "128k".to_string(),
                extra_args: vec!["-b:v".to_string(), "0".to_string()],
                ..Default::default()
            },
        }
    }

    /// Whether the video codec understands `-preset`.
    pub fn uses_preset(&self) -> bool {
        self.codec.starts_with("libx26")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_codecs() {
        let mp4 = EncodingConfig::for_container(ContainerFormat::Mp4);
        assert_eq!(mp4.codec, "libx264");
        assert!(mp4.extra_args.contains(&"+faststart".to_string()));
        assert!(mp4.uses_preset());

        let webm = EncodingConfig::for_container(ContainerFormat::Webm);
        assert_eq!(webm.codec, "libvpx-vp9");
        assert_eq!(webm.audio_codec, "libopus");
        assert!(!webm.uses_preset());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EncodingConfig = serde_json::from_str(r#"{"crf": 18}"#).unwrap();
        assert_eq!(config.crf, 18);
        assert_eq!(config.codec, DEFAULT_VIDEO_CODEC);
        assert_eq!(config.frame_rate, DEFAULT_FRAME_RATE);
        assert!(config.extra_args.is_empty());
    }
}

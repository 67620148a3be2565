//! Output geometry and container formats.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::ValidationError;

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const HD_LANDSCAPE: Resolution = Resolution::new(1920, 1080);
    pub const HD_PORTRAIT: Resolution = Resolution::new(1080, 1920);
    pub const SQUARE: Resolution = Resolution::new(1080, 1080);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether the geometry is encodable with yuv420p (non-zero, even sides).
    pub fn is_encodable(&self) -> bool {
        self.width >= 2 && self.height >= 2 && self.width % 2 == 0 && self.height % 2 == 0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::HD_LANDSCAPE
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Validator hook for [`Resolution`] fields.
pub fn validate_resolution(resolution: &Resolution) -> Result<(), ValidationError> {
    if resolution.is_encodable() {
        Ok(())
    } else {
        Err(ValidationError::new("resolution_not_encodable"))
    }
}

/// Container format of the published artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Mp4,
    Mov,
    Webm,
}

impl ContainerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mov => "mov",
            ContainerFormat::Webm => "webm",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "video/mp4",
            ContainerFormat::Mov => "video/quicktime",
            ContainerFormat::Webm => "video/webm",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Error parsing a container format name.
#[derive(Debug, Error)]
#[error("Unsupported container format: {0}")]
pub struct UnsupportedContainer(pub String);

impl FromStr for ContainerFormat {
    type Err = UnsupportedContainer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4" => Ok(ContainerFormat::Mp4),
            "mov" | "quicktime" => Ok(ContainerFormat::Mov),
            "webm" => Ok(ContainerFormat::Webm),
            other => Err(UnsupportedContainer(other.to_string())),
        }
    }
}

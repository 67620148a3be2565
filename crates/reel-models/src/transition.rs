//! Scene boundary transitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Duration of the built-in transition used when none is declared.
pub const DEFAULT_TRANSITION_SECS: f64 = 1.0;

/// Crossfade styles understood by the media engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Plain crossfade
    #[default]
    Fade,
    /// Fade through black
    FadeBlack,
    /// Fade through white
    FadeWhite,
    /// Pixel dissolve
    Dissolve,
    WipeLeft,
    WipeRight,
    SlideLeft,
    SlideRight,
    CircleOpen,
    CircleClose,
    /// Hard cut, rendered as a one-frame fade
    Cut,
}

impl TransitionKind {
    /// Name of the `xfade` transition for this kind.
    pub fn xfade_name(&self) -> &'static str {
        match self {
            TransitionKind::Fade | TransitionKind::Cut => "fade",
            TransitionKind::FadeBlack => "fadeblack",
            TransitionKind::FadeWhite => "fadewhite",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::WipeLeft => "wipeleft",
            TransitionKind::WipeRight => "wiperight",
            TransitionKind::SlideLeft => "slideleft",
            TransitionKind::SlideRight => "slideright",
            TransitionKind::CircleOpen => "circleopen",
            TransitionKind::CircleClose => "circleclose",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Fade => "fade",
            TransitionKind::FadeBlack => "fade_black",
            TransitionKind::FadeWhite => "fade_white",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::WipeLeft => "wipe_left",
            TransitionKind::WipeRight => "wipe_right",
            TransitionKind::SlideLeft => "slide_left",
            TransitionKind::SlideRight => "slide_right",
            TransitionKind::CircleOpen => "circle_open",
            TransitionKind::CircleClose => "circle_close",
            TransitionKind::Cut => "cut",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outgoing transition of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransitionSpec {
    /// Transition style
    #[serde(rename = "type", default)]
    pub kind: TransitionKind,

    /// Overlap between the two clips, in seconds
    #[validate(range(min = 0.0))]
    #[serde(default = "default_transition_secs")]
    pub duration_seconds: f64,
}

fn default_transition_secs() -> f64 {
    DEFAULT_TRANSITION_SECS
}

impl Default for TransitionSpec {
    fn default() -> Self {
        Self {
            kind: TransitionKind::Fade,
            duration_seconds: DEFAULT_TRANSITION_SECS,
        }
    }
}

impl TransitionSpec {
    pub fn new(kind: TransitionKind, duration_seconds: f64) -> Self {
        Self {
            kind,
            duration_seconds,
        }
    }

    pub fn fade(duration_seconds: f64) -> Self {
        Self::new(TransitionKind::Fade, duration_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_one_second_fade() {
        let spec = TransitionSpec::default();
        assert_eq!(spec.kind, TransitionKind::Fade);
        assert!((spec.duration_seconds - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deserialize_wire_shape() {
        let spec: TransitionSpec =
            serde_json::from_str(r#"{"type":"fade_black","durationSeconds":0.5}"#).unwrap();
        assert_eq!(spec.kind, TransitionKind::FadeBlack);
        assert_eq!(spec.kind.xfade_name(), "fadeblack");
        assert!((spec.duration_seconds - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_fields_fall_back_to_default() {
        let spec: TransitionSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, TransitionSpec::default());
    }

    #[test]
    fn test_cut_renders_as_fade() {
        assert_eq!(TransitionKind::Cut.xfade_name(), "fade");
    }
}

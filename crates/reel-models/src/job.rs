//! Assembly job definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::resolution::{validate_resolution, ContainerFormat, Resolution};
use crate::transition::TransitionSpec;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Narration and music inputs for a job.
///
/// Volumes are optional so that an explicit per-job value can be told apart
/// from "use the project default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AudioSpec {
    /// Object-store key of the narration track
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_ref: Option<String>,

    /// Object-store key of the music bed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_ref: Option<String>,

    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_volume: Option<f32>,

    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_volume: Option<f32>,
}

impl AudioSpec {
    /// Whether any audio asset was requested.
    pub fn has_tracks(&self) -> bool {
        self.narration_ref.is_some() || self.music_ref.is_some()
    }
}

/// Shape of the published artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    #[validate(custom(function = "validate_resolution"))]
    #[serde(default)]
    pub resolution: Resolution,

    #[serde(default)]
    pub container_format: ContainerFormat,
}

/// Immutable input to one assembly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_transitions"))]
pub struct AssemblyJobSpec {
    /// Project the scenes belong to; only used for asset namespacing
    #[validate(length(min = 1))]
    pub project_id: String,

    /// Scene identifiers in timeline order
    pub scene_refs: Vec<String>,

    /// Outgoing transition of each scene, indexed like `scene_refs`
    #[serde(default)]
    pub transitions: Vec<TransitionSpec>,

    #[validate(nested)]
    #[serde(default)]
    pub audio: AudioSpec,

    #[validate(nested)]
    #[serde(default)]
    pub output: OutputSpec,
}

impl AssemblyJobSpec {
    pub fn new(project_id: impl Into<String>, scene_refs: Vec<String>) -> Self {
        Self {
            project_id: project_id.into(),
            scene_refs,
            transitions: Vec::new(),
            audio: AudioSpec::default(),
            output: OutputSpec::default(),
        }
    }

    pub fn with_transitions(mut self, transitions: Vec<TransitionSpec>) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn with_audio(mut self, audio: AudioSpec) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_output(mut self, output: OutputSpec) -> Self {
        self.output = output;
        self
    }

    /// Declared outgoing transition of the scene at `index`.
    ///
    /// Returns `None` for the last scene and for entries past the last
    /// boundary.
    pub fn transition_after(&self, index: usize) -> Option<TransitionSpec> {
        if index + 1 >= self.scene_refs.len() {
            return None;
        }
        self.transitions.get(index).copied()
    }
}

/// Only entries that sit on a scene boundary are checked; the rest are
/// never read by [`AssemblyJobSpec::transition_after`].
fn validate_transitions(spec: &AssemblyJobSpec) -> Result<(), ValidationError> {
    let boundaries = spec.scene_refs.len().saturating_sub(1);
    let valid = spec
        .transitions
        .iter()
        .take(boundaries)
        .all(|t| t.duration_seconds.is_finite() && t.duration_seconds >= 0.0);

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("transition_duration"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(scenes: &[&str]) -> AssemblyJobSpec {
        AssemblyJobSpec::new("proj-1", scenes.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_transition_after_ignores_trailing_entries() {
        let job = spec(&["a", "b"]).with_transitions(vec![
            TransitionSpec::fade(0.5),
            TransitionSpec::fade(2.0),
        ]);

        assert_eq!(job.transition_after(0), Some(TransitionSpec::fade(0.5)));
        assert_eq!(job.transition_after(1), None);
        assert_eq!(job.transition_after(5), None);
    }

    #[test]
    fn test_validation_rejects_out_of_range_volume() {
        let job = spec(&["a"]).with_audio(AudioSpec {
            music_volume: Some(1.5),
            ..Default::default()
        });
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_negative_transition() {
        let job = spec(&["a", "b"]).with_transitions(vec![TransitionSpec::fade(-1.0)]);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_validation_ignores_transitions_past_last_boundary() {
        let single = spec(&["a"]).with_transitions(vec![TransitionSpec::fade(-1.0)]);
        assert!(single.validate().is_ok());

        let trailing = spec(&["a", "b"])
            .with_transitions(vec![TransitionSpec::fade(0.5), TransitionSpec::fade(-3.0)]);
        assert!(trailing.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_non_finite_transition() {
        let job = spec(&["a", "b"]).with_transitions(vec![TransitionSpec::fade(f64::NAN)]);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_odd_resolution() {
        let job = spec(&["a"]).with_output(OutputSpec {
            resolution: Resolution::new(1919, 1080),
            container_format: ContainerFormat::Mp4,
        });
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_valid_spec_round_trips_camel_case() {
        let json = r#"{
            "projectId": "p1",
            "sceneRefs": ["s1", "s2"],
            "transitions": [{"type": "dissolve", "durationSeconds": 0.75}],
            "audio": {"narrationRef": "projects/p1/audio/narration.mp3", "musicVolume": 0.2},
            "output": {"resolution": {"width": 1080, "height": 1920}, "containerFormat": "webm"}
        }"#;
        let job: AssemblyJobSpec = serde_json::from_str(json).unwrap();

        assert!(job.validate().is_ok());
        assert_eq!(job.scene_refs.len(), 2);
        assert_eq!(job.audio.music_volume, Some(0.2));
        assert_eq!(job.audio.narration_volume, None);
        assert_eq!(job.output.container_format, ContainerFormat::Webm);
        assert!(job.audio.has_tracks());
    }
}

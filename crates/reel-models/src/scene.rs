//! Scene and project metadata, as read from the metadata store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::transition::TransitionSpec;

/// Read-only record describing one generated scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SceneRecord {
    /// Scene identifier, as referenced by `AssemblyJobSpec::scene_refs`
    pub id: String,

    /// Rendered clip duration in seconds
    #[serde(rename = "duration")]
    pub duration_seconds: f64,

    /// Transition the scene author prefers when leaving this scene
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_preference: Option<TransitionSpec>,
}

impl SceneRecord {
    pub fn new(id: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            id: id.into(),
            duration_seconds,
            transition_preference: None,
        }
    }

    pub fn with_transition(mut self, transition: TransitionSpec) -> Self {
        self.transition_preference = Some(transition);
        self
    }

    /// Duration if it satisfies the clip invariant (finite and positive).
    pub fn usable_duration(&self) -> Option<f64> {
        (self.duration_seconds.is_finite() && self.duration_seconds > 0.0)
            .then_some(self.duration_seconds)
    }
}

/// Project-level audio volume defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAudioDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_volume: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_volume: Option<f32>,
}

/// Project metadata document: audio defaults plus every scene record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    pub project_id: String,

    #[serde(default)]
    pub audio_defaults: ProjectAudioDefaults,

    #[serde(default)]
    pub scenes: Vec<SceneRecord>,
}

impl ProjectManifest {
    pub fn scene(&self, scene_id: &str) -> Option<&SceneRecord> {
        self.scenes.iter().find(|s| s.id == scene_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::TransitionKind;

    #[test]
    fn test_usable_duration() {
        assert_eq!(SceneRecord::new("a", 4.5).usable_duration(), Some(4.5));
        assert_eq!(SceneRecord::new("a", 0.0).usable_duration(), None);
        assert_eq!(SceneRecord::new("a", f64::NAN).usable_duration(), None);
    }

    #[test]
    fn test_manifest_parsing() {
        let json = r#"{
            "projectId": "p1",
            "audioDefaults": {"musicVolume": 0.4},
            "scenes": [
                {"id": "s1", "duration": 5.0, "transitionPreference": {"type": "wipe_left", "durationSeconds": 0.5}},
                {"id": "s2", "duration": 6.5}
            ]
        }"#;
        let manifest: ProjectManifest = serde_json::from_str(json).unwrap();

        assert_eq!(manifest.audio_defaults.music_volume, Some(0.4));
        assert_eq!(manifest.audio_defaults.narration_volume, None);
        let s1 = manifest.scene("s1").unwrap();
        assert_eq!(
            s1.transition_preference.map(|t| t.kind),
            Some(TransitionKind::WipeLeft)
        );
        assert!(manifest.scene("missing").is_none());
    }
}

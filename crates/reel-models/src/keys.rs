//! Object-store key conventions.

/// File extensions accepted as rendered scene clips.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv"];

/// Prefix under which a scene's rendered clip objects live.
pub fn scene_clip_prefix(project_id: &str, scene_id: &str) -> String {
    format!("projects/{}/scenes/{}/", project_id, scene_id)
}

/// Prefix under which final artifacts are published.
pub fn exports_prefix(project_id: &str) -> String {
    format!("projects/{}/exports/", project_id)
}

/// Key of the project metadata manifest.
pub fn manifest_key(project_id: &str) -> String {
    format!("projects/{}/manifest.json", project_id)
}

/// Whether a key looks like a rendered video object.
pub fn is_video_key(key: &str) -> bool {
    key.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// File extension of a key, if any.
pub fn extension_of(key: &str) -> Option<&str> {
    let name = key.rsplit('/').next().unwrap_or(key);
    name.rsplit_once('.').map(|(_, ext)| ext).filter(|e| !e.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(scene_clip_prefix("p1", "s2"), "projects/p1/scenes/s2/");
        assert_eq!(exports_prefix("p1"), "projects/p1/exports/");
        assert_eq!(manifest_key("p1"), "projects/p1/manifest.json");
    }

    #[test]
    fn test_video_key_detection() {
        assert!(is_video_key("projects/p/scenes/s/clip.mp4"));
        assert!(is_video_key("projects/p/scenes/s/CLIP.MOV"));
        assert!(!is_video_key("projects/p/scenes/s/thumb.jpg"));
        assert!(!is_video_key("projects/p/scenes/s/"));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a/b/narration.mp3"), Some("mp3"));
        assert_eq!(extension_of("a/b.dir/narration"), None);
    }
}

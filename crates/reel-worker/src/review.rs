//! Deterministic quality review of an assembled video.

use reel_models::{EngagementLevel, ReviewResult};

const NO_AUDIO_PENALTY: i32 = 30;
const PACING_PENALTY: i32 = 10;

/// Fractions of the runtime offered as highlight timestamps.
const BEST_MOMENT_FRACTIONS: [f64; 3] = [0.2, 0.5, 0.8];

/// Score a video from its duration, scene count and whether it has audio.
///
/// Pure: the same inputs always give the same result.
pub fn review(duration_seconds: f64, scene_count: usize, has_audio: bool) -> ReviewResult {
    let duration = if duration_seconds.is_finite() {
        duration_seconds.max(0.0)
    } else {
        0.0
    };

    let mut score: i32 = 100;
    let mut suggestions = Vec::new();

    if !has_audio {
        score -= NO_AUDIO_PENALTY;
        suggestions.push("Add narration or background music".to_string());
    }

    if scene_count < 3 && duration > 30.0 {
        score -= PACING_PENALTY;
        suggestions.push("Split long takes into more scenes to keep the pacing varied".to_string());
    }

    if scene_count > 20 && duration < 60.0 {
        score -= PACING_PENALTY;
        suggestions.push("Merge some scenes; cuts this frequent are hard to follow".to_string());
    }

    if score < 70 {
        suggestions.push("Add subtitles to improve retention".to_string());
    }

    let score = score.max(0) as u32;

    ReviewResult {
        score,
        predicted_engagement: EngagementLevel::from_score(score),
        suggestions,
        best_moments: BEST_MOMENT_FRACTIONS
            .iter()
            .map(|f| format_timestamp(duration * f))
            .collect(),
    }
}

/// `m:ss`, truncating fractional seconds.
fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_video_scores_full() {
        let result = review(45.0, 6, true);
        assert_eq!(result.score, 100);
        assert_eq!(result.predicted_engagement, EngagementLevel::High);
        assert!(result.suggestions.is_empty());
        assert_eq!(result.best_moments, vec!["0:09", "0:22", "0:36"]);
    }

    #[test]
    fn test_missing_audio_costs_exactly_thirty() {
        let with = review(45.0, 6, true);
        let without = review(45.0, 6, false);
        assert_eq!(with.score - without.score, 30);
        assert_eq!(without.predicted_engagement, EngagementLevel::Medium);
    }

    #[test]
    fn test_review_is_idempotent() {
        assert_eq!(review(95.0, 2, false), review(95.0, 2, false));
    }

    #[test]
    fn test_few_long_scenes_and_subtitles() {
        let result = review(95.0, 2, false);
        assert_eq!(result.score, 60);
        assert_eq!(result.predicted_engagement, EngagementLevel::Medium);
        assert_eq!(result.suggestions.len(), 3);
        assert!(result.suggestions.last().unwrap().contains("subtitles"));
        assert_eq!(result.best_moments, vec!["0:19", "0:47", "1:16"]);
    }

    #[test]
    fn test_many_short_scenes() {
        let result = review(40.0, 25, true);
        assert_eq!(result.score, 90);
        assert_eq!(result.suggestions.len(), 1);
    }

    #[test]
    fn test_thresholds_are_strict() {
        assert_eq!(review(30.0, 2, true).score, 100);
        assert_eq!(review(60.0, 21, true).score, 100);
        assert_eq!(review(59.0, 20, true).score, 100);
    }

    #[test]
    fn test_engagement_boundaries() {
        assert_eq!(EngagementLevel::from_score(81), EngagementLevel::High);
        assert_eq!(EngagementLevel::from_score(80), EngagementLevel::Medium);
        assert_eq!(EngagementLevel::from_score(50), EngagementLevel::Low);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "0:00");
        assert_eq!(format_timestamp(61.9), "1:01");
        assert_eq!(format_timestamp(600.0), "10:00");
    }
}

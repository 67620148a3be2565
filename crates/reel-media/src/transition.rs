//! Crossfade filter graph for a scene timeline.
//!
//! The graph is kept as typed operations and only rendered to an FFmpeg
//! `-filter_complex` string when the command is built.

use std::fmt;
use std::path::{Path, PathBuf};

use reel_models::encoding::DEFAULT_PIXEL_FORMAT;
use reel_models::{Resolution, TransitionKind, TransitionSpec};

use crate::error::{MediaError, MediaResult};

/// Label of the final video stream in a composite graph.
pub const VIDEO_OUTPUT_LABEL: &str = "vout";

/// A scene clip downloaded into a job's working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSceneClip {
    pub scene_id: String,
    pub path: PathBuf,
    /// Always > 0
    pub duration_seconds: f64,
    /// Transition into the next clip, if declared
    pub outgoing: Option<TransitionSpec>,
}

impl ResolvedSceneClip {
    pub fn new(scene_id: impl Into<String>, path: impl Into<PathBuf>, duration_seconds: f64) -> Self {
        Self {
            scene_id: scene_id.into(),
            path: path.into(),
            duration_seconds,
            outgoing: None,
        }
    }

    pub fn with_outgoing(mut self, transition: Option<TransitionSpec>) -> Self {
        self.outgoing = transition;
        self
    }
}

/// A single video filter operation.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoOp {
    /// Fit inside the box, preserving aspect ratio
    Scale { width: u32, height: u32 },
    /// Pad (centered) to exactly the box
    Pad { width: u32, height: u32 },
    SetSar,
    Fps(u32),
    Format(String),
    /// Blend two streams starting at `offset` for `duration` seconds
    Crossfade {
        kind: TransitionKind,
        duration: f64,
        offset: f64,
    },
}

impl fmt::Display for VideoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoOp::Scale { width, height } => write!(
                f,
                "scale={width}:{height}:force_original_aspect_ratio=decrease"
            ),
            VideoOp::Pad { width, height } => {
                write!(f, "pad={width}:{height}:(ow-iw)/2:(oh-ih)/2")
            }
            VideoOp::SetSar => write!(f, "setsar=1"),
            VideoOp::Fps(fps) => write!(f, "fps={fps}"),
            VideoOp::Format(pix_fmt) => write!(f, "format={pix_fmt}"),
            VideoOp::Crossfade {
                kind,
                duration,
                offset,
            } => write!(
                f,
                "xfade=transition={}:duration={}:offset={}",
                kind.xfade_name(),
                secs(*duration),
                secs(*offset)
            ),
        }
    }
}

/// `[in...]op,op,...[out]`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub inputs: Vec<String>,
    pub ops: Vec<VideoOp>,
    pub output: String,
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{input}]")?;
        }
        let ops: Vec<String> = self.ops.iter().map(ToString::to_string).collect();
        write!(f, "{}[{}]", ops.join(","), self.output)
    }
}

/// One crossfade of the timeline, as placed by [`TransitionGraph::build`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossfade {
    pub kind: TransitionKind,
    pub duration: f64,
    pub offset: f64,
}

/// Video timeline for one job.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionGraph {
    /// Single clip; only codec normalization is applied
    Passthrough { input: PathBuf, duration: f64 },
    /// Normalized inputs chained with crossfades
    Composite {
        inputs: Vec<PathBuf>,
        chains: Vec<FilterChain>,
        output_label: String,
        duration: f64,
    },
}

impl TransitionGraph {
    /// Build the timeline graph for the given clips, in order.
    ///
    /// The crossfade between clip `i-1` and clip `i` uses clip `i-1`'s
    /// outgoing transition (a 1 s fade when absent). Each duration is clamped
    /// to `[1/frame_rate, min(cumulative, d_i)]` so offsets stay non-negative.
    pub fn build(
        clips: &[ResolvedSceneClip],
        target: Resolution,
        frame_rate: u32,
    ) -> MediaResult<Self> {
        let first = clips
            .first()
            .ok_or_else(|| MediaError::InvalidGraph("timeline has no clips".to_string()))?;

        if let Some(bad) = clips
            .iter()
            .find(|c| !c.duration_seconds.is_finite() || c.duration_seconds <= 0.0)
        {
            return Err(MediaError::InvalidGraph(format!(
                "clip for scene {} has non-positive duration {}",
                bad.scene_id, bad.duration_seconds
            )));
        }

        if frame_rate == 0 {
            return Err(MediaError::InvalidGraph("frame rate must be positive".to_string()));
        }

        if clips.len() == 1 {
            return Ok(TransitionGraph::Passthrough {
                input: first.path.clone(),
                duration: first.duration_seconds,
            });
        }

        let min_transition = 1.0 / f64::from(frame_rate);
        let mut chains = Vec::with_capacity(clips.len() * 2 - 1);

        for (i, _) in clips.iter().enumerate() {
            chains.push(FilterChain {
                inputs: vec![format!("{i}:v")],
                ops: vec![
                    VideoOp::Scale {
                        width: target.width,
                        height: target.height,
                    },
                    VideoOp::Pad {
                        width: target.width,
                        height: target.height,
                    },
                    VideoOp::SetSar,
                    VideoOp::Fps(frame_rate),
                    VideoOp::Format(DEFAULT_PIXEL_FORMAT.to_string()),
                ],
                output: format!("v{i}"),
            });
        }

        let mut cumulative = first.duration_seconds;
        let mut previous_label = "v0".to_string();

        for i in 1..clips.len() {
            let transition = clips[i - 1].outgoing.unwrap_or_default();
            let requested = match transition.kind {
                TransitionKind::Cut => min_transition,
                _ => transition.duration_seconds,
            };
            let d_i = clips[i].duration_seconds;
            let t = requested.max(min_transition).min(cumulative.min(d_i));

            let offset = cumulative - t;
            cumulative += d_i - t;

            let output = if i == clips.len() - 1 {
                VIDEO_OUTPUT_LABEL.to_string()
            } else {
                format!("x{i}")
            };

            chains.push(FilterChain {
                inputs: vec![previous_label, format!("v{i}")],
                ops: vec![VideoOp::Crossfade {
                    kind: transition.kind,
                    duration: t,
                    offset,
                }],
                output: output.clone(),
            });
            previous_label = output;
        }

        Ok(TransitionGraph::Composite {
            inputs: clips.iter().map(|c| c.path.clone()).collect(),
            chains,
            output_label: VIDEO_OUTPUT_LABEL.to_string(),
            duration: cumulative,
        })
    }

    /// Duration of the rendered video, `Σd − Σt`.
    pub fn output_duration(&self) -> f64 {
        match self {
            TransitionGraph::Passthrough { duration, .. }
            | TransitionGraph::Composite { duration, .. } => *duration,
        }
    }

    /// Input files in `-i` order.
    pub fn inputs(&self) -> Vec<&Path> {
        match self {
            TransitionGraph::Passthrough { input, .. } => vec![input.as_path()],
            TransitionGraph::Composite { inputs, .. } => {
                inputs.iter().map(PathBuf::as_path).collect()
            }
        }
    }

    /// Crossfades in timeline order.
    pub fn crossfades(&self) -> Vec<Crossfade> {
        match self {
            TransitionGraph::Passthrough { .. } => Vec::new(),
            TransitionGraph::Composite { chains, .. } => chains
                .iter()
                .flat_map(|chain| chain.ops.iter())
                .filter_map(|op| match op {
                    VideoOp::Crossfade {
                        kind,
                        duration,
                        offset,
                    } => Some(Crossfade {
                        kind: *kind,
                        duration: *duration,
                        offset: *offset,
                    }),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Render the `-filter_complex` expression; `None` for a passthrough.
    pub fn render(&self) -> Option<String> {
        match self {
            TransitionGraph::Passthrough { .. } => None,
            TransitionGraph::Composite { chains, .. } => Some(
                chains
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
        }
    }
}

/// Seconds with millisecond precision.
fn secs(value: f64) -> String {
    format!("{value:.3}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(id: &str, duration: f64) -> ResolvedSceneClip {
        ResolvedSceneClip::new(id, format!("/arena/{id}.mp4"), duration)
    }

    fn with_fade(c: ResolvedSceneClip, secs: f64) -> ResolvedSceneClip {
        c.with_outgoing(Some(TransitionSpec::fade(secs)))
    }

    #[test]
    fn test_offsets_for_three_equal_clips() {
        let clips = vec![
            with_fade(clip("a", 5.0), 1.0),
            with_fade(clip("b", 5.0), 1.0),
            clip("c", 5.0),
        ];
        let graph = TransitionGraph::build(&clips, Resolution::HD_LANDSCAPE, 30).unwrap();

        let fades = graph.crossfades();
        assert_eq!(fades.len(), 2);
        assert!((fades[0].offset - 4.0).abs() < 1e-9);
        assert!((fades[1].offset - 8.0).abs() < 1e-9);
        assert!((graph.output_duration() - 13.0).abs() < 0.5);
    }

    #[test]
    fn test_uses_preceding_clip_transition() {
        let clips = vec![
            clip("a", 4.0).with_outgoing(Some(TransitionSpec::new(TransitionKind::WipeLeft, 0.5))),
            clip("b", 4.0).with_outgoing(Some(TransitionSpec::new(TransitionKind::Dissolve, 2.0))),
            clip("c", 4.0),
        ];
        let graph = TransitionGraph::build(&clips, Resolution::HD_LANDSCAPE, 30).unwrap();
        let fades = graph.crossfades();
        assert_eq!(fades[0].kind, TransitionKind::WipeLeft);
        assert_eq!(fades[1].kind, TransitionKind::Dissolve);
        assert!((graph.output_duration() - (12.0 - 2.5)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_transition_defaults_to_one_second_fade() {
        let graph =
            TransitionGraph::build(&[clip("a", 3.0), clip("b", 3.0)], Resolution::SQUARE, 30)
                .unwrap();
        let fades = graph.crossfades();
        assert_eq!(fades[0].kind, TransitionKind::Fade);
        assert!((fades[0].duration - 1.0).abs() < 1e-9);
        assert!((graph.output_duration() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_transition_longer_than_clip_is_clamped() {
        let clips = vec![with_fade(clip("a", 2.0), 10.0), clip("b", 1.5)];
        let graph = TransitionGraph::build(&clips, Resolution::HD_PORTRAIT, 30).unwrap();
        let fade = graph.crossfades()[0];
        assert!((fade.duration - 1.5).abs() < 1e-9);
        assert!(fade.offset >= 0.0);
        assert!((graph.output_duration() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cut_and_zero_duration_use_one_frame() {
        let clips = vec![
            clip("a", 3.0).with_outgoing(Some(TransitionSpec::new(TransitionKind::Cut, 2.0))),
            with_fade(clip("b", 3.0), 0.0),
            clip("c", 3.0),
        ];
        let graph = TransitionGraph::build(&clips, Resolution::HD_LANDSCAPE, 25).unwrap();
        for fade in graph.crossfades() {
            assert!((fade.duration - 0.04).abs() < 1e-9);
        }
    }

    #[test]
    fn test_single_clip_is_passthrough() {
        let graph =
            TransitionGraph::build(&[clip("only", 7.25)], Resolution::HD_LANDSCAPE, 30).unwrap();
        assert!(matches!(graph, TransitionGraph::Passthrough { .. }));
        assert!(graph.render().is_none());
        assert!((graph.output_duration() - 7.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_and_invalid_clips_rejected() {
        assert!(TransitionGraph::build(&[], Resolution::HD_LANDSCAPE, 30).is_err());
        assert!(
            TransitionGraph::build(&[clip("a", 0.0), clip("b", 2.0)], Resolution::SQUARE, 30)
                .is_err()
        );
    }

    #[test]
    fn test_render_filter_complex() {
        let clips = vec![with_fade(clip("a", 5.0), 1.0), clip("b", 5.0)];
        let graph = TransitionGraph::build(&clips, Resolution::new(1280, 720), 30).unwrap();
        let rendered = graph.render().unwrap();

        assert!(rendered.starts_with(
            "[0:v]scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2,setsar=1,fps=30,format=yuv420p[v0];"
        ));
        assert!(rendered.ends_with("[v0][v1]xfade=transition=fade:duration=1.000:offset=4.000[vout]"));
        assert_eq!(graph.inputs().len(), 2);
    }
}

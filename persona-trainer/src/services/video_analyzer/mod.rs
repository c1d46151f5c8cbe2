//! Per-file video analysis for persona training
//!
//! **Stages:** 10 container metadata, 20 audio track, 40-80 sampled frames,
//! 80 personality indicators, 90 suitability, 100 done.
//!
//! The audio track and the visual pass are independent [`SignalGroup`]s. Only a missing file
//! or an unusable container (including missing ffmpeg) fails the whole analysis.

pub mod clips;
pub mod inspector;
pub mod landmarks;
pub mod toolkit;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dsp::{stats, ANALYSIS_SAMPLE_RATE};
use crate::models::signal_group::SignalGroup;
use crate::models::video_analysis::{
    FaceStats, VideoAnalysis, VideoAudioFeatures, VideoBasicInfo, VisualFeatures,
};
use crate::services::audio_analyzer::{features, AnalysisError, FeatureContext};
use crate::services::suitability_scorer::ScoringTable;
use crate::services::voice_activity::VoiceActivityDetector;
use crate::utils::load_mono;

pub use inspector::{
    FrameInspector, FrameLandmarks, InspectorCapabilities, InspectorError, SidecarInspector,
    UnavailableInspector,
};
pub use toolkit::{FfmpegToolkit, ProbeInfo, SampledFrame, ToolkitError, VideoToolkit};

/// Frames inspected per video, independent of its length
const TARGET_FRAMES: u64 = 100;
const PROGRESS_EVERY_FRAMES: usize = 10;

/// Video analyzer service
#[derive(Clone)]
pub struct VideoAnalyzer {
    toolkit: Arc<dyn VideoToolkit>,
    inspector: Arc<dyn FrameInspector>,
    scoring: ScoringTable,
    voice_activity: VoiceActivityDetector,
    sample_rate: u32,
    scratch_root: PathBuf,
}

impl VideoAnalyzer {
    pub fn new(
        toolkit: Arc<dyn VideoToolkit>,
        inspector: Arc<dyn FrameInspector>,
        scoring: ScoringTable,
    ) -> Self {
        Self {
            toolkit,
            inspector,
            scoring,
            voice_activity: VoiceActivityDetector::new(),
            sample_rate: ANALYSIS_SAMPLE_RATE,
            scratch_root: std::env::temp_dir(),
        }
    }

    /// Directory under which per-analysis scratch folders are created
    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = dir.into();
        self
    }

    pub fn scoring(&self) -> &ScoringTable {
        &self.scoring
    }

    pub fn analyze(&self, path: &Path) -> Result<VideoAnalysis, AnalysisError> {
        self.analyze_with_progress(path, |_, _| {})
    }

    /// Analyze one file, reporting `(percent, message)`; `-1` once on failure
    pub fn analyze_with_progress(
        &self,
        path: &Path,
        mut on_progress: impl FnMut(f64, &str),
    ) -> Result<VideoAnalysis, AnalysisError> {
        info!(file = %path.display(), "Starting video analysis");
        let result = self.run(path, &mut on_progress);
        match &result {
            Ok(analysis) => info!(
                file = %path.display(),
                score = analysis.training_suitability().score,
                "Video analysis completed"
            ),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Video analysis failed");
                on_progress(-1.0, &format!("Analysis failed: {e}"));
            }
        }
        result
    }

    fn run(
        &self,
        path: &Path,
        on_progress: &mut impl FnMut(f64, &str),
    ) -> Result<VideoAnalysis, AnalysisError> {
        if !path.exists() {
            return Err(AnalysisError::FileNotFound(path.to_path_buf()));
        }
        let file_size = std::fs::metadata(path)?.len();

        on_progress(10.0, "Extracting video information...");
        let probe = self
            .toolkit
            .probe(path)
            .map_err(|e| AnalysisError::Toolkit(e.to_string()))?;
        let basic_info = VideoBasicInfo {
            duration: probe.duration,
            fps: probe.fps,
            frame_count: probe.frame_count,
            width: probe.width,
            height: probe.height,
            aspect_ratio: if probe.height > 0 {
                probe.width as f64 / probe.height as f64
            } else {
                0.0
            },
            file_size,
            has_audio: probe.has_audio,
        };

        let scratch = ScratchDir::create(&self.scratch_root)?;

        on_progress(20.0, "Analyzing audio track...");
        let audio_features = if probe.has_audio {
            self.audio_track(path, scratch.path())
        } else {
            SignalGroup::unavailable("no audio track")
        };

        on_progress(40.0, "Analyzing visual features...");
        let visual_features = self.visual_features(path, &probe, scratch.path(), on_progress);

        on_progress(80.0, "Extracting personality indicators...");
        on_progress(90.0, "Assessing training suitability...");
        let analysis = VideoAnalysis::new(
            path,
            basic_info,
            audio_features,
            visual_features,
            &self.scoring,
        );

        on_progress(100.0, "Video analysis completed!");
        Ok(analysis)
    }

    fn audio_track(&self, path: &Path, scratch: &Path) -> SignalGroup<VideoAudioFeatures> {
        let wav = scratch.join("audio.wav");
        if let Err(e) = self.toolkit.extract_audio(path, &wav, self.sample_rate) {
            warn!(file = %path.display(), error = %e, "Audio track extraction failed");
            return SignalGroup::failed(e.to_string());
        }
        let audio = match load_mono(&wav, self.sample_rate) {
            Ok(audio) => audio,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Audio track decode failed");
                return SignalGroup::failed(format!("{e:#}"));
            }
        };
        let result = self.track_features(&audio.samples);
        if let Err(e) = &result {
            warn!(file = %path.display(), error = %e, "Audio track analysis failed");
        }
        SignalGroup::from_result(result)
    }

    /// Spectral summary and voice activity of a decoded audio track
    pub fn track_features(&self, samples: &[f32]) -> Result<VideoAudioFeatures, AnalysisError> {
        if samples.is_empty() {
            return Err(AnalysisError::TooShort("audio track is empty".to_string()));
        }
        let ctx = FeatureContext::new(samples, self.sample_rate);
        let duration = ctx.duration();
        let voice_segments = self.voice_activity.detect(samples, self.sample_rate);
        let voice_activity_ratio = if duration > 0.0 {
            voice_segments.len() as f64 / duration
        } else {
            0.0
        };

        Ok(VideoAudioFeatures {
            duration,
            mean_energy: stats::mean(ctx.rms()),
            spectral_centroid_mean: stats::mean(ctx.centroids()),
            spectral_rolloff_mean: stats::mean(ctx.rolloff()),
            zero_crossing_rate_mean: features::mean_zero_crossing_rate(samples),
            mfcc_mean: features::mfcc_mean(&ctx),
            tempo: ctx.tempo(),
            voice_segments,
            voice_activity_ratio,
        })
    }

    fn visual_features(
        &self,
        path: &Path,
        probe: &ProbeInfo,
        scratch: &Path,
        on_progress: &mut impl FnMut(f64, &str),
    ) -> SignalGroup<VisualFeatures> {
        let capabilities = self.inspector.capabilities();
        if !capabilities.any() {
            debug!(file = %path.display(), "No frame inspector capabilities, skipping frames");
            let reason = "frame inspector unavailable";
            return SignalGroup::Ok(VisualFeatures {
                analyzed_frames: 0,
                face_detection: SignalGroup::unavailable(reason),
                pose_landmarks_count: 0,
                hand_gestures_count: 0,
                movement_analysis: SignalGroup::unavailable(reason),
                gesture_analysis: SignalGroup::unavailable(reason),
            });
        }

        let stride = (probe.frame_count / TARGET_FRAMES).max(1);
        let max_frames = (probe.frame_count / stride + 1) as usize;
        let frames = match self.toolkit.sample_frames(
            path,
            stride,
            max_frames,
            probe.fps,
            &scratch.join("frames"),
        ) {
            Ok(frames) => frames,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Frame sampling failed");
                return SignalGroup::failed(e.to_string());
            }
        };

        let total = frames.len();
        let mut analyzed = 0usize;
        let mut face_frames = 0usize;
        let mut confidences = Vec::new();
        let mut poses = Vec::new();
        let mut hands = Vec::new();

        for (i, frame) in frames.iter().enumerate() {
            let found = match self.inspector.inspect(&frame.path) {
                Ok(found) => found,
                Err(e) => {
                    warn!(frame = %frame.path.display(), error = %e, "Frame inspection failed");
                    continue;
                }
            };
            analyzed += 1;

            if !found.faces.is_empty() {
                face_frames += 1;
            }
            confidences.extend(found.faces.iter().map(|f| f.confidence));
            if let Some(points) = &found.pose {
                poses.extend(landmarks::pose_metrics(points, frame.timestamp));
            }
            hands.extend(
                found
                    .hands
                    .iter()
                    .filter_map(|points| landmarks::hand_metrics(points, frame.timestamp)),
            );

            if analyzed % PROGRESS_EVERY_FRAMES == 0 {
                let progress = 40.0 + 40.0 * (i + 1) as f64 / total as f64;
                on_progress(
                    progress,
                    &format!("Analyzing frame {}/{}...", frame.index, probe.frame_count),
                );
            }
        }

        if analyzed == 0 && total > 0 {
            return SignalGroup::failed("no frame could be inspected");
        }

        let face_detection = if capabilities.faces {
            SignalGroup::Ok(FaceStats {
                face_detection_rate: if analyzed > 0 {
                    face_frames as f64 / analyzed as f64
                } else {
                    0.0
                },
                average_face_confidence: if confidences.is_empty() {
                    0.0
                } else {
                    confidences.iter().sum::<f64>() / confidences.len() as f64
                },
                face_frames,
            })
        } else {
            SignalGroup::unavailable("face detection not supported by inspector")
        };

        let movement_analysis = if capabilities.pose {
            SignalGroup::from_result(landmarks::movement_stats(&poses))
        } else {
            SignalGroup::unavailable("pose estimation not supported by inspector")
        };

        let gesture_analysis = if capabilities.hands {
            SignalGroup::Ok(landmarks::gesture_stats(&hands))
        } else {
            SignalGroup::unavailable("hand tracking not supported by inspector")
        };

        debug!(
            file = %path.display(),
            analyzed,
            poses = poses.len(),
            hands = hands.len(),
            "Visual pass complete"
        );

        SignalGroup::Ok(VisualFeatures {
            analyzed_frames: analyzed,
            face_detection,
            pose_landmarks_count: poses.len(),
            hand_gestures_count: hands.len(),
            movement_analysis,
            gesture_analysis,
        })
    }

    /// Cut the record's training segments from `path` into `out_dir/training_clip_NN.mp4`
    pub fn extract_training_clips(
        &self,
        path: &Path,
        record: &VideoAnalysis,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, AnalysisError> {
        info!(file = %path.display(), "Extracting training clips");
        let voice_segments = record
            .audio_features()
            .ok()
            .map(|a| a.voice_segments.as_slice())
            .unwrap_or(&[]);
        let ranges = clips::training_segments(voice_segments, record.basic_info().duration);
        if ranges.is_empty() {
            warn!(file = %path.display(), "No suitable training segments found");
            return Ok(Vec::new());
        }

        std::fs::create_dir_all(out_dir)?;
        let mut written = Vec::with_capacity(ranges.len());
        for (i, range) in ranges.iter().enumerate() {
            let out = out_dir.join(format!("training_clip_{:02}.mp4", i + 1));
            self.toolkit
                .cut_clip(path, *range, &out)
                .map_err(|e| AnalysisError::Toolkit(e.to_string()))?;
            info!(
                clip = %out.display(),
                start = range.start,
                end = range.end,
                "Extracted clip"
            );
            written.push(out);
        }
        Ok(written)
    }

    /// Write the audio track of `video` as mono WAV at the analysis rate
    pub fn extract_audio_track(&self, video: &Path, out_wav: &Path) -> Result<(), AnalysisError> {
        if let Some(parent) = out_wav.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.toolkit
            .extract_audio(video, out_wav, self.sample_rate)
            .map_err(|e| AnalysisError::Toolkit(e.to_string()))
    }
}

/// Scratch directory removed on drop
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn create(root: &Path) -> std::io::Result<Self> {
        let dir = root.join(format!("persona_video_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        Ok(Self(dir))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            debug!(dir = %self.0.display(), error = %e, "Scratch cleanup failed");
        }
    }
}

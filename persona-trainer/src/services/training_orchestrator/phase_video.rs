//! VIDEO stage: analyze uploads, cut training clips, reuse clip audio for the voice model

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{PipelineError, RunContext, StageSpan, TrainingOrchestrator, VISUAL_FEATURES_FILE};
use crate::models::training_log::{ModalityLog, VideoLog};
use crate::models::video_analysis::VideoAnalysis;
use crate::services::audio_analyzer::AnalysisError;
use crate::services::feature_aggregator;
use crate::utils::{remove_if_exists, write_json_atomic};

impl TrainingOrchestrator {
    pub(super) async fn phase_video(
        &self,
        ctx: &mut RunContext,
        files: &[PathBuf],
        span: StageSpan,
    ) -> Result<(), PipelineError> {
        let video_dir = ctx.persona_dir.join("video");
        tokio::fs::create_dir_all(&video_dir).await?;

        // videos take the first 80% of the stage, clip audio the rest
        let analysis_span = StageSpan {
            start: span.start,
            end: span.at(4, 5),
        };
        let audio_span = StageSpan {
            start: analysis_span.end,
            end: span.end,
        };

        let bar = self.thresholds.video_acceptance;
        let mut videos: ModalityLog<VideoAnalysis> = ModalityLog::new(files.len());
        let mut clips = BTreeMap::new();
        let mut clip_tracks = Vec::new();
        for (i, file) in files.iter().enumerate() {
            self.report(
                ctx,
                "video",
                analysis_span.at(i, files.len()),
                &format!("Analyzing video file {}/{}", i + 1, files.len()),
            )
            .await;

            if !file.exists() {
                warn!(file = %file.display(), "Video file not found");
                videos.missing_files.push(file.clone());
                continue;
            }
            let analysis = match self.analyze_video_file(file.clone()).await? {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Video analysis failed");
                    videos.record_failure(file.clone(), e);
                    continue;
                }
            };

            let score = analysis.training_suitability().score;
            if !analysis.is_suitable(bar) {
                warn!(file = %file.display(), score, "Video quality too low for training");
                videos.analyses.push(analysis);
                continue;
            }
            info!(file = %file.display(), score, "Video suitable for training");
            videos.suitable_files.push(file.clone());

            let clip_dir = video_dir.join(format!("clips_{:03}", i));
            let (analysis, cut) = self.cut_clips(file.clone(), analysis, clip_dir).await?;
            videos.analyses.push(analysis);
            match cut {
                Ok(cut) => {
                    info!(file = %file.display(), clips = cut.len(), "Extracted training clips");
                    for clip in &cut {
                        if let Some(track) = self.clip_audio(&video_dir, i, clip).await? {
                            clip_tracks.push(track);
                        }
                    }
                    clips.entry(file.clone()).or_insert_with(Vec::new).extend(cut);
                }
                Err(e) => warn!(file = %file.display(), error = %e, "Clip extraction failed"),
            }
        }

        let extracted = self
            .analyze_audio_batch(
                ctx,
                "video",
                &clip_tracks,
                self.thresholds.extracted_audio_acceptance,
                audio_span,
            )
            .await?;
        let bonus = extracted.suitable_files.clone();

        let suitable: Vec<&VideoAnalysis> =
            videos.analyses.iter().filter(|a| a.is_suitable(bar)).collect();
        let features_path = ctx.persona_dir.join(VISUAL_FEATURES_FILE);
        if suitable.is_empty() {
            warn!(persona_id = %ctx.persona_id, "No suitable video files found");
            remove_if_exists(&features_path)?;
        } else {
            let profile = feature_aggregator::visual_profile(&suitable);
            write_json_atomic(&features_path, &profile)?;
            info!(persona_id = %ctx.persona_id, suitable = suitable.len(), "Visual features written");
        }

        let log = VideoLog {
            videos,
            clips,
            extracted_audio: extracted,
        };
        write_json_atomic(&video_dir.join("video_analysis.json"), &log)?;

        if !bonus.is_empty() {
            info!(
                persona_id = %ctx.persona_id,
                tracks = bonus.len(),
                "Adding audio extracted from video to voice training"
            );
            ctx.voice_inputs.extend(bonus);
            self.train_voice(ctx, ctx.voice_inputs.clone()).await?;
        }
        Ok(())
    }

    async fn analyze_video_file(
        &self,
        path: PathBuf,
    ) -> Result<Result<VideoAnalysis, AnalysisError>, PipelineError> {
        let analyzer = self.video_analyzer.clone();
        Ok(tokio::task::spawn_blocking(move || analyzer.analyze(&path)).await?)
    }

    /// Cut training clips on the blocking pool, handing the record back
    async fn cut_clips(
        &self,
        path: PathBuf,
        analysis: VideoAnalysis,
        clip_dir: PathBuf,
    ) -> Result<(VideoAnalysis, Result<Vec<PathBuf>, AnalysisError>), PipelineError> {
        let analyzer = self.video_analyzer.clone();
        Ok(tokio::task::spawn_blocking(move || {
            let cut = analyzer.extract_training_clips(&path, &analysis, &clip_dir);
            (analysis, cut)
        })
        .await?)
    }

    /// Extract the audio track of one clip; `None` when the clip has none
    async fn clip_audio(
        &self,
        video_dir: &Path,
        video_index: usize,
        clip: &Path,
    ) -> Result<Option<PathBuf>, PipelineError> {
        let stem = clip
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip".to_string());
        let track = video_dir.join(format!("clip_audio_{:03}_{}.wav", video_index, stem));

        let analyzer = self.video_analyzer.clone();
        let clip = clip.to_path_buf();
        let out = track.clone();
        let result =
            tokio::task::spawn_blocking(move || analyzer.extract_audio_track(&clip, &out)).await?;
        match result {
            Ok(()) => {
                debug!(track = %track.display(), "Extracted clip audio");
                Ok(Some(track))
            }
            Err(e) => {
                warn!(track = %track.display(), error = %e, "Failed to extract audio from clip");
                Ok(None)
            }
        }
    }
}

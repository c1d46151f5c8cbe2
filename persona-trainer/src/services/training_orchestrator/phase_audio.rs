//! AUDIO stage: analyze uploads, train the voice model, cut voice segments

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{PipelineError, RunContext, StageSpan, TrainingOrchestrator, VOICE_FEATURES_FILE};
use crate::models::audio_analysis::AudioAnalysis;
use crate::models::training_log::ModalityLog;
use crate::services::audio_analyzer::AnalysisError;
use crate::services::feature_aggregator;
use crate::utils::{remove_if_exists, write_json_atomic};

impl TrainingOrchestrator {
    pub(super) async fn phase_audio(
        &self,
        ctx: &mut RunContext,
        files: &[PathBuf],
        span: StageSpan,
    ) -> Result<(), PipelineError> {
        let audio_dir = ctx.persona_dir.join("audio");
        tokio::fs::create_dir_all(&audio_dir).await?;

        let bar = self.thresholds.audio_acceptance;
        let log = self
            .analyze_audio_batch(ctx, "audio", files, bar, span)
            .await?;
        write_json_atomic(&audio_dir.join("audio_analysis.json"), &log)?;

        let features_path = ctx.persona_dir.join(VOICE_FEATURES_FILE);
        if log.suitable_files.is_empty() {
            warn!(
                persona_id = %ctx.persona_id,
                analyzed = log.analyses.len(),
                "No suitable audio files found for voice training"
            );
            remove_if_exists(&features_path)?;
            return Ok(());
        }

        let suitable: Vec<&AudioAnalysis> =
            log.analyses.iter().filter(|a| a.is_suitable(bar)).collect();
        let profile = feature_aggregator::voice_profile(&suitable);
        write_json_atomic(&features_path, &profile)?;
        info!(
            persona_id = %ctx.persona_id,
            suitable = suitable.len(),
            total = log.total_files,
            "Voice features written"
        );

        ctx.voice_inputs = log.suitable_files.clone();
        if self.train_voice(ctx, log.suitable_files.clone()).await? {
            let written = self
                .write_voice_segments(&audio_dir.join("voice_segments"), log.suitable_files)
                .await?;
            info!(persona_id = %ctx.persona_id, segments = written, "Voice segments extracted");
        }
        Ok(())
    }

    /// Analyze audio files in input order on the blocking pool
    ///
    /// Missing files and analysis errors are recorded in the returned log; only a worker
    /// failure is an error.
    pub(super) async fn analyze_audio_batch(
        &self,
        ctx: &RunContext,
        step: &str,
        files: &[PathBuf],
        bar: f64,
        span: StageSpan,
    ) -> Result<ModalityLog<AudioAnalysis>, PipelineError> {
        let mut log = ModalityLog::new(files.len());
        for (i, file) in files.iter().enumerate() {
            self.report(
                ctx,
                step,
                span.at(i, files.len()),
                &format!("Analyzing audio file {}/{}", i + 1, files.len()),
            )
            .await;

            if !file.exists() {
                warn!(file = %file.display(), "Audio file not found");
                log.missing_files.push(file.clone());
                continue;
            }
            match self.analyze_audio_file(file.clone()).await? {
                Ok(analysis) => {
                    let score = analysis.training_suitability().score;
                    if analysis.is_suitable(bar) {
                        info!(file = %file.display(), score, "Audio file suitable for training");
                        log.suitable_files.push(file.clone());
                    } else {
                        debug!(file = %file.display(), score, bar, "Audio file below acceptance bar");
                    }
                    log.analyses.push(analysis);
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Audio analysis failed");
                    log.record_failure(file.clone(), e);
                }
            }
        }
        Ok(log)
    }

    async fn analyze_audio_file(
        &self,
        path: PathBuf,
    ) -> Result<Result<AudioAnalysis, AnalysisError>, PipelineError> {
        let analyzer = self.audio_analyzer.clone();
        Ok(tokio::task::spawn_blocking(move || analyzer.analyze(&path)).await?)
    }

    /// Replace `segments_dir` with `segment_NNN.wav` files numbered across all inputs
    async fn write_voice_segments(
        &self,
        segments_dir: &Path,
        files: Vec<PathBuf>,
    ) -> Result<usize, PipelineError> {
        let analyzer = self.audio_analyzer.clone();
        let min_duration = self.thresholds.min_voice_segment_seconds;
        let segments_dir = segments_dir.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<usize, PipelineError> {
            if segments_dir.exists() {
                std::fs::remove_dir_all(&segments_dir)?;
            }
            std::fs::create_dir_all(&segments_dir)?;

            let mut written = 0usize;
            for file in &files {
                match analyzer.extract_voice_segments(file, min_duration, &segments_dir, written) {
                    Ok(paths) => written += paths.len(),
                    // unwritable output directory
                    Err(AnalysisError::Io(e)) => return Err(PipelineError::Io(e)),
                    Err(e @ AnalysisError::Internal(_)) => {
                        return Err(PipelineError::stage("audio", e.to_string()))
                    }
                    Err(e) => {
                        warn!(file = %file.display(), error = %e, "Voice segment extraction failed");
                    }
                }
            }
            Ok(written)
        })
        .await?
    }
}

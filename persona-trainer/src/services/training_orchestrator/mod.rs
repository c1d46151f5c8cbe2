//! Persona training orchestrator
//!
//! Drives one job per persona through its stages:
//!
//! AUDIO → VIDEO → TEXT → IMAGES → SYNTHESIS
//!
//! Only modalities with input files run. Each stage is handled by a `phase_*` method in its own
//! file. The job's cancellation token is checked before every stage, so a cancel request lets
//! the stage in flight finish and stops the run at the next boundary.
//!
//! Per-file failures are recorded as data in the modality's audit log. Anything a stage cannot
//! recover from (an artifact write, a worker panic) fails the whole job and no persona model is
//! written for the run.

mod phase_audio;
mod phase_images;
mod phase_synthesis;
mod phase_text;
mod phase_video;

use chrono::Utc;
use persona_common::config::TrainingThresholds;
use persona_common::events::{EventBus, TrainingEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::models::training_data::{Modality, TrainingData};
use crate::models::training_job::{JobStatus, TrainingProgress};
use crate::services::audio_analyzer::AudioAnalyzer;
use crate::services::job_store::JobStore;
use crate::services::suitability_scorer::ScoringTable;
use crate::services::video_analyzer::{FfmpegToolkit, UnavailableInspector, VideoAnalyzer};
use crate::services::voice_engine::{ReferenceVoiceEngine, VoiceCloningEngine};

pub const VOICE_FEATURES_FILE: &str = "advanced_voice_features.json";
pub const VISUAL_FEATURES_FILE: &str = "advanced_visual_features.json";
pub const PERSONALITY_FEATURES_FILE: &str = "personality_features.json";
pub const PERSONA_MODEL_FILE: &str = "persona_model.json";

/// Floor of the percentage reported when synthesis starts
const SYNTHESIS_PERCENTAGE: f64 = 95.0;

/// Caller-supplied observer of a job's progress snapshots
pub type ProgressCallback = Arc<dyn Fn(&TrainingProgress) + Send + Sync>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {message}")]
    Stage { stage: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Common(#[from] persona_common::Error),
}

impl PipelineError {
    fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

enum RunOutcome {
    Completed,
    Cancelled,
}

/// Percentage range one stage reports within
///
/// Stage k of n runs from `k/n` to `(k+1)/n`; the end value is reported once the stage's work
/// is done, so a single-stage run goes straight from 0 to 100.
#[derive(Debug, Clone, Copy)]
struct StageSpan {
    start: f64,
    end: f64,
}

impl StageSpan {
    /// Percentage when `done` of `total` items have finished
    fn at(&self, done: usize, total: usize) -> f64 {
        if total == 0 {
            return self.start;
        }
        self.start + (self.end - self.start) * done as f64 / total as f64
    }
}

/// State carried across the stages of one run
struct RunContext {
    persona_id: String,
    persona_dir: PathBuf,
    callback: Option<ProgressCallback>,
    /// Suitable voice recordings gathered so far, direct uploads first
    voice_inputs: Vec<PathBuf>,
}

/// Training orchestrator service
///
/// Cloning is cheap and every clone shares the same job store.
#[derive(Clone)]
pub struct TrainingOrchestrator {
    root: PathBuf,
    jobs: JobStore,
    event_bus: EventBus,
    audio_analyzer: AudioAnalyzer,
    video_analyzer: VideoAnalyzer,
    voice_engine: Arc<dyn VoiceCloningEngine>,
    thresholds: TrainingThresholds,
}

impl TrainingOrchestrator {
    /// Orchestrator writing under `root/<persona_id>/`
    ///
    /// Defaults: ffmpeg on PATH, no frame inspector, the reference voice engine and the default
    /// acceptance thresholds.
    pub fn new(root: impl Into<PathBuf>, jobs: JobStore, event_bus: EventBus) -> Self {
        Self {
            root: root.into(),
            jobs,
            event_bus,
            audio_analyzer: AudioAnalyzer::default(),
            video_analyzer: VideoAnalyzer::new(
                Arc::new(FfmpegToolkit::default()),
                Arc::new(UnavailableInspector),
                ScoringTable::default_video(),
            ),
            voice_engine: Arc::new(ReferenceVoiceEngine::new()),
            thresholds: TrainingThresholds::default(),
        }
    }

    pub fn with_audio_analyzer(mut self, analyzer: AudioAnalyzer) -> Self {
        self.audio_analyzer = analyzer;
        self
    }

    pub fn with_video_analyzer(mut self, analyzer: VideoAnalyzer) -> Self {
        self.video_analyzer = analyzer;
        self
    }

    pub fn with_voice_engine(mut self, engine: Arc<dyn VoiceCloningEngine>) -> Self {
        self.voice_engine = engine;
        self
    }

    pub fn with_thresholds(mut self, thresholds: TrainingThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub fn persona_dir(&self, persona_id: &str) -> PathBuf {
        self.root.join(persona_id)
    }

    /// Train a persona and wait for the job to finish
    ///
    /// Returns `true` only when the job completed. A persona whose previous job is still active
    /// gets `false` and the running job is left alone.
    pub async fn train_persona(
        &self,
        persona_id: &str,
        data: TrainingData,
        on_progress: Option<ProgressCallback>,
    ) -> bool {
        let Some(handle) = self.submit(persona_id, data, on_progress).await else {
            return false;
        };
        match handle.await {
            Ok(completed) => completed,
            Err(e) => {
                error!(persona_id = %persona_id, error = %e, "Training worker panicked");
                self.jobs
                    .transition(persona_id, JobStatus::Failed, &e.to_string())
                    .await;
                false
            }
        }
    }

    /// Register the job and start its worker in the background
    ///
    /// `None` when the persona already has an active job.
    pub async fn submit(
        &self,
        persona_id: &str,
        data: TrainingData,
        on_progress: Option<ProgressCallback>,
    ) -> Option<JoinHandle<bool>> {
        let Some(cancel) = self.jobs.register(persona_id).await else {
            warn!(persona_id = %persona_id, "Training already in progress");
            return None;
        };
        let this = self.clone();
        let ctx = RunContext {
            persona_id: persona_id.to_string(),
            persona_dir: self.persona_dir(persona_id),
            callback: on_progress,
            voice_inputs: Vec::new(),
        };
        Some(tokio::spawn(async move { this.execute(ctx, data, cancel).await }))
    }

    pub async fn training_progress(&self, persona_id: &str) -> Option<TrainingProgress> {
        self.jobs.progress(persona_id).await
    }

    /// Request cancellation; honored at the next stage boundary
    pub async fn cancel_training(&self, persona_id: &str) -> bool {
        self.jobs.cancel(persona_id).await
    }

    async fn execute(&self, mut ctx: RunContext, data: TrainingData, cancel: CancellationToken) -> bool {
        let start_time = std::time::Instant::now();
        let outcome = self.run(&mut ctx, &data, &cancel).await;
        let completed = self.finish(&ctx, outcome).await;
        info!(
            persona_id = %ctx.persona_id,
            completed,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Training job finished"
        );
        completed
    }

    async fn run(
        &self,
        ctx: &mut RunContext,
        data: &TrainingData,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let modalities = data.modalities();
        if self
            .jobs
            .transition(&ctx.persona_id, JobStatus::Running, "Starting training")
            .await
            .is_none()
        {
            return Ok(RunOutcome::Cancelled);
        }
        info!(
            persona_id = %ctx.persona_id,
            modalities = ?modalities,
            "Starting persona training"
        );
        self.event_bus.emit_lossy(TrainingEvent::TrainingStarted {
            persona_id: ctx.persona_id.clone(),
            modalities: modalities.iter().map(|m| m.to_string()).collect(),
            timestamp: Utc::now(),
        });

        tokio::fs::create_dir_all(&ctx.persona_dir).await?;

        let n = modalities.len();
        for (k, &modality) in modalities.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(persona_id = %ctx.persona_id, stage = %modality, "Cancelled before stage");
                return Ok(RunOutcome::Cancelled);
            }
            let span = StageSpan {
                start: k as f64 / n as f64 * 100.0,
                end: (k + 1) as f64 / n as f64 * 100.0,
            };
            let files = data.files(modality);
            self.report(
                ctx,
                modality.as_str(),
                span.start,
                &format!("Processing {} {} files", files.len(), modality),
            )
            .await;
            info!(persona_id = %ctx.persona_id, stage = %modality, files = files.len(), "Stage started");

            let result = match modality {
                Modality::Audio => self.phase_audio(ctx, files, span).await,
                Modality::Video => self.phase_video(ctx, files, span).await,
                Modality::Text => self.phase_text(ctx, files).await,
                Modality::Images => self.phase_images(ctx, files).await,
            };
            result.map_err(|e| match e {
                stage @ PipelineError::Stage { .. } => stage,
                other => PipelineError::stage(modality.as_str(), other.to_string()),
            })?;
            self.report(
                ctx,
                modality.as_str(),
                span.end,
                &format!("Finished {} {} files", files.len(), modality),
            )
            .await;
        }

        if cancel.is_cancelled() {
            info!(persona_id = %ctx.persona_id, "Cancelled before synthesis");
            return Ok(RunOutcome::Cancelled);
        }
        let current = self
            .jobs
            .progress(&ctx.persona_id)
            .await
            .map_or(0.0, |p| p.progress_percentage);
        self.report(
            ctx,
            "synthesis",
            current.max(SYNTHESIS_PERCENTAGE),
            "Synthesizing persona model",
        )
        .await;
        self.phase_synthesis(ctx)
            .await
            .map_err(|e| PipelineError::stage("synthesis", e.to_string()))?;
        Ok(RunOutcome::Completed)
    }

    /// Move the job to its terminal state and deliver the final callback
    async fn finish(&self, ctx: &RunContext, outcome: Result<RunOutcome, PipelineError>) -> bool {
        let id = ctx.persona_id.as_str();
        match outcome {
            Ok(RunOutcome::Completed) => {
                let details = "Training completed successfully";
                self.jobs.update_progress(id, "completed", 100.0, details).await;
                if self.jobs.transition(id, JobStatus::Completed, details).await.is_none() {
                    // cancelled while the last stage was running
                    self.finish_cancelled(ctx).await;
                    return false;
                }
                info!(persona_id = %id, "Persona training completed");
                self.event_bus.emit_lossy(TrainingEvent::TrainingCompleted {
                    persona_id: id.to_string(),
                    details: details.to_string(),
                    timestamp: Utc::now(),
                });
                self.notify(ctx).await;
                true
            }
            Ok(RunOutcome::Cancelled) => {
                self.finish_cancelled(ctx).await;
                false
            }
            Err(e) => {
                let message = e.to_string();
                error!(persona_id = %id, error = %message, "Persona training failed");
                if self.jobs.transition(id, JobStatus::Failed, &message).await.is_none() {
                    self.finish_cancelled(ctx).await;
                    return false;
                }
                self.event_bus.emit_lossy(TrainingEvent::TrainingFailed {
                    persona_id: id.to_string(),
                    error: message,
                    timestamp: Utc::now(),
                });
                self.notify(ctx).await;
                false
            }
        }
    }

    async fn finish_cancelled(&self, ctx: &RunContext) {
        let id = ctx.persona_id.as_str();
        self.jobs
            .transition(id, JobStatus::Cancelled, "Training cancelled")
            .await;
        info!(persona_id = %id, "Persona training cancelled");
        let details = self
            .jobs
            .progress(id)
            .await
            .map(|p| p.details)
            .unwrap_or_else(|| "Training cancelled".to_string());
        self.event_bus.emit_lossy(TrainingEvent::TrainingCancelled {
            persona_id: id.to_string(),
            details,
            timestamp: Utc::now(),
        });
        self.notify(ctx).await;
    }

    /// Record progress, broadcast it and pass it to the caller
    ///
    /// Updates to a job that already reached a terminal state are dropped.
    async fn report(&self, ctx: &RunContext, step: &str, percentage: f64, details: &str) {
        let Some(snapshot) = self
            .jobs
            .update_progress(&ctx.persona_id, step, percentage, details)
            .await
        else {
            return;
        };
        self.event_bus.emit_lossy(TrainingEvent::TrainingProgress {
            persona_id: snapshot.persona_id.clone(),
            current_step: snapshot.current_step.clone(),
            progress_percentage: snapshot.progress_percentage,
            details: snapshot.details.clone(),
            timestamp: Utc::now(),
        });
        if let Some(callback) = &ctx.callback {
            callback(&snapshot);
        }
    }

    async fn notify(&self, ctx: &RunContext) {
        if let (Some(callback), Some(snapshot)) =
            (&ctx.callback, self.jobs.progress(&ctx.persona_id).await)
        {
            callback(&snapshot);
        }
    }

    /// Hand `files` to the voice-cloning engine on the blocking pool
    async fn train_voice(&self, ctx: &RunContext, files: Vec<PathBuf>) -> Result<bool, PipelineError> {
        let engine = self.voice_engine.clone();
        let persona_id = ctx.persona_id.clone();
        let voice_dir = ctx.persona_dir.join("voice");
        let count = files.len();
        let trained = tokio::task::spawn_blocking(move || {
            engine.train_voice_model(&persona_id, &voice_dir, &files, &mut |pct: f64, msg: &str| {
                tracing::debug!(progress = pct, message = msg, "Voice training progress");
            })
        })
        .await?;
        if trained {
            info!(persona_id = %ctx.persona_id, files = count, "Voice model trained");
        } else {
            error!(persona_id = %ctx.persona_id, files = count, "Voice model training failed");
        }
        Ok(trained)
    }
}

//! persona-trainer library interface
//!
//! Multimodal persona training: per-file audio/video analysis, suitability scoring, feature
//! aggregation and the job orchestrator, plus the HTTP surface built on them.

pub mod api;
pub mod dsp;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use persona_common::config::TomlConfig;
use persona_common::events::EventBus;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::services::audio_analyzer::AudioAnalyzer;
use crate::services::job_store::JobStore;
use crate::services::suitability_scorer::ScoringTable;
use crate::services::training_orchestrator::TrainingOrchestrator;
use crate::services::video_analyzer::{
    FfmpegToolkit, FrameInspector, SidecarInspector, UnavailableInspector, VideoAnalyzer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: TrainingOrchestrator,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(orchestrator: TrainingOrchestrator, event_bus: EventBus) -> Self {
        Self {
            orchestrator,
            event_bus,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build the orchestrator described by `config`, writing under `root`
pub fn build_orchestrator(
    config: &TomlConfig,
    root: PathBuf,
    jobs: JobStore,
    event_bus: EventBus,
) -> anyhow::Result<TrainingOrchestrator> {
    config.thresholds.validate()?;

    let audio_scoring =
        ScoringTable::or_default(config.scoring.audio.as_ref(), ScoringTable::default_audio)?;

    Ok(TrainingOrchestrator::new(root, jobs, event_bus)
        .with_audio_analyzer(AudioAnalyzer::new(audio_scoring))
        .with_video_analyzer(video_analyzer_from_config(config)?)
        .with_thresholds(config.thresholds))
}

/// Video analyzer using the configured tools and scoring table
pub fn video_analyzer_from_config(config: &TomlConfig) -> anyhow::Result<VideoAnalyzer> {
    let scoring =
        ScoringTable::or_default(config.scoring.video.as_ref(), ScoringTable::default_video)?;
    let inspector: Arc<dyn FrameInspector> = match &config.tools.frame_inspector {
        Some(command) => Arc::new(SidecarInspector::new(command)?),
        None => Arc::new(UnavailableInspector),
    };
    let toolkit = FfmpegToolkit::new(config.tools.ffmpeg.clone(), config.tools.ffprobe.clone());
    if !toolkit.is_available() {
        tracing::warn!(
            ffmpeg = %config.tools.ffmpeg,
            ffprobe = %config.tools.ffprobe,
            "ffmpeg/ffprobe not runnable, video files will fail analysis"
        );
    }
    Ok(VideoAnalyzer::new(Arc::new(toolkit), inspector, scoring))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::trace::TraceLayer;

    Router::new()
        .merge(api::training_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

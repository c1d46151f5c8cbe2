//! Test helper utilities
//!
//! Shared fixtures for persona-trainer integration tests

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod audio_generator;
pub mod fakes;

pub use audio_generator::{generate_test_library, generate_test_wav, write_text_sample, AudioConfig};
pub use fakes::{stub_video_analyzer, FakeToolkit, GatedEngine, RecordingEngine};

use persona_common::config::TrainingThresholds;
use persona_common::events::EventBus;
use persona_trainer::services::job_store::JobStore;
use persona_trainer::services::training_orchestrator::TrainingOrchestrator;
use std::path::Path;
use std::sync::Arc;

/// Thresholds that accept every analyzed file
pub fn accept_all() -> TrainingThresholds {
    TrainingThresholds {
        audio_acceptance: 0.0,
        video_acceptance: 0.0,
        extracted_audio_acceptance: 0.0,
        ..TrainingThresholds::default()
    }
}

/// Orchestrator writing under `root` with no external tools
///
/// Video goes through a [`FakeToolkit`] without an audio track and voice training through a
/// [`RecordingEngine`].
pub fn create_test_orchestrator(root: &Path) -> (TrainingOrchestrator, Arc<RecordingEngine>) {
    let engine = Arc::new(RecordingEngine::default());
    let orchestrator = TrainingOrchestrator::new(root, JobStore::new(), EventBus::new(256))
        .with_video_analyzer(stub_video_analyzer(FakeToolkit::new(45.0)))
        .with_voice_engine(engine.clone());
    (orchestrator, engine)
}

//! Training services

pub mod audio_analyzer;
pub mod feature_aggregator;
pub mod image_processor;
pub mod job_store;
pub mod media_scanner;
pub mod suitability_scorer;
pub mod text_analyzer;
pub mod training_orchestrator;
pub mod video_analyzer;
pub mod voice_activity;
pub mod voice_engine;

pub use audio_analyzer::{AnalysisError, AudioAnalyzer};
pub use feature_aggregator::{aggregate, FeatureSource};
pub use job_store::JobStore;
pub use media_scanner::{MediaScanner, ScanError};
pub use suitability_scorer::{ScoringError, ScoringTable};
pub use training_orchestrator::{PipelineError, ProgressCallback, TrainingOrchestrator};
pub use video_analyzer::{FrameInspector, VideoAnalyzer, VideoToolkit};
pub use voice_activity::VoiceActivityDetector;
pub use voice_engine::{ReferenceVoiceEngine, VoiceCloningEngine};

//! Data models for persona training

pub mod audio_analysis;
pub mod feature_summary;
pub mod persona_model;
pub mod signal_group;
pub mod suitability;
pub mod training_data;
pub mod training_job;
pub mod training_log;
pub mod video_analysis;

pub use audio_analysis::{AudioAnalysis, AudioSignalGroups, BasicInfo};
pub use feature_summary::{FeatureStat, FeatureSummary};
pub use persona_model::{PersonaModel, PersonalityProfile, VisualProfile, VoiceProfile};
pub use signal_group::SignalGroup;
pub use suitability::{Signals, Suitability, SuitabilityTier};
pub use training_data::{MediaAsset, Modality, TrainingData};
pub use training_job::{JobStatus, TrainingJob, TrainingProgress};
pub use training_log::{FileFailure, ModalityLog, VideoLog};
pub use video_analysis::{TimeRange, VideoAnalysis, VideoBasicInfo};

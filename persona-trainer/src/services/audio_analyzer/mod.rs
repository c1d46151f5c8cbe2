//! Per-file audio analysis for voice training
//!
//! **Stages** (progress reported at each):
//! 10 load, 20 basic info, 35 spectral, 50 prosodic, 65 voice characteristics,
//! 80 emotional indicators, 90 voice quality, 95 suitability, 100 done.
//!
//! Only a missing or undecodable file fails the whole analysis. Every other stage is recorded
//! as a [`SignalGroup`] so one failing stage leaves the rest intact.

pub mod features;
mod segments;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dsp::ANALYSIS_SAMPLE_RATE;
use crate::models::audio_analysis::{AudioAnalysis, AudioSignalGroups};
use crate::models::signal_group::SignalGroup;
use crate::services::suitability_scorer::ScoringTable;
use crate::utils::load_mono;

pub use features::FeatureContext;
pub use segments::{detect_voice_regions, DEFAULT_MIN_SEGMENT_SECONDS};

/// Analysis errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Signal too short: {0}")]
    TooShort(String),

    #[error("Degenerate signal: {0}")]
    Degenerate(String),

    #[error("Media toolkit error: {0}")]
    Toolkit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Audio analyzer service
#[derive(Debug, Clone)]
pub struct AudioAnalyzer {
    sample_rate: u32,
    scoring: ScoringTable,
}

impl AudioAnalyzer {
    pub fn new(scoring: ScoringTable) -> Self {
        Self {
            sample_rate: ANALYSIS_SAMPLE_RATE,
            scoring,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn scoring(&self) -> &ScoringTable {
        &self.scoring
    }

    /// Analyze one file without progress reporting
    pub fn analyze(&self, path: &Path) -> Result<AudioAnalysis, AnalysisError> {
        self.analyze_with_progress(path, |_, _| {})
    }

    /// Analyze one file, reporting `(percent, message)` at each stage
    ///
    /// On failure `on_progress(-1, ..)` is called exactly once before the error is returned.
    pub fn analyze_with_progress(
        &self,
        path: &Path,
        mut on_progress: impl FnMut(f64, &str),
    ) -> Result<AudioAnalysis, AnalysisError> {
        info!(file = %path.display(), "Starting audio analysis");
        let result = self.run(path, &mut on_progress);
        match &result {
            Ok(analysis) => info!(
                file = %path.display(),
                score = analysis.training_suitability().score,
                "Audio analysis completed"
            ),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Audio analysis failed");
                on_progress(-1.0, &format!("Analysis failed: {e}"));
            }
        }
        result
    }

    fn run(
        &self,
        path: &Path,
        on_progress: &mut impl FnMut(f64, &str),
    ) -> Result<AudioAnalysis, AnalysisError> {
        if !path.exists() {
            return Err(AnalysisError::FileNotFound(path.to_path_buf()));
        }
        let file_size = std::fs::metadata(path)?.len();

        on_progress(10.0, "Loading audio file...");
        let audio = load_mono(path, self.sample_rate)
            .map_err(|e| AnalysisError::Decode(format!("{e:#}")))?;
        if audio.samples.is_empty() {
            return Err(AnalysisError::Decode("no audio samples decoded".to_string()));
        }

        Ok(self.analyze_samples_inner(path, file_size, &audio.samples, on_progress))
    }

    /// Analyze already-decoded mono samples at the analyzer's rate
    pub fn analyze_samples(&self, path: &Path, file_size: u64, samples: &[f32]) -> AudioAnalysis {
        self.analyze_samples_inner(path, file_size, samples, &mut |_, _| {})
    }

    fn analyze_samples_inner(
        &self,
        path: &Path,
        file_size: u64,
        samples: &[f32],
        on_progress: &mut impl FnMut(f64, &str),
    ) -> AudioAnalysis {
        let ctx = FeatureContext::new(samples, self.sample_rate);

        on_progress(20.0, "Extracting basic information...");
        let basic_info = features::basic_info(&ctx, file_size);

        on_progress(35.0, "Analyzing spectral features...");
        let spectral_features = stage(path, "spectral", features::spectral_features(&ctx));

        on_progress(50.0, "Analyzing prosodic features...");
        let prosodic_features = stage(path, "prosodic", features::prosodic_features(&ctx));

        on_progress(65.0, "Analyzing voice characteristics...");
        let voice_characteristics = stage(
            path,
            "voice characteristics",
            features::voice_characteristics(&ctx),
        );

        on_progress(80.0, "Analyzing emotional indicators...");
        let emotional_indicators = stage(
            path,
            "emotional indicators",
            features::emotional_indicators(&ctx),
        );

        on_progress(90.0, "Assessing voice quality...");
        let voice_quality = stage(path, "voice quality", features::voice_quality(&ctx));

        on_progress(95.0, "Assessing training suitability...");
        let analysis = AudioAnalysis::new(
            path,
            basic_info,
            AudioSignalGroups {
                spectral_features,
                prosodic_features,
                voice_characteristics,
                emotional_indicators,
                voice_quality,
            },
            &self.scoring,
        );

        on_progress(100.0, "Audio analysis completed!");
        analysis
    }

    /// Decode `path`, isolate voiced regions and return each cleaned region's samples
    ///
    /// Regions shorter than `min_duration` seconds (before or after cleaning) are dropped.
    fn voice_segments(
        &self,
        path: &Path,
        min_duration: f64,
    ) -> Result<Vec<Vec<f32>>, AnalysisError> {
        if !path.exists() {
            return Err(AnalysisError::FileNotFound(path.to_path_buf()));
        }
        let audio = load_mono(path, self.sample_rate)
            .map_err(|e| AnalysisError::Decode(format!("{e:#}")))?;
        Ok(segments::clean_voice_regions(
            &audio.samples,
            self.sample_rate,
            min_duration,
        ))
    }

    /// Write each voiced region of `path` to `out_dir/segment_NNN.wav`
    ///
    /// Numbering starts at `first_index` so segments cut from several recordings can share
    /// one directory.
    pub fn extract_voice_segments(
        &self,
        path: &Path,
        min_duration: f64,
        out_dir: &Path,
        first_index: usize,
    ) -> Result<Vec<PathBuf>, AnalysisError> {
        let regions = self.voice_segments(path, min_duration)?;
        if regions.is_empty() {
            warn!(file = %path.display(), "No suitable voice segments found");
            return Ok(Vec::new());
        }
        std::fs::create_dir_all(out_dir)?;

        let mut written = Vec::with_capacity(regions.len());
        for (offset, region) in regions.iter().enumerate() {
            let index = first_index + offset;
            let out = out_dir.join(format!("segment_{:03}.wav", index));
            crate::utils::write_wav_mono(&out, region, self.sample_rate)
                .map_err(|e| AnalysisError::Internal(format!("{e:#}")))?;
            debug!(
                segment = index,
                seconds = region.len() as f64 / self.sample_rate as f64,
                "Extracted voice segment"
            );
            written.push(out);
        }
        Ok(written)
    }
}

impl Default for AudioAnalyzer {
    fn default() -> Self {
        Self::new(ScoringTable::default_audio())
    }
}

fn stage<T>(path: &Path, name: &str, result: Result<T, AnalysisError>) -> SignalGroup<T> {
    if let Err(e) = &result {
        warn!(file = %path.display(), stage = name, error = %e, "Analysis stage failed");
    }
    SignalGroup::from_result(result)
}

//! Voice-cloning engine seam
//!
//! The pipeline hands suitable voice recordings to a [`VoiceCloningEngine`] and only looks at
//! the boolean outcome. [`ReferenceVoiceEngine`] builds the reference track a zero-shot
//! synthesizer conditions on.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::dsp::filters::{peak_normalize, trim_range};
use crate::dsp::{ANALYSIS_SAMPLE_RATE, FRAME_LENGTH, HOP_LENGTH};
use crate::utils::{load_mono, write_json_atomic, write_wav_mono};

/// Minimum usable length per file after trimming (seconds)
pub const MIN_FILE_SECONDS: f64 = 1.0;
/// Reference audio shorter than this is tiled up to it (seconds)
pub const MIN_REFERENCE_SECONDS: usize = 30;
/// Reference audio is truncated to this (seconds)
pub const MAX_REFERENCE_SECONDS: usize = 600;
const TRIM_TOP_DB: f32 = 20.0;

/// Downstream voice-model trainer
pub trait VoiceCloningEngine: Send + Sync {
    /// Train the voice model for `persona_id` from `files`, writing under `voice_dir`
    ///
    /// Progress is reported as `(percent, message)`.
    fn train_voice_model(
        &self,
        persona_id: &str,
        voice_dir: &Path,
        files: &[PathBuf],
        on_progress: &mut dyn FnMut(f64, &str),
    ) -> bool;
}

/// `voice_metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceMetadata {
    pub persona_id: String,
    pub reference_files: Vec<PathBuf>,
    pub total_duration: f64,
    pub sample_rate: u32,
    pub created_at: chrono::DateTime<Utc>,
    pub model_type: String,
}

/// Builds `voice_reference.wav` from the trimmed, normalized inputs
#[derive(Debug, Clone, Default)]
pub struct ReferenceVoiceEngine;

impl ReferenceVoiceEngine {
    pub fn new() -> Self {
        Self
    }

    /// Trim silent edges and peak-normalize one decoded file
    fn preprocess(samples: &[f32]) -> Vec<f32> {
        let range = trim_range(samples, TRIM_TOP_DB, FRAME_LENGTH, HOP_LENGTH);
        let mut trimmed = samples[range].to_vec();
        peak_normalize(&mut trimmed);
        trimmed
    }
}

/// Concatenate, then tile short audio up to the minimum and cap long audio at the maximum
pub fn assemble_reference(parts: &[Vec<f32>], sample_rate: u32) -> Vec<f32> {
    let mut combined: Vec<f32> = parts.concat();
    if combined.is_empty() {
        return combined;
    }
    let min_len = sample_rate as usize * MIN_REFERENCE_SECONDS;
    if combined.len() < min_len {
        combined = combined.iter().copied().cycle().take(min_len).collect();
    }
    combined.truncate(sample_rate as usize * MAX_REFERENCE_SECONDS);
    combined
}

impl VoiceCloningEngine for ReferenceVoiceEngine {
    fn train_voice_model(
        &self,
        persona_id: &str,
        voice_dir: &Path,
        files: &[PathBuf],
        on_progress: &mut dyn FnMut(f64, &str),
    ) -> bool {
        info!(persona_id = %persona_id, files = files.len(), "Training voice model");
        on_progress(0.0, "Starting voice training...");

        let sample_rate = ANALYSIS_SAMPLE_RATE;
        let min_samples = (MIN_FILE_SECONDS * sample_rate as f64) as usize;
        let mut parts = Vec::new();
        let mut used = Vec::new();
        for (i, file) in files.iter().enumerate() {
            on_progress(
                (i as f64 / files.len() as f64) * 50.0,
                &format!("Processing audio file {}/{}...", i + 1, files.len()),
            );
            let audio = match load_mono(file, sample_rate) {
                Ok(audio) => audio,
                Err(e) => {
                    warn!(file = %file.display(), error = %format!("{e:#}"), "Failed to process voice file");
                    continue;
                }
            };
            let processed = Self::preprocess(&audio.samples);
            if processed.len() > min_samples {
                debug!(file = %file.display(), samples = processed.len(), "Voice file accepted");
                parts.push(processed);
                used.push(file.clone());
            } else {
                warn!(file = %file.display(), "Audio too short, skipping");
            }
        }

        if parts.is_empty() {
            error!(persona_id = %persona_id, "No valid audio files found for voice training");
            return false;
        }

        on_progress(50.0, "Combining audio files...");
        let reference = assemble_reference(&parts, sample_rate);

        on_progress(75.0, "Saving voice model...");
        let reference_path = voice_dir.join("voice_reference.wav");
        if let Err(e) = write_wav_mono(&reference_path, &reference, sample_rate) {
            error!(error = %format!("{e:#}"), "Failed to write voice reference");
            return false;
        }
        let metadata = VoiceMetadata {
            persona_id: persona_id.to_string(),
            reference_files: used,
            total_duration: reference.len() as f64 / sample_rate as f64,
            sample_rate,
            created_at: Utc::now(),
            model_type: "reference_audio".to_string(),
        };
        if let Err(e) = write_json_atomic(&voice_dir.join("voice_metadata.json"), &metadata) {
            error!(error = %e, "Failed to write voice metadata");
            return false;
        }

        info!(
            persona_id = %persona_id,
            path = %reference_path.display(),
            seconds = metadata.total_duration,
            "Voice model trained"
        );
        on_progress(100.0, "Voice training completed!");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use tempfile::TempDir;

    fn tone(seconds: f32, sr: u32) -> Vec<f32> {
        (0..(seconds * sr as f32) as usize)
            .map(|i| 0.3 * (2.0 * PI * 220.0 * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn test_assemble_tiles_and_caps() {
        let sr = 100;
        let short = assemble_reference(&[vec![1.0; 50], vec![2.0; 50]], sr);
        assert_eq!(short.len(), sr as usize * MIN_REFERENCE_SECONDS);
        assert_eq!(short[100], 1.0);
        assert_eq!(short[150], 2.0);

        let long = assemble_reference(&[vec![0.5; sr as usize * 700]], sr);
        assert_eq!(long.len(), sr as usize * MAX_REFERENCE_SECONDS);

        assert!(assemble_reference(&[], sr).is_empty());
    }

    #[test]
    fn test_reference_written_with_metadata() {
        let dir = TempDir::new().unwrap();
        let sr = ANALYSIS_SAMPLE_RATE;
        let good = dir.path().join("good.wav");
        let short = dir.path().join("short.wav");
        write_wav_mono(&good, &tone(2.0, sr), sr).unwrap();
        write_wav_mono(&short, &tone(0.5, sr), sr).unwrap();

        let voice_dir = dir.path().join("voice");
        let mut progress = Vec::new();
        let ok = ReferenceVoiceEngine::new().train_voice_model(
            "p1",
            &voice_dir,
            &[good.clone(), short, dir.path().join("missing.wav")],
            &mut |pct, _| progress.push(pct),
        );
        assert!(ok);
        assert_eq!(progress.first(), Some(&0.0));
        assert_eq!(progress.last(), Some(&100.0));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));

        let reader = hound::WavReader::open(voice_dir.join("voice_reference.wav")).unwrap();
        assert_eq!(reader.len() as usize, sr as usize * MIN_REFERENCE_SECONDS);

        let metadata: VoiceMetadata = serde_json::from_slice(
            &std::fs::read(voice_dir.join("voice_metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(metadata.reference_files, vec![good]);
        assert_eq!(metadata.persona_id, "p1");
    }

    #[test]
    fn test_nothing_usable_returns_false() {
        let dir = TempDir::new().unwrap();
        let ok = ReferenceVoiceEngine::new().train_voice_model(
            "p1",
            &dir.path().join("voice"),
            &[dir.path().join("absent.wav")],
            &mut |_, _| {},
        );
        assert!(!ok);
        assert!(!dir.path().join("voice").join("voice_reference.wav").exists());
    }
}

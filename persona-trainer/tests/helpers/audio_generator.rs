//! Audio test fixture generator
//!
//! Writes 16-bit WAV files of speech-like bursts: a 140 Hz voice with two harmonics and a
//! syllable-rate envelope, optionally broken into phrases separated by digital silence.

use std::path::{Path, PathBuf};

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Length of each voiced phrase; `None` voices the whole file
    pub phrase_seconds: Option<f64>,
    /// Silence after each phrase
    pub pause_seconds: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 12.0,
            sample_rate: 22050,
            channels: 1,
            phrase_seconds: None,
            pause_seconds: 0.0,
        }
    }
}

impl AudioConfig {
    /// `count` phrases of `phrase_seconds`, each followed by `pause_seconds` of silence
    pub fn phrases(count: usize, phrase_seconds: f64, pause_seconds: f64) -> Self {
        Self {
            duration_seconds: count as f64 * (phrase_seconds + pause_seconds),
            phrase_seconds: Some(phrase_seconds),
            pause_seconds,
            ..Self::default()
        }
    }

    fn is_voiced(&self, t: f64) -> bool {
        match self.phrase_seconds {
            Some(phrase) => t % (phrase + self.pause_seconds) < phrase,
            None => true,
        }
    }
}

/// Generate a test WAV file with the given configuration
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;
    let two_pi = 2.0 * std::f64::consts::PI;

    for i in 0..total_samples {
        let t = i as f64 / config.sample_rate as f64;
        let sample = if config.is_voiced(t) {
            let f0 = 140.0;
            let envelope = 0.6 + 0.3 * (two_pi * 4.0 * t).sin();
            let voice = 0.5 * (two_pi * f0 * t).sin()
                + 0.25 * (two_pi * 2.0 * f0 * t).sin()
                + 0.1 * (two_pi * 3.0 * f0 * t).sin();
            (envelope * voice * 0.8 * i16::MAX as f64) as i16
        } else {
            0
        };

        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Generate `count` files named `voice_NNN.wav` in `dir`
pub fn generate_test_library(
    dir: &Path,
    count: usize,
    config: &AudioConfig,
) -> anyhow::Result<Vec<PathBuf>> {
    (0..count)
        .map(|i| generate_test_wav(&dir.join(format!("voice_{:03}.wav", i + 1)), config))
        .collect()
}

/// Write a plain-text writing sample
pub fn write_text_sample(path: &Path, text: &str) -> anyhow::Result<PathBuf> {
    std::fs::write(path, text)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_phrase_layout() {
        let temp_dir = TempDir::new().unwrap();
        let config = AudioConfig::phrases(2, 3.5, 2.5);
        assert_eq!(config.duration_seconds, 12.0);
        assert!(config.is_voiced(1.0));
        assert!(!config.is_voiced(4.0));
        assert!(config.is_voiced(6.5));

        let path = generate_test_wav(&temp_dir.path().join("phrases.wav"), &config).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 22050);
        assert_eq!(reader.duration(), 12 * 22050);
    }
}

//! Audio decoding utilities
//!
//! Decodes any container symphonia understands (WAV, FLAC, MP3, AAC, OGG, ...) to mono f32 PCM,
//! optionally resampled to the analysis rate.

use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

use super::resampler::resample_mono;

/// Decoded audio result
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count of the source track
    pub channels: usize,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio file and resample it to `target_rate`
///
/// **Algorithm:**
/// 1. Decode every packet of the first audio track to mono (channel average)
/// 2. Resample with rubato when the source rate differs from `target_rate`
pub fn load_mono(file_path: &Path, target_rate: u32) -> Result<DecodedAudio> {
    let decoded = decode_audio_file(file_path)?;
    if decoded.sample_rate == target_rate || decoded.samples.is_empty() {
        return Ok(DecodedAudio {
            sample_rate: if decoded.samples.is_empty() {
                target_rate
            } else {
                decoded.sample_rate
            },
            ..decoded
        });
    }

    let samples = resample_mono(&decoded.samples, decoded.sample_rate, target_rate)
        .with_context(|| format!("Failed to resample: {}", file_path.display()))?;

    Ok(DecodedAudio {
        samples,
        sample_rate: target_rate,
        channels: decoded.channels,
    })
}

/// Decode an audio file to mono f32 PCM at its native rate
///
/// # Errors
/// * File I/O errors
/// * Unsupported format or no audio track
/// * Unrecoverable decode errors (single corrupt packets are skipped)
pub fn decode_audio_file(file_path: &Path) -> Result<DecodedAudio> {
    tracing::debug!(path = %file_path.display(), "Decoding audio file");

    let file = std::fs::File::open(file_path)
        .with_context(|| format!("Failed to open audio file: {}", file_path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Failed to probe audio file: {}", file_path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found in file")?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Sample rate unknown")?;
    let channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .with_context(|| format!("Failed to create decoder for: {}", file_path.display()))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(anyhow::anyhow!("Error reading packet: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => samples.extend(mix_buffer_to_mono(&decoded)),
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::warn!(path = %file_path.display(), error = %msg, "Skipping corrupt packet");
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to decode packet in {}: {}",
                    file_path.display(),
                    e
                ))
            }
        }
    }

    tracing::debug!(
        path = %file_path.display(),
        sample_rate,
        channels = channel_count,
        total_samples = samples.len(),
        "Audio decoding complete"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channel_count,
    })
}

fn mix_buffer_to_mono(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => mix_to_mono(buf),
        AudioBufferRef::F64(buf) => mix_to_mono(buf),
        AudioBufferRef::U8(buf) => mix_to_mono(buf),
        AudioBufferRef::U16(buf) => mix_to_mono(buf),
        AudioBufferRef::U24(buf) => mix_to_mono(buf),
        AudioBufferRef::U32(buf) => mix_to_mono(buf),
        AudioBufferRef::S8(buf) => mix_to_mono(buf),
        AudioBufferRef::S16(buf) => mix_to_mono(buf),
        AudioBufferRef::S24(buf) => mix_to_mono(buf),
        AudioBufferRef::S32(buf) => mix_to_mono(buf),
    }
}

/// Average all channels of a planar buffer into one
fn mix_to_mono<S: Sample>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    f32: FromSample<S>,
{
    let channels = buf.spec().channels.count().max(1);
    let frames = buf.frames();
    let mut mono = vec![0.0f32; frames];

    for ch in 0..channels {
        for (out, &sample) in mono.iter_mut().zip(buf.chan(ch).iter()) {
            *out += f32::from_sample(sample);
        }
    }

    let scale = 1.0 / channels as f32;
    mono.iter_mut().for_each(|s| *s *= scale);
    mono
}

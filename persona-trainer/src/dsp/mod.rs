//! Signal processing primitives for voice analysis
//!
//! Every routine works on mono f32 samples. Analyzers resample to
//! [`ANALYSIS_SAMPLE_RATE`] first so frame sizes mean the same thing everywhere.

pub mod chroma;
pub mod filters;
pub mod hpss;
pub mod lpc;
pub mod mel;
pub mod onset;
pub mod pitch;
pub mod spectrum;
pub mod stats;

/// Sample rate all analysis runs at (Hz)
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

/// STFT frame length in samples
pub const FRAME_LENGTH: usize = 2048;

/// STFT hop length in samples
pub const HOP_LENGTH: usize = 512;

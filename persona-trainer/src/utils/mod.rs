//! Utility modules for persona-trainer

pub mod audio_decoder;
pub mod fs;
pub mod resampler;
pub mod wav;

pub use audio_decoder::{decode_audio_file, load_mono, DecodedAudio};
pub use fs::{read_json_if_exists, remove_if_exists, write_atomic, write_json_atomic};
pub use resampler::resample_mono;
pub use wav::write_wav_mono;

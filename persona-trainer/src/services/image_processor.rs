//! Image sample normalization
//!
//! Every decodable image is converted to 8-bit RGB and re-encoded as high-quality JPEG under the
//! persona's `images/` directory.

use image::codecs::jpeg::JpegEncoder;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one image batch
#[derive(Debug, Default)]
pub struct ImageBatch {
    pub processed: Vec<(PathBuf, PathBuf)>,
    pub missing: Vec<PathBuf>,
    /// Undecodable or unwritable inputs
    pub failures: Vec<(PathBuf, String)>,
}

/// Process `files` in order, writing `processed_NNN.jpg` (0-based input index) to `out_dir`
pub fn process_images(files: &[PathBuf], out_dir: &Path) -> std::io::Result<ImageBatch> {
    std::fs::create_dir_all(out_dir)?;

    let mut batch = ImageBatch::default();
    for (i, file) in files.iter().enumerate() {
        if !file.exists() {
            warn!(file = %file.display(), "Image file not found");
            batch.missing.push(file.clone());
            continue;
        }
        let output = out_dir.join(format!("processed_{:03}.jpg", i));
        match convert_to_jpeg(file, &output) {
            Ok(()) => {
                debug!(file = %file.display(), output = %output.display(), "Processed image");
                batch.processed.push((file.clone(), output));
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Skipping image");
                batch.failures.push((file.clone(), e.to_string()));
            }
        }
    }
    Ok(batch)
}

/// Decode `input`, drop alpha and write it as JPEG to `output`
pub fn convert_to_jpeg(input: &Path, output: &Path) -> Result<(), ImageError> {
    let rgb = image::open(input)?.to_rgb8();

    let temp = output.with_extension("jpg.tmp");
    {
        let file = std::fs::File::create(&temp)?;
        let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
        if let Err(e) = rgb.write_with_encoder(encoder) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
    }
    std::fs::rename(&temp, output)?;
    Ok(())
}

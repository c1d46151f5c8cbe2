//! Container access for the video analyzer
//!
//! [`VideoToolkit`] abstracts probing, audio extraction, frame sampling and clip cutting so
//! analysis can run against a fake in tests. [`FfmpegToolkit`] shells out to `ffprobe` and
//! `ffmpeg`.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;
use tracing::debug;

use crate::models::video_analysis::TimeRange;

/// Toolkit errors
#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("Binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Container metadata reported by [`VideoToolkit::probe`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeInfo {
    pub duration: f64,
    pub fps: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

/// One decoded frame written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame {
    /// Index of the frame in the source stream
    pub index: u64,
    /// Seconds from the start of the stream
    pub timestamp: f64,
    pub path: PathBuf,
}

pub trait VideoToolkit: Send + Sync {
    fn probe(&self, video: &Path) -> Result<ProbeInfo, ToolkitError>;

    /// Write the first audio track as mono 16-bit WAV at `sample_rate`
    fn extract_audio(&self, video: &Path, out_wav: &Path, sample_rate: u32) -> Result<(), ToolkitError>;

    /// Decode every `stride`-th frame (at most `max_frames`) into `out_dir`
    fn sample_frames(
        &self,
        video: &Path,
        stride: u64,
        max_frames: usize,
        fps: f64,
        out_dir: &Path,
    ) -> Result<Vec<SampledFrame>, ToolkitError>;

    /// Re-encode `range` of `video` to `out` (H.264/AAC)
    fn cut_clip(&self, video: &Path, range: TimeRange, out: &Path) -> Result<(), ToolkitError>;
}

/// ffmpeg/ffprobe command-line toolkit
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegToolkit {
    /// Binaries are resolved lazily; a missing one surfaces as
    /// [`ToolkitError::BinaryNotFound`] on first use.
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Whether both binaries run
    pub fn is_available(&self) -> bool {
        [&self.ffmpeg_path, &self.ffprobe_path].iter().all(|bin| {
            Command::new(bin.as_str())
                .arg("-version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        })
    }

    fn run(&self, binary: &str, command: &mut Command) -> Result<Output, ToolkitError> {
        let output = command.output().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ToolkitError::BinaryNotFound(binary.to_string())
            } else {
                ToolkitError::Io(e)
            }
        })?;
        if !output.status.success() {
            return Err(ToolkitError::ExecutionFailed(format!(
                "{} exited with {}: {}",
                binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }

    fn ffmpeg(&self) -> Command {
        let mut command = Command::new(&self.ffmpeg_path);
        command.args(["-v", "error", "-y"]);
        command
    }
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl VideoToolkit for FfmpegToolkit {
    fn probe(&self, video: &Path) -> Result<ProbeInfo, ToolkitError> {
        let mut command = Command::new(&self.ffprobe_path);
        command
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(video);
        let output = self.run(&self.ffprobe_path, &mut command)?;
        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ToolkitError::Parse(format!("ffprobe output: {e}")))?;
        parse_probe(&json)
    }

    fn extract_audio(&self, video: &Path, out_wav: &Path, sample_rate: u32) -> Result<(), ToolkitError> {
        let mut command = self.ffmpeg();
        command
            .arg("-i")
            .arg(video)
            .args(["-vn", "-ac", "1", "-c:a", "pcm_s16le", "-ar"])
            .arg(sample_rate.to_string())
            .arg(out_wav);
        self.run(&self.ffmpeg_path, &mut command)?;
        debug!(video = %video.display(), out = %out_wav.display(), "Extracted audio track");
        Ok(())
    }

    fn sample_frames(
        &self,
        video: &Path,
        stride: u64,
        max_frames: usize,
        fps: f64,
        out_dir: &Path,
    ) -> Result<Vec<SampledFrame>, ToolkitError> {
        std::fs::create_dir_all(out_dir)?;
        let stride = stride.max(1);
        let mut command = self.ffmpeg();
        command
            .arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(format!("select=not(mod(n\\,{stride}))"))
            .args(["-vsync", "vfr", "-frames:v"])
            .arg(max_frames.to_string())
            .arg(out_dir.join("frame_%05d.png"));
        self.run(&self.ffmpeg_path, &mut command)?;

        let mut written: Vec<PathBuf> = std::fs::read_dir(out_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("frame_") && n.ends_with(".png"))
            })
            .collect();
        written.sort();

        Ok(written
            .into_iter()
            .enumerate()
            .map(|(k, path)| {
                let index = k as u64 * stride;
                SampledFrame {
                    index,
                    timestamp: if fps > 0.0 { index as f64 / fps } else { 0.0 },
                    path,
                }
            })
            .collect())
    }

    fn cut_clip(&self, video: &Path, range: TimeRange, out: &Path) -> Result<(), ToolkitError> {
        let mut command = self.ffmpeg();
        command
            .args(["-ss", &format_time(range.start), "-to", &format_time(range.end), "-i"])
            .arg(video)
            .args([
                "-c:v", "libx264",
                "-crf", "18",
                "-preset", "medium",
                "-c:a", "aac",
                "-b:a", "192k",
            ])
            .arg(out);
        self.run(&self.ffmpeg_path, &mut command)?;
        Ok(())
    }
}

/// Read [`ProbeInfo`] out of `ffprobe -show_format -show_streams` JSON
pub fn parse_probe(json: &serde_json::Value) -> Result<ProbeInfo, ToolkitError> {
    let streams = json["streams"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    let video = streams
        .iter()
        .find(|s| s["codec_type"] == "video")
        .ok_or_else(|| ToolkitError::Parse("No video stream found".to_string()))?;
    let has_audio = streams.iter().any(|s| s["codec_type"] == "audio");

    let fps = parse_framerate(
        video["avg_frame_rate"]
            .as_str()
            .filter(|r| parse_framerate(r) > 0.0)
            .or_else(|| video["r_frame_rate"].as_str())
            .unwrap_or("0"),
    );

    let duration = number(&json["format"]["duration"])
        .or_else(|| number(&video["duration"]))
        .unwrap_or(0.0);

    let frame_count = number(&video["nb_frames"])
        .map(|n| n as u64)
        .filter(|&n| n > 0)
        .unwrap_or_else(|| (duration * fps).round() as u64);

    Ok(ProbeInfo {
        duration,
        fps,
        frame_count,
        width: video["width"].as_u64().unwrap_or(0) as u32,
        height: video["height"].as_u64().unwrap_or(0) as u32,
        has_audio,
    })
}

/// ffprobe prints most numbers as strings
fn number(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Parse "30000/1001" or "30"
pub fn parse_framerate(fps: &str) -> f64 {
    if let Some((num, den)) = fps.split_once('/') {
        let num: f64 = num.parse().unwrap_or(0.0);
        let den: f64 = den.parse().unwrap_or(0.0);
        return if den != 0.0 { num / den } else { 0.0 };
    }
    fps.parse().unwrap_or(0.0)
}

/// HH:MM:SS.mmm
pub fn format_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02}.{ms:03}")
}

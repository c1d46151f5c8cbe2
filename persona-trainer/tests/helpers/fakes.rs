//! Stand-ins for ffmpeg and the voice-cloning backend

use persona_trainer::models::TimeRange;
use persona_trainer::services::suitability_scorer::ScoringTable;
use persona_trainer::services::video_analyzer::{
    ProbeInfo, SampledFrame, ToolkitError, UnavailableInspector, VideoAnalyzer, VideoToolkit,
};
use persona_trainer::services::voice_engine::VoiceCloningEngine;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// Toolkit reporting fixed container metadata
///
/// Clips are written as placeholder files. With a soundtrack set, every audio extraction
/// copies that WAV; without one the container has no audio stream.
pub struct FakeToolkit {
    probe: ProbeInfo,
    soundtrack: Option<PathBuf>,
    cuts: Mutex<Vec<TimeRange>>,
}

impl FakeToolkit {
    pub fn new(duration: f64) -> Self {
        Self {
            probe: ProbeInfo {
                duration,
                fps: 10.0,
                frame_count: (duration * 10.0) as u64,
                width: 1280,
                height: 720,
                has_audio: false,
            },
            soundtrack: None,
            cuts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_soundtrack(mut self, wav: impl Into<PathBuf>) -> Self {
        self.probe.has_audio = true;
        self.soundtrack = Some(wav.into());
        self
    }

    pub fn cuts(&self) -> Vec<TimeRange> {
        self.cuts.lock().unwrap().clone()
    }
}

impl VideoToolkit for FakeToolkit {
    fn probe(&self, _video: &Path) -> Result<ProbeInfo, ToolkitError> {
        Ok(self.probe.clone())
    }

    fn extract_audio(&self, _video: &Path, out_wav: &Path, _sample_rate: u32) -> Result<(), ToolkitError> {
        match &self.soundtrack {
            Some(wav) => {
                std::fs::copy(wav, out_wav)?;
                Ok(())
            }
            None => Err(ToolkitError::ExecutionFailed(
                "no audio stream".to_string(),
            )),
        }
    }

    fn sample_frames(
        &self,
        _video: &Path,
        stride: u64,
        max_frames: usize,
        fps: f64,
        out_dir: &Path,
    ) -> Result<Vec<SampledFrame>, ToolkitError> {
        Ok((0..self.probe.frame_count)
            .step_by(stride.max(1) as usize)
            .take(max_frames)
            .map(|index| SampledFrame {
                index,
                timestamp: index as f64 / fps,
                path: out_dir.join(format!("frame_{index:05}.png")),
            })
            .collect())
    }

    fn cut_clip(&self, _video: &Path, range: TimeRange, out: &Path) -> Result<(), ToolkitError> {
        self.cuts.lock().unwrap().push(range);
        std::fs::write(out, b"clip")?;
        Ok(())
    }
}

/// Video analyzer over `toolkit` with no frame inspector and the default scoring
pub fn stub_video_analyzer(toolkit: impl Into<Arc<FakeToolkit>>) -> VideoAnalyzer {
    let toolkit: Arc<FakeToolkit> = toolkit.into();
    VideoAnalyzer::new(
        toolkit,
        Arc::new(UnavailableInspector),
        ScoringTable::default_video(),
    )
}

/// Voice engine that records each call and always succeeds
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<Vec<PathBuf>>>,
}

impl RecordingEngine {
    /// File lists passed to each training call, in call order
    pub fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().unwrap().clone()
    }
}

impl VoiceCloningEngine for RecordingEngine {
    fn train_voice_model(
        &self,
        _persona_id: &str,
        _voice_dir: &Path,
        files: &[PathBuf],
        on_progress: &mut dyn FnMut(f64, &str),
    ) -> bool {
        on_progress(0.0, "Starting voice training");
        self.calls.lock().unwrap().push(files.to_vec());
        on_progress(100.0, "Voice training complete");
        true
    }
}

/// Voice engine that blocks until the test releases it
///
/// Announces each call on the `entered` channel, then waits for a message on `release`.
pub struct GatedEngine {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedEngine {
    /// Engine plus the test's ends of its channels: (entered, release)
    pub fn new() -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let engine = Self {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (engine, entered_rx, release_tx)
    }
}

impl VoiceCloningEngine for GatedEngine {
    fn train_voice_model(
        &self,
        _persona_id: &str,
        _voice_dir: &Path,
        _files: &[PathBuf],
        _on_progress: &mut dyn FnMut(f64, &str),
    ) -> bool {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
        true
    }
}

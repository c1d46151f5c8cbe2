//! Per-modality audit logs (`audio/audio_analysis.json`, `video/video_analysis.json`)
//!
//! A log records every analyzed file, suitable or not, plus the inputs that could not be
//! analyzed at all.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A file whose analysis raised an error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Analysis batch for one modality
#[derive(Debug, Clone, Serialize)]
pub struct ModalityLog<R> {
    pub analyses: Vec<R>,
    pub failures: Vec<FileFailure>,
    pub missing_files: Vec<PathBuf>,
    pub suitable_files: Vec<PathBuf>,
    pub total_files: usize,
    pub analysis_timestamp: DateTime<Utc>,
}

impl<R> ModalityLog<R> {
    pub fn new(total_files: usize) -> Self {
        Self {
            analyses: Vec::new(),
            failures: Vec::new(),
            missing_files: Vec::new(),
            suitable_files: Vec::new(),
            total_files,
            analysis_timestamp: Utc::now(),
        }
    }

    pub fn record_failure(&mut self, path: PathBuf, error: impl ToString) {
        self.failures.push(FileFailure {
            path,
            error: error.to_string(),
        });
    }
}

/// Video log: the video batch plus training clips and the audio extracted from them
///
/// Extracted audio is kept apart from directly uploaded audio so every voice input can be
/// traced back to its source.
#[derive(Debug, Clone, Serialize)]
pub struct VideoLog<V, A> {
    #[serde(flatten)]
    pub videos: ModalityLog<V>,
    /// Training clips keyed by the video they were cut from
    pub clips: BTreeMap<PathBuf, Vec<PathBuf>>,
    pub extracted_audio: ModalityLog<A>,
}

//! Text sample processing
//!
//! Copies readable, non-blank text files into the persona's `text/` directory and derives
//! writing-style heuristics from their combined content.

use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::persona_model::{PersonalityProfile, WritingStyle};
use crate::utils::write_atomic;

/// Outcome of one text batch
#[derive(Debug, Default)]
pub struct TextBatch {
    /// `(source, processed copy)` per accepted file
    pub processed: Vec<(PathBuf, PathBuf)>,
    pub missing: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
    /// Present when at least one file was accepted
    pub profile: Option<PersonalityProfile>,
}

/// Process `files` in order, writing `processed_NNN.txt` (0-based input index) to `out_dir`
pub fn process_text_files(files: &[PathBuf], out_dir: &Path) -> std::io::Result<TextBatch> {
    std::fs::create_dir_all(out_dir)?;

    let mut batch = TextBatch::default();
    let mut contents = Vec::new();
    for (i, file) in files.iter().enumerate() {
        if !file.exists() {
            warn!(file = %file.display(), "Text file not found");
            batch.missing.push(file.clone());
            continue;
        }

        let content = match std::fs::read(file) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Cannot read text file");
                batch.failures.push((file.clone(), e.to_string()));
                continue;
            }
        };
        if content.trim().is_empty() {
            debug!(file = %file.display(), "Skipping blank text file");
            continue;
        }

        let output = out_dir.join(format!("processed_{:03}.txt", i));
        if let Err(e) = write_atomic(&output, content.as_bytes()) {
            warn!(file = %file.display(), error = %e, "Cannot write processed text");
            batch.failures.push((file.clone(), e.to_string()));
            continue;
        }
        batch.processed.push((file.clone(), output));
        contents.push(content);
    }

    if !contents.is_empty() {
        batch.profile = Some(PersonalityProfile {
            writing_style: writing_style(&contents.join(" ")),
            source_files: contents.len(),
            analysis_timestamp: Utc::now(),
        });
    }
    Ok(batch)
}

/// Writing-style heuristics for one body of text
pub fn writing_style(text: &str) -> WritingStyle {
    let word_count = text.split_whitespace().count();
    let pieces = text.matches('.').count() + 1;
    let vocabulary: HashSet<String> = text
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();

    WritingStyle {
        average_sentence_length: word_count as f64 / pieces as f64,
        vocabulary_complexity: vocabulary.len(),
        punctuation_usage: text.chars().filter(|c| matches!(c, '!' | '?')).count(),
    }
}

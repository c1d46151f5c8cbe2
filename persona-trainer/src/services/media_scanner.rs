//! Media file discovery
//!
//! Walks a directory tree and sorts files into [`TrainingData`] modality lists. Content is
//! sniffed with `infer`; files it cannot identify fall back to their extension.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::models::training_data::{Modality, TrainingData};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Media file scanner
pub struct MediaScanner {
    ignore_patterns: Vec<String>,
    max_depth: Option<usize>,
}

impl MediaScanner {
    /// Scanner ignoring common system and VCS files
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
                "node_modules".to_string(),
            ],
            max_depth: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Collect media under `root`, each modality list sorted by path
    pub fn scan(&self, root: &Path) -> Result<TrainingData, ScanError> {
        if !root.exists() {
            return Err(ScanError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut symlink_visited = HashSet::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .max_depth(self.max_depth.unwrap_or(usize::MAX))
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut symlink_visited));

        let mut data = TrainingData::default();
        let mut skipped = 0usize;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Error accessing entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match classify(entry.path()) {
                Some(modality) => data.files_mut(modality).push(entry.path().to_path_buf()),
                None => skipped += 1,
            }
        }

        for modality in Modality::ALL {
            data.files_mut(modality).sort();
        }

        debug!(
            root = %root.display(),
            audio = data.audio.len(),
            video = data.video.len(),
            text = data.text.len(),
            images = data.images.len(),
            skipped,
            "Media scan complete"
        );
        Ok(data)
    }

    fn should_process_entry(&self, entry: &DirEntry, symlink_visited: &mut HashSet<PathBuf>) -> bool {
        let file_name = entry.file_name().to_string_lossy();
        if self
            .ignore_patterns
            .iter()
            .any(|pattern| file_name.contains(pattern.as_str()))
        {
            return false;
        }

        if entry.file_type().is_symlink() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !symlink_visited.insert(canonical) {
                    warn!(path = %entry.path().display(), "Symlink loop detected");
                    return false;
                }
            }
        }
        true
    }
}

impl Default for MediaScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Modality of one file by content, then by extension
pub fn classify(path: &Path) -> Option<Modality> {
    match infer::get_from_path(path) {
        Ok(Some(kind)) => match kind.matcher_type() {
            infer::MatcherType::Audio => return Some(Modality::Audio),
            infer::MatcherType::Video => return Some(Modality::Video),
            infer::MatcherType::Image => return Some(Modality::Images),
            infer::MatcherType::Text => return Some(Modality::Text),
            _ => {}
        },
        Ok(None) => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read file for type detection");
            return None;
        }
    }
    classify_extension(path)
}

fn classify_extension(path: &Path) -> Option<Modality> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "wav" | "mp3" | "flac" | "ogg" | "oga" | "m4a" | "aac" | "opus" => Some(Modality::Audio),
        "mp4" | "mov" | "mkv" | "webm" | "avi" | "m4v" => Some(Modality::Video),
        "txt" | "md" | "text" => Some(Modality::Text),
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "tiff" => Some(Modality::Images),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 16] = [
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];

    fn wav_header() -> Vec<u8> {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&36u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&[0u8; 24]);
        bytes
    }

    #[test]
    fn test_scan_sorts_by_modality() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("session");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("voice.wav"), wav_header()).unwrap();
        fs::write(nested.join("face.png"), PNG_HEADER).unwrap();
        fs::write(nested.join("notes.txt"), "Hello there. How are you?").unwrap();
        fs::write(dir.path().join("unknown.bin"), [0u8, 1, 2, 3]).unwrap();
        fs::write(dir.path().join(".DS_Store"), [0u8; 8]).unwrap();

        let data = MediaScanner::new().scan(dir.path()).unwrap();
        assert_eq!(data.audio, vec![dir.path().join("voice.wav")]);
        assert_eq!(data.images, vec![nested.join("face.png")]);
        assert_eq!(data.text, vec![nested.join("notes.txt")]);
        assert!(data.video.is_empty());
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(classify_extension(Path::new("clip.MOV")), Some(Modality::Video));
        assert_eq!(classify_extension(Path::new("readme.md")), Some(Modality::Text));
        assert_eq!(classify_extension(Path::new("archive.zip")), None);
        assert_eq!(classify_extension(Path::new("no_extension")), None);
    }

    #[test]
    fn test_scan_errors() {
        let scanner = MediaScanner::new();
        assert!(matches!(
            scanner.scan(Path::new("/nonexistent/media")),
            Err(ScanError::PathNotFound(_))
        ));

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(scanner.scan(&file), Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn test_max_depth_limits_traversal() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("a").join("b");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("deep.txt"), "deep").unwrap();
        fs::write(dir.path().join("top.txt"), "top").unwrap();

        let data = MediaScanner::new().with_max_depth(1).scan(dir.path()).unwrap();
        assert_eq!(data.text, vec![dir.path().join("top.txt")]);
    }
}

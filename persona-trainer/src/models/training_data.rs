//! Training input: file lists per modality

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Media modality, in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Audio,
    Video,
    Text,
    Images,
}

impl Modality {
    pub const ALL: [Modality; 4] = [
        Modality::Audio,
        Modality::Video,
        Modality::Text,
        Modality::Images,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Audio => "audio",
            Modality::Video => "video",
            Modality::Text => "text",
            Modality::Images => "images",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media file tagged with its modality; existence is checked by the analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub path: PathBuf,
    pub modality: Modality,
}

/// Modality → ordered file paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingData {
    pub audio: Vec<PathBuf>,
    pub video: Vec<PathBuf>,
    pub text: Vec<PathBuf>,
    pub images: Vec<PathBuf>,
}

impl TrainingData {
    pub fn files(&self, modality: Modality) -> &[PathBuf] {
        match modality {
            Modality::Audio => &self.audio,
            Modality::Video => &self.video,
            Modality::Text => &self.text,
            Modality::Images => &self.images,
        }
    }

    pub fn files_mut(&mut self, modality: Modality) -> &mut Vec<PathBuf> {
        match modality {
            Modality::Audio => &mut self.audio,
            Modality::Video => &mut self.video,
            Modality::Text => &mut self.text,
            Modality::Images => &mut self.images,
        }
    }

    /// Non-empty modalities in processing order
    pub fn modalities(&self) -> Vec<Modality> {
        Modality::ALL
            .into_iter()
            .filter(|m| !self.files(*m).is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.modalities().is_empty()
    }

    pub fn assets(&self) -> impl Iterator<Item = MediaAsset> + '_ {
        Modality::ALL.into_iter().flat_map(move |modality| {
            self.files(modality).iter().map(move |path| MediaAsset {
                path: path.clone(),
                modality,
            })
        })
    }

    /// Append another input set, keeping order (discovery feeds extra paths this way)
    pub fn extend(&mut self, other: TrainingData) {
        self.audio.extend(other.audio);
        self.video.extend(other.video);
        self.text.extend(other.text);
        self.images.extend(other.images);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modalities_in_fixed_order() {
        let data = TrainingData {
            images: vec![PathBuf::from("a.jpg")],
            audio: vec![PathBuf::from("a.wav")],
            ..Default::default()
        };
        assert_eq!(data.modalities(), vec![Modality::Audio, Modality::Images]);
        assert!(!data.is_empty());
        assert!(TrainingData::default().is_empty());
    }

    #[test]
    fn test_missing_lists_deserialize_empty() {
        let data: TrainingData = serde_json::from_str(r#"{"text": ["notes.txt"]}"#).unwrap();
        assert_eq!(data.text, vec![PathBuf::from("notes.txt")]);
        assert!(data.audio.is_empty());
        assert_eq!(data.modalities(), vec![Modality::Text]);
    }

    #[test]
    fn test_assets_and_extend() {
        let mut data = TrainingData {
            audio: vec![PathBuf::from("1.wav")],
            ..Default::default()
        };
        data.extend(TrainingData {
            audio: vec![PathBuf::from("2.wav")],
            video: vec![PathBuf::from("1.mp4")],
            ..Default::default()
        });
        let assets: Vec<_> = data.assets().collect();
        assert_eq!(assets.len(), 3);
        assert_eq!(assets[1].path, PathBuf::from("2.wav"));
        assert_eq!(assets[2].modality, Modality::Video);
        assert_eq!(Modality::Images.to_string(), "images");
    }
}

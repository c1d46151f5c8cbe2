//! Per-frame landmark extraction
//!
//! Landmarks follow the 33-point body and 21-point hand conventions with coordinates
//! normalized to the frame.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InspectorError {
    #[error("Inspector command not configured")]
    NotConfigured,

    #[error("Inspector execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Inspector output unreadable: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Which landmark families an inspector can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InspectorCapabilities {
    pub faces: bool,
    pub pose: bool,
    pub hands: bool,
}

impl InspectorCapabilities {
    pub const ALL: Self = Self {
        faces: true,
        pose: true,
        hands: true,
    };

    pub fn any(&self) -> bool {
        self.faces || self.pose || self.hands
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "full_visibility")]
    pub visibility: f64,
}

fn full_visibility() -> f64 {
    1.0
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: 1.0,
        }
    }

    pub fn distance(&self, other: &Landmark) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub confidence: f64,
}

/// Everything found in one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameLandmarks {
    #[serde(default)]
    pub faces: Vec<FaceDetection>,
    #[serde(default)]
    pub pose: Option<Vec<Landmark>>,
    #[serde(default)]
    pub hands: Vec<Vec<Landmark>>,
}

pub trait FrameInspector: Send + Sync {
    fn capabilities(&self) -> InspectorCapabilities;

    fn inspect(&self, frame: &Path) -> Result<FrameLandmarks, InspectorError>;
}

/// Inspector for hosts without a landmark model
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableInspector;

impl FrameInspector for UnavailableInspector {
    fn capabilities(&self) -> InspectorCapabilities {
        InspectorCapabilities::default()
    }

    fn inspect(&self, _frame: &Path) -> Result<FrameLandmarks, InspectorError> {
        Err(InspectorError::NotConfigured)
    }
}

/// Runs an external command per frame and reads [`FrameLandmarks`] JSON from its stdout
///
/// The frame path is appended as the last argument.
#[derive(Debug, Clone)]
pub struct SidecarInspector {
    program: String,
    args: Vec<String>,
    capabilities: InspectorCapabilities,
}

impl SidecarInspector {
    /// `command` is the program followed by its fixed arguments
    pub fn new(command: &[String]) -> Result<Self, InspectorError> {
        let (program, args) = command.split_first().ok_or(InspectorError::NotConfigured)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            capabilities: InspectorCapabilities::ALL,
        })
    }

    pub fn with_capabilities(mut self, capabilities: InspectorCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl FrameInspector for SidecarInspector {
    fn capabilities(&self) -> InspectorCapabilities {
        self.capabilities
    }

    fn inspect(&self, frame: &Path) -> Result<FrameLandmarks, InspectorError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(frame)
            .output()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    InspectorError::ExecutionFailed(format!("{} not found", self.program))
                } else {
                    InspectorError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(InspectorError::ExecutionFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let landmarks: FrameLandmarks = serde_json::from_slice(&output.stdout)
            .map_err(|e| InspectorError::Parse(e.to_string()))?;
        debug!(
            frame = %frame.display(),
            faces = landmarks.faces.len(),
            hands = landmarks.hands.len(),
            pose = landmarks.pose.is_some(),
            "Inspected frame"
        );
        Ok(landmarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_landmarks_defaults() {
        let parsed: FrameLandmarks =
            serde_json::from_str(r#"{"faces":[{"confidence":0.9}],"pose":[{"x":0.5,"y":0.2}]}"#)
                .unwrap();
        assert_eq!(parsed.faces.len(), 1);
        let pose = parsed.pose.unwrap();
        assert_eq!(pose[0].visibility, 1.0);
        assert_eq!(pose[0].z, 0.0);
        assert!(parsed.hands.is_empty());
    }

    #[test]
    fn test_unavailable_inspector_has_no_capabilities() {
        let inspector = UnavailableInspector;
        assert!(!inspector.capabilities().any());
        assert!(matches!(
            inspector.inspect(Path::new("frame.png")),
            Err(InspectorError::NotConfigured)
        ));
    }

    #[test]
    fn test_sidecar_requires_command() {
        assert!(matches!(
            SidecarInspector::new(&[]),
            Err(InspectorError::NotConfigured)
        ));
        let inspector = SidecarInspector::new(&["/nonexistent/landmarks".to_string()])
            .unwrap()
            .with_capabilities(InspectorCapabilities {
                faces: true,
                pose: false,
                hands: false,
            });
        assert!(inspector.capabilities().faces);
        assert!(!inspector.capabilities().pose);
        assert!(matches!(
            inspector.inspect(Path::new("frame.png")),
            Err(InspectorError::ExecutionFailed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_sidecar_parses_command_output() {
        let inspector = SidecarInspector::new(&[
            "sh".to_string(),
            "-c".to_string(),
            r#"echo '{"faces":[{"confidence":0.75}],"hands":[]}'"#.to_string(),
        ])
        .unwrap();
        let landmarks = inspector.inspect(Path::new("ignored.png")).unwrap();
        assert_eq!(landmarks.faces, vec![FaceDetection { confidence: 0.75 }]);
        assert!(landmarks.pose.is_none());
    }
}

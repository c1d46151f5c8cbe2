//! Pose and hand metrics, and their aggregation across sampled frames

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::inspector::Landmark;
use crate::models::video_analysis::{GestureStats, MovementStats};

const HEAD: usize = 0;
const LEFT_SHOULDER: usize = 11;
const RIGHT_SHOULDER: usize = 12;
const LEFT_HIP: usize = 23;
const RIGHT_HIP: usize = 24;
const LEFT_ANKLE: usize = 29;
const POSE_POINTS_REQUIRED: usize = LEFT_ANKLE + 1;

const WRIST: usize = 0;
const FINGERTIPS: [usize; 5] = [4, 8, 12, 16, 20];
const HAND_POINTS: usize = 21;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseMetrics {
    pub shoulder_width: f64,
    /// Head to ankle
    pub body_height: f64,
    pub spine_alignment: f64,
    pub shoulder_level: f64,
    /// Mean landmark visibility
    pub confidence: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    Fist,
    Pointing,
    PeaceSign,
    OpenHand,
    PartialGesture,
}

impl Gesture {
    /// Classify by how many fingertips sit above the wrist (image y grows downward)
    pub fn classify(points: &[Landmark]) -> Self {
        let wrist_y = points[WRIST].y;
        let raised = FINGERTIPS.iter().filter(|&&i| points[i].y < wrist_y).count();
        match raised {
            0 => Gesture::Fist,
            1 => Gesture::Pointing,
            2 => Gesture::PeaceSign,
            5 => Gesture::OpenHand,
            _ => Gesture::PartialGesture,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gesture::Fist => "fist",
            Gesture::Pointing => "pointing",
            Gesture::PeaceSign => "peace_sign",
            Gesture::OpenHand => "open_hand",
            Gesture::PartialGesture => "partial_gesture",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandMetrics {
    /// Thumb tip to pinky tip
    pub hand_span: f64,
    pub finger_spread: f64,
    pub gesture: Gesture,
    /// Standard deviation over all landmark coordinates
    pub activity_level: f64,
    pub timestamp: f64,
}

/// Metrics for one body; `None` when too few landmarks were reported
pub fn pose_metrics(points: &[Landmark], timestamp: f64) -> Option<PoseMetrics> {
    if points.len() < POSE_POINTS_REQUIRED {
        return None;
    }
    let confidence = points.iter().map(|p| p.visibility).sum::<f64>() / points.len() as f64;
    Some(PoseMetrics {
        shoulder_width: points[LEFT_SHOULDER].distance(&points[RIGHT_SHOULDER]),
        body_height: points[HEAD].distance(&points[LEFT_ANKLE]),
        spine_alignment: spine_alignment(points),
        shoulder_level: (points[LEFT_SHOULDER].y - points[RIGHT_SHOULDER].y).abs(),
        confidence,
        timestamp,
    })
}

/// Cosine between the hip-to-head vector and straight up, floored at 0
fn spine_alignment(points: &[Landmark]) -> f64 {
    let hip_x = (points[LEFT_HIP].x + points[RIGHT_HIP].x) / 2.0;
    let hip_y = (points[LEFT_HIP].y + points[RIGHT_HIP].y) / 2.0;
    let dx = points[HEAD].x - hip_x;
    let dy = points[HEAD].y - hip_y;
    let cosine = -dy / ((dx * dx + dy * dy).sqrt() + 1e-10);
    cosine.max(0.0)
}

/// Metrics for one hand; `None` when too few landmarks were reported
pub fn hand_metrics(points: &[Landmark], timestamp: f64) -> Option<HandMetrics> {
    if points.len() < HAND_POINTS {
        return None;
    }
    let spreads: Vec<f64> = FINGERTIPS
        .windows(2)
        .map(|pair| points[pair[0]].distance(&points[pair[1]]))
        .collect();
    let finger_spread = spreads.iter().sum::<f64>() / spreads.len() as f64;

    let coords: Vec<f64> = points.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
    let mean = coords.iter().sum::<f64>() / coords.len() as f64;
    let activity_level =
        (coords.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / coords.len() as f64).sqrt();

    Some(HandMetrics {
        hand_span: points[FINGERTIPS[0]].distance(&points[FINGERTIPS[4]]),
        finger_spread,
        gesture: Gesture::classify(points),
        activity_level,
        timestamp,
    })
}

/// Frame-to-frame shoulder-width deltas
pub fn movement_stats(poses: &[PoseMetrics]) -> Result<MovementStats, String> {
    if poses.len() < 2 {
        return Err("Insufficient pose data".to_string());
    }
    let deltas: Vec<f64> = poses
        .windows(2)
        .map(|pair| (pair[1].shoulder_width - pair[0].shoulder_width).abs())
        .collect();
    let n = deltas.len() as f64;
    let total: f64 = deltas.iter().sum();
    let mean = total / n;
    let std = (deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n).sqrt();

    Ok(MovementStats {
        average_movement: mean,
        movement_variability: std,
        total_movement: total,
        movement_peaks: deltas.iter().filter(|&&d| d > mean + std).count(),
    })
}

pub fn gesture_stats(hands: &[HandMetrics]) -> GestureStats {
    let mut gesture_types: BTreeMap<String, usize> = BTreeMap::new();
    for hand in hands {
        *gesture_types.entry(hand.gesture.as_str().to_string()).or_default() += 1;
    }

    // Ties resolve to the alphabetically first class
    let most_common_gesture = gesture_types
        .iter()
        .fold(None::<(&String, usize)>, |best, (name, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((name, count)),
        })
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| "none".to_string());

    let average_activity = if hands.is_empty() {
        0.0
    } else {
        hands.iter().map(|h| h.activity_level).sum::<f64>() / hands.len() as f64
    };

    let gesture_frequency = match (hands.first(), hands.last()) {
        (Some(first), Some(last)) if hands.len() > 1 && last.timestamp > first.timestamp => {
            hands.len() as f64 / (last.timestamp - first.timestamp)
        }
        _ => 0.0,
    };

    GestureStats {
        gesture_variety: gesture_types.len(),
        gesture_types,
        most_common_gesture,
        average_activity,
        gesture_frequency,
    }
}

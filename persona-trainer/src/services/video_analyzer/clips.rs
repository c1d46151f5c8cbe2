//! Training clip selection

use crate::models::video_analysis::TimeRange;

/// Voice segments closer than this are merged
pub const MAX_MERGE_GAP_SECONDS: f64 = 2.0;
/// Merged voice segments shorter than this are dropped
pub const MIN_CLIP_SECONDS: f64 = 5.0;
pub const CHUNK_SECONDS: f64 = 30.0;
/// Trailing chunks shorter than this are dropped
pub const MIN_CHUNK_SECONDS: f64 = 10.0;

/// Ranges worth cutting into training clips
///
/// Voice segments are merged across short gaps and kept when long enough. Without any such
/// segment the whole video is split into fixed chunks.
pub fn training_segments(voice_segments: &[TimeRange], duration: f64) -> Vec<TimeRange> {
    let from_voice = merge_voice_segments(voice_segments);
    if !from_voice.is_empty() {
        return from_voice;
    }
    fixed_chunks(duration)
}

fn merge_voice_segments(voice_segments: &[TimeRange]) -> Vec<TimeRange> {
    let mut merged: Vec<TimeRange> = Vec::new();
    for segment in voice_segments {
        match merged.last_mut() {
            Some(last) if segment.start - last.end <= MAX_MERGE_GAP_SECONDS => {
                last.end = last.end.max(segment.end);
            }
            _ => merged.push(*segment),
        }
    }
    merged.retain(|r| r.duration() >= MIN_CLIP_SECONDS);
    merged
}

fn fixed_chunks(duration: f64) -> Vec<TimeRange> {
    if !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }
    let whole_seconds = duration.trunc();
    let mut chunks = Vec::new();
    let mut start = 0.0;
    while start < whole_seconds {
        let end = (start + CHUNK_SECONDS).min(duration);
        if end - start >= MIN_CHUNK_SECONDS {
            chunks.push(TimeRange::new(start, end));
        }
        start += CHUNK_SECONDS;
    }
    chunks
}

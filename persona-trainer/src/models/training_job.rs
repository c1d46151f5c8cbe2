//! Training job state machine
//!
//! A job progresses QUEUED → RUNNING → {COMPLETED | FAILED | CANCELLED}.
//! Terminal states are final; progress never decreases within a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Training job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Registered, worker not started yet
    Queued,
    /// Worker is processing modalities
    Running,
    /// Persona model written
    Completed,
    /// A stage failed; no model written this run
    Failed,
    /// Cancellation observed (or requested before the worker finished)
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the forward-only order
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub persona_id: String,
    pub old_status: JobStatus,
    pub new_status: JobStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory training job for one persona
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingJob {
    pub persona_id: String,

    pub status: JobStatus,

    /// Human-readable current stage
    pub current_step: String,

    /// Percentage complete (0.0 - 100.0), non-decreasing
    pub progress_percentage: f64,

    /// Latest detail message (replaced on every update)
    pub details: String,

    pub started_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set when the job reaches a terminal state
    pub ended_at: Option<DateTime<Utc>>,
}

impl TrainingJob {
    pub fn new(persona_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            persona_id: persona_id.into(),
            status: JobStatus::Queued,
            current_step: "Queued".to_string(),
            progress_percentage: 0.0,
            details: "Waiting to start".to_string(),
            started_at: now,
            updated_at: now,
            ended_at: None,
        }
    }

    /// Transition to a new status
    ///
    /// Returns `None` (and leaves the job untouched) for backward moves or moves out of a
    /// terminal state.
    pub fn transition_to(&mut self, new_status: JobStatus) -> Option<StateTransition> {
        if !self.status.can_transition_to(new_status) {
            return None;
        }
        let now = Utc::now();
        let transition = StateTransition {
            persona_id: self.persona_id.clone(),
            old_status: self.status,
            new_status,
            transitioned_at: now,
        };
        self.status = new_status;
        self.updated_at = now;
        if new_status.is_terminal() {
            self.ended_at = Some(now);
        }
        Some(transition)
    }

    /// Update step, percentage and details
    ///
    /// The percentage is clamped to 0..=100 and never moves backwards. Returns the
    /// percentage actually stored.
    pub fn update_progress(
        &mut self,
        step: impl Into<String>,
        percentage: f64,
        details: impl Into<String>,
    ) -> f64 {
        let pct = if percentage.is_finite() {
            percentage.clamp(0.0, 100.0)
        } else {
            self.progress_percentage
        };
        self.progress_percentage = self.progress_percentage.max(pct);
        self.current_step = step.into();
        self.details = details.into();
        self.updated_at = Utc::now();
        self.progress_percentage
    }

    /// Replace the details string without touching progress
    pub fn set_details(&mut self, details: impl Into<String>) {
        self.details = details.into();
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Snapshot for progress queries
    pub fn snapshot(&self) -> TrainingProgress {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        TrainingProgress {
            persona_id: self.persona_id.clone(),
            status: self.status,
            current_step: self.current_step.clone(),
            progress_percentage: self.progress_percentage,
            details: self.details.clone(),
            started_at: self.started_at,
            updated_at: self.updated_at,
            ended_at: self.ended_at,
            elapsed_seconds: (end - self.started_at).num_seconds().max(0) as u64,
        }
    }
}

/// Read-only view of a training job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgress {
    pub persona_id: String,
    pub status: JobStatus,
    pub current_step: String,
    pub progress_percentage: f64,
    pub details: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let mut job = TrainingJob::new("p1");
        assert_eq!(job.status, JobStatus::Queued);

        let t = job.transition_to(JobStatus::Running).unwrap();
        assert_eq!(t.old_status, JobStatus::Queued);
        assert_eq!(t.new_status, JobStatus::Running);
        assert!(job.ended_at.is_none());

        job.transition_to(JobStatus::Completed).unwrap();
        assert!(job.is_terminal());
        assert!(job.ended_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = TrainingJob::new("p1");
        job.transition_to(JobStatus::Running);
        job.transition_to(JobStatus::Cancelled).unwrap();

        assert!(job.transition_to(JobStatus::Completed).is_none());
        assert!(job.transition_to(JobStatus::Running).is_none());
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[test]
    fn test_no_backward_moves() {
        let mut job = TrainingJob::new("p1");
        job.transition_to(JobStatus::Running);
        assert!(job.transition_to(JobStatus::Queued).is_none());
        // queued jobs may be cancelled before the worker starts
        let mut queued = TrainingJob::new("p2");
        assert!(queued.transition_to(JobStatus::Cancelled).is_some());
    }

    #[test]
    fn test_progress_is_monotonic_and_details_replaced() {
        let mut job = TrainingJob::new("p1");
        assert_eq!(job.update_progress("Processing audio files (1/2)", 50.0, "a"), 50.0);
        assert_eq!(job.update_progress("Processing video files (2/2)", 25.0, "b"), 50.0);
        assert_eq!(job.details, "b");
        assert_eq!(job.current_step, "Processing video files (2/2)");
        assert_eq!(job.update_progress("Done", 150.0, "c"), 100.0);
        assert_eq!(job.update_progress("Done", f64::NAN, "d"), 100.0);
    }

    #[test]
    fn test_snapshot_serializes_uppercase_status() {
        let job = TrainingJob::new("p1");
        let json = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(json["status"], "QUEUED");
        assert_eq!(json["persona_id"], "p1");
        assert_eq!(json["progress_percentage"], 0.0);
    }
}

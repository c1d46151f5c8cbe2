//! Shared registry of training jobs, keyed by persona id
//!
//! Each entry pairs the job record with the cancellation token its worker polls between
//! stages. Handles are cheap to clone; all clones see the same map.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::models::training_job::{JobStatus, StateTransition, TrainingJob, TrainingProgress};

struct JobEntry {
    job: TrainingJob,
    cancel: CancellationToken,
}

#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh queued job for `persona_id`
    ///
    /// Returns `None` without touching anything when the persona already has a non-terminal
    /// job. A terminal job is replaced.
    pub async fn register(&self, persona_id: &str) -> Option<CancellationToken> {
        let mut jobs = self.jobs.write().await;
        if let Some(existing) = jobs.get(persona_id) {
            if !existing.job.is_terminal() {
                return None;
            }
        }
        let cancel = CancellationToken::new();
        jobs.insert(
            persona_id.to_string(),
            JobEntry {
                job: TrainingJob::new(persona_id),
                cancel: cancel.clone(),
            },
        );
        Some(cancel)
    }

    pub async fn progress(&self, persona_id: &str) -> Option<TrainingProgress> {
        self.jobs
            .read()
            .await
            .get(persona_id)
            .map(|entry| entry.job.snapshot())
    }

    pub async fn status(&self, persona_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(persona_id).map(|e| e.job.status)
    }

    /// Record progress on a live job, returning the new snapshot
    ///
    /// Terminal jobs are left untouched and yield `None`.
    pub async fn update_progress(
        &self,
        persona_id: &str,
        step: &str,
        percentage: f64,
        details: &str,
    ) -> Option<TrainingProgress> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(persona_id)?;
        if entry.job.is_terminal() {
            return None;
        }
        entry.job.update_progress(step, percentage, details);
        Some(entry.job.snapshot())
    }

    /// Move a job to `status`, replacing its details
    pub async fn transition(
        &self,
        persona_id: &str,
        status: JobStatus,
        details: &str,
    ) -> Option<StateTransition> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(persona_id)?;
        let transition = entry.job.transition_to(status)?;
        entry.job.set_details(details);
        Some(transition)
    }

    /// Flip a non-terminal job to `Cancelled` and signal its worker
    ///
    /// Returns `false` for unknown personas and jobs that already finished.
    pub async fn cancel(&self, persona_id: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(persona_id) else {
            return false;
        };
        if entry.job.transition_to(JobStatus::Cancelled).is_none() {
            return false;
        }
        entry.job.set_details("Cancellation requested");
        entry.cancel.cancel();
        info!(persona_id = %persona_id, "Training cancellation requested");
        true
    }

    /// Snapshot of every known job, sorted by persona id
    pub async fn list(&self) -> Vec<TrainingProgress> {
        let mut all: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .map(|entry| entry.job.snapshot())
            .collect();
        all.sort_by(|a, b| a.persona_id.cmp(&b.persona_id));
        all
    }

    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|entry| !entry.job.is_terminal())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_rejects_active_duplicate() {
        let store = JobStore::new();
        assert!(store.register("p1").await.is_some());
        assert!(store.register("p1").await.is_none());
        assert!(store.register("p2").await.is_some());
        assert_eq!(store.active_count().await, 2);

        store.transition("p1", JobStatus::Running, "running").await.unwrap();
        store.transition("p1", JobStatus::Completed, "done").await.unwrap();
        // finished jobs are replaced by a new run
        assert!(store.register("p1").await.is_some());
        assert_eq!(store.status("p1").await, Some(JobStatus::Queued));
    }

    #[tokio::test]
    async fn test_cancel_flips_status_and_token() {
        let store = JobStore::new();
        let token = store.register("p1").await.unwrap();
        store.transition("p1", JobStatus::Running, "running").await;

        assert!(store.cancel("p1").await);
        assert!(token.is_cancelled());
        assert_eq!(store.status("p1").await, Some(JobStatus::Cancelled));

        // already terminal
        assert!(!store.cancel("p1").await);
        assert!(!store.cancel("unknown").await);
    }

    #[tokio::test]
    async fn test_progress_ignored_after_terminal() {
        let store = JobStore::new();
        store.register("p1").await.unwrap();
        store.transition("p1", JobStatus::Running, "running").await;

        let snap = store.update_progress("p1", "audio", 40.0, "Analyzing").await.unwrap();
        assert_eq!(snap.progress_percentage, 40.0);
        let snap = store.update_progress("p1", "video", 20.0, "Analyzing").await.unwrap();
        assert_eq!(snap.progress_percentage, 40.0);
        assert_eq!(snap.current_step, "video");

        store.cancel("p1").await;
        assert!(store.update_progress("p1", "text", 80.0, "x").await.is_none());
        assert_eq!(store.progress("p1").await.unwrap().details, "Cancellation requested");
        assert!(store.progress("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let store = JobStore::new();
        store.register("b").await;
        store.register("a").await;
        let ids: Vec<_> = store.list().await.into_iter().map(|p| p.persona_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}

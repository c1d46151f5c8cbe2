//! TEXT stage: keep non-blank writing samples and derive writing-style heuristics

use std::path::PathBuf;
use tracing::{info, warn};

use super::{PipelineError, RunContext, TrainingOrchestrator, PERSONALITY_FEATURES_FILE};
use crate::services::text_analyzer::process_text_files;
use crate::utils::{remove_if_exists, write_json_atomic};

impl TrainingOrchestrator {
    pub(super) async fn phase_text(
        &self,
        ctx: &RunContext,
        files: &[PathBuf],
    ) -> Result<(), PipelineError> {
        let text_dir = ctx.persona_dir.join("text");
        let inputs = files.to_vec();
        let batch =
            tokio::task::spawn_blocking(move || process_text_files(&inputs, &text_dir)).await??;

        let features_path = ctx.persona_dir.join(PERSONALITY_FEATURES_FILE);
        match &batch.profile {
            Some(profile) => {
                write_json_atomic(&features_path, profile)?;
                info!(
                    persona_id = %ctx.persona_id,
                    processed = batch.processed.len(),
                    missing = batch.missing.len(),
                    failed = batch.failures.len(),
                    "Personality features written"
                );
            }
            None => {
                warn!(persona_id = %ctx.persona_id, "No usable text files found");
                remove_if_exists(&features_path)?;
            }
        }
        Ok(())
    }
}

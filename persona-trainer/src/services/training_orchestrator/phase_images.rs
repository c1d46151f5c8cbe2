//! IMAGES stage: normalize images into the persona directory

use std::path::PathBuf;
use tracing::info;

use super::{PipelineError, RunContext, TrainingOrchestrator};
use crate::services::image_processor::process_images;

impl TrainingOrchestrator {
    pub(super) async fn phase_images(
        &self,
        ctx: &RunContext,
        files: &[PathBuf],
    ) -> Result<(), PipelineError> {
        let images_dir = ctx.persona_dir.join("images");
        let inputs = files.to_vec();
        let batch =
            tokio::task::spawn_blocking(move || process_images(&inputs, &images_dir)).await??;

        info!(
            persona_id = %ctx.persona_id,
            processed = batch.processed.len(),
            missing = batch.missing.len(),
            skipped = batch.failures.len(),
            "Processed image files"
        );
        Ok(())
    }
}

//! SYNTHESIS stage: assemble `persona_model.json` from the section artifacts on disk

use chrono::Utc;
use tracing::info;

use super::{
    PipelineError, RunContext, TrainingOrchestrator, PERSONALITY_FEATURES_FILE,
    PERSONA_MODEL_FILE, VISUAL_FEATURES_FILE, VOICE_FEATURES_FILE,
};
use crate::models::persona_model::PersonaModel;
use crate::utils::{read_json_if_exists, write_json_atomic};

impl TrainingOrchestrator {
    /// Sections come from whatever artifacts exist, including ones left by earlier runs for
    /// modalities absent from this run's input
    pub(super) async fn phase_synthesis(&self, ctx: &RunContext) -> Result<PersonaModel, PipelineError> {
        let dir = &ctx.persona_dir;
        let model = PersonaModel {
            persona_id: ctx.persona_id.clone(),
            voice_model: read_json_if_exists(&dir.join(VOICE_FEATURES_FILE))?,
            visual_model: read_json_if_exists(&dir.join(VISUAL_FEATURES_FILE))?,
            personality_model: read_json_if_exists(&dir.join(PERSONALITY_FEATURES_FILE))?,
            training_timestamp: Utc::now(),
        };
        write_json_atomic(&dir.join(PERSONA_MODEL_FILE), &model)?;
        info!(
            persona_id = %ctx.persona_id,
            sections = ?model.sections(),
            "Synthesized persona model"
        );
        Ok(model)
    }
}

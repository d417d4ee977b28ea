//! The Anki note model that carries passages.

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::contract::AnkiApi;
use crate::error::{SyncError, SyncResult};

/// Field names of the note model, in field order.
pub const NOTE_FIELDS: [&str; 10] = [
    "front",
    "back",
    "id",
    "parent_id",
    "hpath",
    "hash",
    "updated",
    "parent_updated",
    "parent_hash",
    "deck",
];

/// `createModel` parameters for a model named `model`.
pub fn model_definition(model: &str) -> Value {
    json!({
        "modelName": model,
        "inOrderFields": NOTE_FIELDS,
        "cardTemplates": [{
            "Front": "{{front}}",
            "Back": "{{FrontSide}}\n\n<hr id=answer>\n\n{{back}}",
        }],
    })
}

/// Makes sure `model` exists with every field the engine writes.
///
/// A missing model is created once; failure to create it aborts the run. A model that
/// exists but lacks fields cannot be recreated under the same name and is reported as
/// [`SyncError::SchemaDrift`].
pub async fn ensure_model<A>(api: &A, model: &str) -> SyncResult<()>
where
    A: AnkiApi + ?Sized,
{
    let models = api.model_names().await?;
    if !models.iter().any(|m| m == model) {
        warn!(model, "[SYNC] Anki note model does not exist, creating it");
        return match api.create_model(model_definition(model)).await {
            Ok(()) => {
                info!(model, "[SYNC] Anki note model created");
                Ok(())
            }
            Err(e) => {
                error!(model, error = %e, "[SYNC][ERROR] Anki note model creation failed");
                Err(e)
            }
        };
    }

    let present = api.model_field_names(model).await?;
    let missing: Vec<String> = NOTE_FIELDS
        .iter()
        .filter(|f| !present.iter().any(|p| p == *f))
        .map(|f| f.to_string())
        .collect();
    if !missing.is_empty() {
        error!(model, ?missing, "[SYNC][ERROR] Anki note model lacks required fields");
        return Err(SyncError::SchemaDrift {
            model: model.to_string(),
            missing,
        });
    }
    Ok(())
}

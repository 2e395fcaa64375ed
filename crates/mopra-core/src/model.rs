use anyhow::Result;

use crate::storage::KeyValueStore;

/// Storage key holding the selected model id
pub const SELECTED_MODEL_KEY: &str = "selectedModel";

pub const DEFAULT_MODEL: &str = "phi3";

/// Models the backend can serve: (id, display label)
const MODELS: &[(&str, &str)] = &[("phi3", "Phi-3")];

pub fn all() -> Vec<&'static str> {
    MODELS.iter().map(|(id, _)| *id).collect()
}

pub fn is_known(id: &str) -> bool {
    MODELS.iter().any(|(known, _)| *known == id)
}

/// Display label for a model id, falling back to the id itself.
pub fn display_name(id: &str) -> &str {
    MODELS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, label)| *label)
        .unwrap_or(id)
}

/// Model tag recorded on user messages: the id without any `:variant` suffix.
pub fn base_id(id: &str) -> &str {
    id.split(':').next().unwrap_or(id)
}

/// Restore the persisted selection, ignoring ids no longer in the catalog.
pub fn load_selected(store: &dyn KeyValueStore, fallback: &str) -> Result<String> {
    let saved = store.get(SELECTED_MODEL_KEY)?;
    let chosen = saved
        .filter(|id| is_known(id))
        .unwrap_or_else(|| {
            if is_known(fallback) {
                fallback.to_string()
            } else {
                DEFAULT_MODEL.to_string()
            }
        });
    Ok(chosen)
}

pub fn save_selected(store: &mut dyn KeyValueStore, id: &str) -> Result<()> {
    store.set(SELECTED_MODEL_KEY, id)
}

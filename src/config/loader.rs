//! Load resource registrations from a JSON file or from the compiled-in catalog.

use crate::config::types::ResourceRegistration;
use crate::error::ConfigError;
use serde_json::Value;
use std::path::Path;

const CATALOG: &str = include_str!("../../resources/catalog.json");

/// The registrations shipped with the crate (habits, tasks, objectives, ...).
pub fn default_registrations() -> Result<Vec<ResourceRegistration>, ConfigError> {
    parse_registrations(CATALOG)
}

/// Parse a JSON array of registrations. Only a document that is not an array fails;
/// an entry that does not describe a registration is logged and skipped.
pub fn parse_registrations(json: &str) -> Result<Vec<ResourceRegistration>, ConfigError> {
    let entries: Vec<Value> = serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
    let mut out = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let endpoint = entry
            .get("endpoint")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        match serde_json::from_value::<ResourceRegistration>(entry) {
            Ok(reg) => out.push(reg),
            Err(e) => {
                tracing::error!(index, endpoint = %endpoint, error = %e, "skipping resource definition");
            }
        }
    }
    Ok(out)
}

/// Read a JSON array of registrations from `path`.
pub async fn load_registrations(path: &Path) -> Result<Vec<ResourceRegistration>, ConfigError> {
    tracing::debug!(path = %path.display(), "loading resource registrations");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_registrations(&raw)
}

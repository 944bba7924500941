//! JSON dump of the raw session columns.

use crate::recording::session::SessionStore;
use crate::recording::types::ExportError;

/// Render the session as pretty-printed JSON.
pub fn export_json(store: &SessionStore) -> Result<String, ExportError> {
    let json = serde_json::to_string_pretty(&store.snapshot())?;
    Ok(json)
}

/// Export the session as JSON and write it to a file.
pub fn export_json_to_file(store: &SessionStore, path: &std::path::Path) -> Result<(), ExportError> {
    let content = export_json(store)?;
    std::fs::write(path, content)?;
    tracing::info!("Session JSON written to {}", path.display());
    Ok(())
}

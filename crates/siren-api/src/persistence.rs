//! `settings.json`: per-siren settings kept across restarts

use siren_control::SirenSettings;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tokio::fs;

/// Settings of all sirens, keyed by device id
pub type SettingsStore = HashMap<String, SirenSettings>;

/// Read the settings file. An unreadable or malformed file yields an empty
/// store, which makes every configured siren a first init.
pub async fn load_settings(path: &Path) -> SettingsStore {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("No siren settings at {:?}", path);
            return SettingsStore::new();
        }
        Err(e) => {
            tracing::warn!("Cannot read siren settings {:?}: {}", path, e);
            return SettingsStore::new();
        }
    };

    serde_json::from_str::<SettingsStore>(&contents).unwrap_or_else(|e| {
        tracing::warn!("Ignoring malformed siren settings {:?}: {}", path, e);
        SettingsStore::new()
    })
}

/// Replace the settings file. Readers only ever see the old or the new file.
#[allow(clippy::missing_errors_doc)]
pub async fn save_settings(path: &Path, store: &SettingsStore) -> Result<(), io::Error> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await?;
    }

    let json = serde_json::to_vec_pretty(store)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json).await?;
    fs::rename(&staging, path).await?;

    tracing::debug!("Stored settings of {} sirens in {:?}", store.len(), path);
    Ok(())
}

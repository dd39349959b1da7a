//! Infrastructure implementation of the `SettingsStore` port.
//!
//! `JsonFileSettingsStore` keeps one JSON file per key under a state
//! directory. Writes are atomic (temp file + rename) so a teardown process
//! never reads half-written settings. Blocking I/O runs on
//! `tokio::task::spawn_blocking`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ephemeral_common::ExecutionSettings;

use crate::application::ports::SettingsStore;

/// Settings store backed by JSON files.
pub struct JsonFileSettingsStore {
    dir: PathBuf,
}

impl JsonFileSettingsStore {
    /// Create a store using the default directory (`~/.ephemeral-runner/state`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::with_dir(home.join(".ephemeral-runner").join("state")))
    }

    /// Create a store with an explicit directory (used in tests).
    #[must_use]
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// File holding `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn load_sync(path: &Path) -> Result<Option<ExecutionSettings>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        Ok(Some(settings))
    }

    fn save_sync(path: &Path, settings: &ExecutionSettings) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(settings).context("serializing settings")?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
        }

        std::fs::rename(&temp_path, path)
            .with_context(|| format!("finalizing settings file {}", path.display()))?;
        Ok(())
    }

    fn clear_sync(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("removing settings file {}", path.display()))?;
        }
        Ok(())
    }
}

impl SettingsStore for JsonFileSettingsStore {
    async fn save(&self, key: &str, settings: &ExecutionSettings) -> Result<()> {
        let path = self.path_for(key);
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || Self::save_sync(&path, &settings))
            .await
            .context("settings save task panicked")?
    }

    async fn load(&self, key: &str) -> Result<Option<ExecutionSettings>> {
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || Self::load_sync(&path))
            .await
            .context("settings load task panicked")?
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || Self::clear_sync(&path))
            .await
            .context("settings clear task panicked")?
    }
}

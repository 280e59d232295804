//! Runtime configuration: defaults, then an optional TOML file, then `PROMPTLAB__*` env vars.
//!
//! | Key | Env | Default |
//! |-----|-----|---------|
//! | storage_path | PROMPTLAB__STORAGE_PATH | ./data |
//! | response_delay_ms | PROMPTLAB__RESPONSE_DELAY_MS | 1500 |
//! | overlap_policy | PROMPTLAB__OVERLAP_POLICY | allow_overlap |
//! | export_dir | PROMPTLAB__EXPORT_DIR | ./exports |
//!
//! The file path comes from `PROMPTLAB_CONFIG` (default `config/promptlab.toml`).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chat::OverlapPolicy;

const DEFAULT_CONFIG_PATH: &str = "config/promptlab.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct LabConfig {
    /// Base directory for the Sled preference store.
    pub storage_path: String,
    /// Simulated latency before the mock reply.
    pub response_delay_ms: u64,
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
    /// Where "download" actions write their files.
    pub export_dir: String,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            storage_path: "./data".to_string(),
            response_delay_ms: 1500,
            overlap_policy: OverlapPolicy::AllowOverlap,
            export_dir: "./exports".to_string(),
        }
    }
}

impl LabConfig {
    /// Loads from `PROMPTLAB_CONFIG` (or the default path) and the environment.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let path = std::env::var("PROMPTLAB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Same as `load` with an explicit file path. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ::config::ConfigError> {
        let defaults = Self::default();
        let builder = ::config::Config::builder()
            .set_default("storage_path", defaults.storage_path)?
            .set_default("response_delay_ms", defaults.response_delay_ms as i64)?
            .set_default("overlap_policy", "allow_overlap")?
            .set_default("export_dir", defaults.export_dir)?;

        let builder = if path.exists() {
            builder.add_source(::config::File::from(path))
        } else {
            builder
        };

        builder
            .add_source(::config::Environment::with_prefix("PROMPTLAB").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn response_delay(&self) -> Duration {
        Duration::from_millis(self.response_delay_ms)
    }

    /// Sled directory for preferences, under `storage_path`.
    pub fn preferences_path(&self) -> PathBuf {
        Path::new(&self.storage_path).join("promptlab_prefs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promptlab.toml");
        std::fs::write(
            &path,
            "response_delay_ms = 250\noverlap_policy = \"cancel_previous\"\n",
        )
        .unwrap();

        let config = LabConfig::load_from(&path).unwrap();
        assert_eq!(config.response_delay(), Duration::from_millis(250));
        assert_eq!(config.overlap_policy, OverlapPolicy::CancelPrevious);
        assert_eq!(config.export_dir, "./exports");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LabConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.overlap_policy, OverlapPolicy::AllowOverlap);
        assert_eq!(config.preferences_path(), Path::new("./data").join("promptlab_prefs"));
    }
}

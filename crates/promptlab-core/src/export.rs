//! Clipboard and file-download sinks used by the "copy" and "download" actions.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::error::{LabError, LabResult};
use crate::shared::GenerationParameters;

/// File name used when downloading the current parameters.
pub const PARAMS_FILE_NAME: &str = "params.json";

/// File name used when downloading a single chat message.
pub fn output_file_name(message_id: &str) -> String {
    format!("output-{}.json", message_id)
}

/// Write-only text sink.
pub trait ClipboardSink: Send + Sync {
    fn write_text(&self, text: &str) -> LabResult<()>;
}

/// Receives a named file to hand to the user. No server round-trip.
pub trait DownloadSink: Send + Sync {
    /// Returns where the file ended up.
    fn save(&self, file_name: &str, bytes: &[u8]) -> LabResult<PathBuf>;
}

/// Clipboard that keeps the last written text in memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClipboardSink for MemoryClipboard {
    fn write_text(&self, text: &str) -> LabResult<()> {
        let mut slot = self
            .contents
            .lock()
            .map_err(|e| LabError::Clipboard(e.to_string()))?;
        *slot = Some(text.to_string());
        Ok(())
    }
}

/// Download sink that writes into a fixed directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectoryDownloadSink {
    dir: PathBuf,
}

impl DirectoryDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for DirectoryDownloadSink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> LabResult<PathBuf> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(LabError::Download(format!("invalid file name '{}'", file_name)));
        }
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| LabError::Download(format!("{}: {}", self.dir.display(), e)))?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes)
            .map_err(|e| LabError::Download(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }
}

/// Body of `output-<id>.json`.
#[derive(Debug, Clone, Serialize)]
pub struct OutputExport<'a> {
    pub id: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<GenerationParameters>,
    /// RFC 3339 time of the export.
    pub timestamp: String,
}

impl<'a> OutputExport<'a> {
    pub fn now(id: &'a str, text: &'a str, params: Option<GenerationParameters>) -> Self {
        Self {
            id,
            text,
            params,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Pretty JSON, as written by both copy and download.
pub fn to_pretty_json<T: Serialize>(value: &T) -> LabResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryDownloadSink::new(dir.path().join("exports"));
        let path = sink.save(PARAMS_FILE_NAME, b"{}").unwrap();
        assert_eq!(path, dir.path().join("exports").join("params.json"));
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn directory_sink_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryDownloadSink::new(dir.path());
        assert!(matches!(sink.save("../x.json", b"{}"), Err(LabError::Download(_))));
        assert!(matches!(sink.save("", b"{}"), Err(LabError::Download(_))));
    }

    #[test]
    fn output_export_carries_params() {
        let params = GenerationParameters::new(0.5, 100, 0.9);
        let export = OutputExport::now("42", "hello", Some(params));
        let json: serde_json::Value = serde_json::from_str(&to_pretty_json(&export).unwrap()).unwrap();
        assert_eq!(json["id"], "42");
        assert_eq!(json["params"]["maxTokens"], 100);
        assert!(json["timestamp"].as_str().is_some());
        assert_eq!(output_file_name("42"), "output-42.json");
    }
}

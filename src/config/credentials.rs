//! API key persistence in `credentials.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::{paths::get_data_dir, read_json_file};

pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    openrouter_api_key: Option<String>,
}

/// File-backed store for the chat API key.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at `<data_dir>/credentials.json`.
    pub fn in_data_dir() -> Self {
        Self::new(get_data_dir().join("credentials.json"))
    }

    /// The env var wins over the stored key. Blank values count as absent.
    pub fn load(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Some(key.trim().to_string());
            }
        }
        self.load_stored()
    }

    /// The key saved on disk, ignoring the environment.
    pub fn load_stored(&self) -> Option<String> {
        read_json_file::<CredentialFile>(&self.path)?
            .openrouter_api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn save(&self, api_key: &str) -> anyhow::Result<()> {
        let file = CredentialFile {
            openrouter_api_key: Some(api_key.trim().to_string()),
        };
        atomic_write(&self.path, &file)
    }
}

/// Write JSON to a temp file, then rename over the target.
fn atomic_write<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path.parent().context("invalid credentials path")?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&tmp_path, json).with_context(|| format!("failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("failed to rename to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (CredentialStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("vchat-cred-{}", uuid::Uuid::new_v4()));
        (CredentialStore::new(dir.join("credentials.json")), dir)
    }

    #[test]
    fn test_save_then_load_stored() {
        let (store, dir) = temp_store();
        assert!(store.load_stored().is_none());

        store.save("  sk-or-123 ").unwrap();
        assert_eq!(store.load_stored().as_deref(), Some("sk-or-123"));
        assert!(!dir.join("credentials.json.tmp").exists());

        let raw = fs::read_to_string(dir.join("credentials.json")).unwrap();
        assert!(raw.contains("openrouter_api_key"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_blank_stored_key_is_absent() {
        let (store, dir) = temp_store();
        store.save("   ").unwrap();
        assert!(store.load_stored().is_none());
        let _ = fs::remove_dir_all(dir);
    }
}

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::registry_cache::{FingerprintStore, RegistryCacheError, RegistryFingerprint};

/// Keeps one pretty-printed JSON file per bot account inside `folder`,
/// named after the account id.
pub struct JsonFingerprintStore {
    folder: PathBuf,
}

impl JsonFingerprintStore {
    pub fn new(folder: impl AsRef<Path>) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn file_for(&self, client_id: &str) -> PathBuf {
        self.folder.join(client_id)
    }
}

#[async_trait]
impl FingerprintStore for JsonFingerprintStore {
    async fn load(&self, client_id: &str) -> Result<Option<RegistryFingerprint>, RegistryCacheError> {
        let path = self.file_for(client_id);
        if !path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path).await?;
        let fingerprint = serde_json::from_str(&text)
            .map_err(|source| RegistryCacheError::Corrupt { path, source })?;
        Ok(Some(fingerprint))
    }

    async fn save(&self, fingerprint: &RegistryFingerprint) -> Result<(), RegistryCacheError> {
        fs::create_dir_all(&self.folder).await?;

        let text = serde_json::to_string_pretty(fingerprint)?;
        fs::write(self.file_for(&fingerprint.client_id), text).await?;
        Ok(())
    }
}

use super::registry_cache_models::RegistryFingerprint;
use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RegistryCacheError {
    #[error("Failed to serialize command snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a valid application command: {0}")]
    InvalidDefinition(String),
    #[error("Corrupt registry cache at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where fingerprints live between runs. One entry per bot account.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored for this account yet.
    async fn load(&self, client_id: &str) -> Result<Option<RegistryFingerprint>, RegistryCacheError>;
    /// Replaces whatever was stored for `fingerprint.client_id`.
    async fn save(&self, fingerprint: &RegistryFingerprint) -> Result<(), RegistryCacheError>;
}

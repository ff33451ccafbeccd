pub mod registry_cache_models;
pub mod registry_cache_service;
pub mod registry_cache_store;

pub use registry_cache_models::{
    CommandDefinition, CommandKind, CommandKindRegistration, RegistrationConfig,
    RegistryFingerprint,
};
pub use registry_cache_service::{
    compute_fingerprint, is_stale, CacheCheckOutcome, CheckInputs, RegistryCacheService,
    DEFAULT_MAX_CACHE_AGE_MS,
};
pub use registry_cache_store::{FingerprintStore, RegistryCacheError};

// Registry change detection.
//
// Decides whether the bot needs to publish its application commands again by
// comparing a fingerprint of the command set (plus the config that shapes
// registration) against the one saved on the previous run.
//
// NO Discord dependencies here - commands arrive as JSON definitions.

use super::registry_cache_models::{
    CommandDefinition, CommandKind, CommandKindRegistration, RegistrationConfig,
    RegistryFingerprint,
};
use super::registry_cache_store::{FingerprintStore, RegistryCacheError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// 24 hours.
pub const DEFAULT_MAX_CACHE_AGE_MS: u64 = 86_400_000;

// ============================================================================
// FINGERPRINT
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintPayload<'a> {
    context_menu_commands: &'a CommandKindRegistration,
    slash_commands: &'a CommandKindRegistration,
    application_command_register: RegisterSection,
    user_id: String,
    commands: Vec<CanonicalCommand<'a>>,
    dev_guilds: Vec<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterSection {
    enabled: bool,
    register_to_guilds: Vec<u64>,
}

// serde_json is built without `preserve_order`, so `Value::Object` is a
// BTreeMap and bodies always serialize with sorted keys.
#[derive(Serialize)]
struct CanonicalCommand<'a> {
    name: &'a str,
    kind: CommandKind,
    body: &'a Value,
}

fn sorted_ids(ids: &[u64]) -> Vec<u64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Compute the fingerprint of a command set for `owner_id`.
///
/// Command order and JSON key order do not affect the digest; any change to a
/// command's name, kind or body does.
pub fn compute_fingerprint(
    commands: &[CommandDefinition],
    config: &RegistrationConfig,
    dev_guilds: &[u64],
    owner_id: u64,
    now: DateTime<Utc>,
) -> Result<RegistryFingerprint, RegistryCacheError> {
    let mut canonical: Vec<CanonicalCommand<'_>> = commands
        .iter()
        .map(|command| CanonicalCommand {
            name: &command.name,
            kind: command.kind,
            body: &command.body,
        })
        .collect();
    canonical.sort_by(|a, b| (a.name, a.kind).cmp(&(b.name, b.kind)));

    let payload = FingerprintPayload {
        context_menu_commands: &config.context_menu_commands,
        slash_commands: &config.slash_commands,
        application_command_register: RegisterSection {
            enabled: config.enabled,
            register_to_guilds: sorted_ids(&config.register_to_guilds),
        },
        user_id: owner_id.to_string(),
        commands: canonical,
        dev_guilds: sorted_ids(dev_guilds),
    };

    let data = hex::encode(serde_json::to_vec(&payload)?);
    let hash = format!("{:x}", md5::compute(data.as_bytes()));

    Ok(RegistryFingerprint {
        client_id: owner_id.to_string(),
        data,
        hash,
        created_at: now,
    })
}

/// `true` means the commands must be registered again.
///
/// The stored fingerprint is only trusted when it exists, is younger than
/// `max_age` and carries the same digest.
pub fn is_stale(
    current: &RegistryFingerprint,
    stored: Option<&RegistryFingerprint>,
    max_age: Duration,
    now: DateTime<Utc>,
) -> bool {
    let Some(stored) = stored else {
        return true;
    };

    if now.signed_duration_since(stored.created_at) >= max_age {
        return true;
    }

    stored.hash != current.hash
}

// ============================================================================
// SERVICE
// ============================================================================

/// Everything the check needs to know about the running bot.
pub struct CheckInputs<'a> {
    pub owner_id: u64,
    pub commands: &'a [CommandDefinition],
    pub dev_guilds: &'a [u64],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCheckOutcome {
    /// Registration was already switched off; nothing was computed or written.
    Disabled,
    /// Same commands, fresh cache. Registration has been switched off for this run.
    Unchanged,
    /// Commands changed, cache expired or missing. Registration proceeds.
    Changed,
}

pub struct RegistryCacheService<S: FingerprintStore> {
    store: S,
    max_age: Duration,
    is_cached: AtomicBool,
    logged_warning: AtomicBool,
    last_check: RwLock<Option<DateTime<Utc>>>,
}

impl<S: FingerprintStore> RegistryCacheService<S> {
    pub fn new(store: S, max_age_ms: u64) -> Self {
        let max_age = i64::try_from(max_age_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX);

        Self {
            store,
            max_age,
            is_cached: AtomicBool::new(false),
            logged_warning: AtomicBool::new(false),
            last_check: RwLock::new(None),
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Whether the last check found the command set unchanged.
    pub fn is_cached(&self) -> bool {
        self.is_cached.load(Ordering::SeqCst)
    }

    pub async fn last_check(&self) -> Option<DateTime<Utc>> {
        *self.last_check.read().await
    }

    /// Read the stored fingerprint. Any failure counts as "no cache".
    pub async fn load_stored(&self, client_id: &str) -> Option<RegistryFingerprint> {
        match self.store.load(client_id).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(client_id, error = %e, "Ignoring unreadable registry cache");
                None
            }
        }
    }

    /// Save a fingerprint. Failures are logged and otherwise ignored.
    pub async fn persist(&self, fingerprint: &RegistryFingerprint) {
        if let Err(e) = self.store.save(fingerprint).await {
            tracing::warn!(
                client_id = %fingerprint.client_id,
                error = %e,
                "Failed to write registry cache"
            );
        }
    }

    /// Compare the running command set with the cached one and switch off
    /// `registration.enabled` when registering again would change nothing.
    pub async fn check(
        &self,
        registration: &RwLock<RegistrationConfig>,
        inputs: CheckInputs<'_>,
    ) -> Result<CacheCheckOutcome, RegistryCacheError> {
        let config = registration.read().await.clone();
        if !config.enabled {
            return Ok(CacheCheckOutcome::Disabled);
        }

        let now = Utc::now();
        let current = compute_fingerprint(
            inputs.commands,
            &config,
            inputs.dev_guilds,
            inputs.owner_id,
            now,
        )?;

        *self.last_check.write().await = Some(now);
        let stored = self.load_stored(&current.client_id).await;

        let outcome = if is_stale(&current, stored.as_ref(), self.max_age, now) {
            tracing::debug!(hash = %current.hash, "Application commands changed or cache expired");
            CacheCheckOutcome::Changed
        } else {
            if !self.logged_warning.swap(true, Ordering::SeqCst) {
                tracing::warn!(
                    "({}) Application commands did not change! Skipping command register...",
                    inputs.commands.len()
                );
            }

            registration.write().await.enabled = false;
            self.is_cached.store(true, Ordering::SeqCst);
            CacheCheckOutcome::Unchanged
        };

        self.persist(&current).await;
        Ok(outcome)
    }
}

// ============================================================================
// TESTS
// ============================================================================

use super::ModuleContext;
use crate::core::dev_commands::DevCommandGate;
use crate::core::modules::{BotModule, ModuleError};
use crate::core::registry_cache::{
    CacheCheckOutcome, CheckInputs, CommandDefinition, RegistryCacheService,
};
use crate::infra::registry_cache::JsonFingerprintStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

/// Skips application command registration when nothing changed since the
/// last run.
pub struct RegistryCacheModule {
    service: RegistryCacheService<JsonFingerprintStore>,
    folder: std::path::PathBuf,
    dev_commands: Option<Arc<DevCommandGate>>,
}

impl RegistryCacheModule {
    pub fn new(
        folder: impl AsRef<Path>,
        max_age_ms: u64,
        dev_commands: Option<Arc<DevCommandGate>>,
    ) -> Self {
        let folder = folder.as_ref().to_path_buf();
        Self {
            service: RegistryCacheService::new(JsonFingerprintStore::new(&folder), max_age_ms),
            folder,
            dev_commands,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn is_cached(&self) -> bool {
        self.service.is_cached()
    }

    pub async fn last_check(&self) -> Option<DateTime<Utc>> {
        self.service.last_check().await
    }

    pub fn max_age(&self) -> chrono::Duration {
        self.service.max_age()
    }

    /// Run the check against the commands in `ctx`.
    pub async fn check(&self, ctx: &ModuleContext) -> Result<CacheCheckOutcome, ModuleError> {
        // Dev commands only count when the dev module will register them
        let mut commands: Vec<CommandDefinition> = ctx
            .application_commands
            .iter()
            .map(|entry| entry.definition.clone())
            .collect();

        let dev_guilds = match &self.dev_commands {
            Some(gate) => {
                commands.extend(
                    ctx.dev_application_commands
                        .iter()
                        .map(|entry| entry.definition.clone()),
                );
                gate.dev_guilds().to_vec()
            }
            None => Vec::new(),
        };

        let outcome = self
            .service
            .check(
                &ctx.registration,
                CheckInputs {
                    owner_id: ctx.bot_user_id,
                    commands: &commands,
                    dev_guilds: &dev_guilds,
                },
            )
            .await?;
        Ok(outcome)
    }
}

#[async_trait]
impl BotModule<ModuleContext> for RegistryCacheModule {
    fn id(&self) -> &'static str {
        "registry-cache"
    }

    async fn load(&self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        let outcome = self.check(ctx).await?;
        tracing::info!(
            ?outcome,
            folder = %self.folder.display(),
            "Checked application command cache"
        );
        Ok(())
    }
}

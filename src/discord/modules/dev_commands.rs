use super::registration::registrable;
use super::registry_cache::RegistryCacheModule;
use super::ModuleContext;
use crate::core::dev_commands::{
    find_conflicts, CommandKey, CommandType, DevCommandGate, ExecutionLocation, ExecutionScope,
};
use crate::core::modules::{BotModule, ModuleError};
use crate::discord::{Context, Error};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Restricts commands in the `Development` category to dev users and guilds,
/// and registers their application commands to the dev guilds only.
pub struct DevCommandsModule {
    gate: Arc<DevCommandGate>,
    registry_cache: Option<Arc<RegistryCacheModule>>,
}

impl DevCommandsModule {
    pub fn new(gate: Arc<DevCommandGate>, registry_cache: Option<Arc<RegistryCacheModule>>) -> Self {
        Self {
            gate,
            registry_cache,
        }
    }

    pub fn gate(&self) -> &DevCommandGate {
        &self.gate
    }

    /// Dev keys that survive conflict filtering.
    fn accepted_keys(ctx: &ModuleContext) -> Vec<CommandKey> {
        let conflicts = find_conflicts(&ctx.command_keys, &ctx.dev_command_keys);
        for key in &conflicts {
            tracing::warn!(
                command = %key.name,
                command_type = %key.command_type,
                "Dev command conflicts with a regular command and will not be restricted"
            );
        }

        ctx.dev_command_keys
            .iter()
            .filter(|key| !conflicts.contains(key))
            .cloned()
            .collect()
    }

    async fn register_to_dev_guilds(&self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        if ctx.dev_application_commands.is_empty() || self.gate.dev_guilds().is_empty() {
            return Ok(());
        }

        let cached = self
            .registry_cache
            .as_ref()
            .is_some_and(|cache| cache.is_cached());
        if cached && !self.gate.config().ignore_commands_cache {
            tracing::info!("Dev application commands did not change, skipping dev guild register");
            return Ok(());
        }

        let registration = ctx.registration.read().await.clone();
        let dev_builders = registrable(&ctx.dev_application_commands, &registration);

        for &guild_id in self.gate.dev_guilds() {
            let mut builders = dev_builders.clone();

            // Setting guild commands replaces every command there
            if registration.register_to_guilds.contains(&guild_id) {
                tracing::warn!(
                    guild_id,
                    "Dev guild is also a registration target; registering regular and dev commands together"
                );
                builders.extend(registrable(&ctx.application_commands, &registration));
            }

            let count = builders.len();
            serenity::GuildId::new(guild_id)
                .set_commands(&ctx.http, builders)
                .await
                .map_err(|e| ModuleError::External(format!("Failed to register dev commands to {guild_id}: {e}")))?;
            tracing::info!(guild_id, count, "Registered dev application commands");
        }

        Ok(())
    }
}

#[async_trait]
impl BotModule<ModuleContext> for DevCommandsModule {
    fn id(&self) -> &'static str {
        "dev-commands"
    }

    async fn start(&self, _ctx: &ModuleContext) -> Result<bool, ModuleError> {
        let config = self.gate.config();
        if config.dev_users.is_empty() {
            tracing::warn!("No dev users configured; dev commands can only run where non-dev users are allowed");
        }
        if config.dev_guilds.is_empty() {
            tracing::warn!("No dev guilds configured; dev application commands will not be registered");
        }
        Ok(true)
    }

    async fn load(&self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.gate.clear();
        for key in Self::accepted_keys(ctx) {
            self.gate.register(key);
        }

        tracing::info!(
            prefix = self.gate.count_of(CommandType::Prefix),
            slash = self.gate.count_of(CommandType::Slash),
            context_menu = self.gate.count_of(CommandType::ContextMenu),
            "Loaded dev commands"
        );
        Ok(())
    }

    async fn modules_loaded(&self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.register_to_dev_guilds(ctx).await
    }

    async fn unload(&self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.gate.clear();
        Ok(())
    }
}

/// How the current invocation reached us.
fn invocation_type(ctx: &Context<'_>) -> CommandType {
    match ctx {
        poise::Context::Prefix(_) => CommandType::Prefix,
        poise::Context::Application(app) => match app.interaction.data.kind {
            serenity::CommandType::ChatInput => CommandType::Slash,
            _ => CommandType::ContextMenu,
        },
    }
}

/// Framework-wide command check. Regular commands always pass.
pub async fn check_dev_command(ctx: Context<'_>) -> Result<bool, Error> {
    let gate = ctx.data().dev_commands.gate();
    let command_type = invocation_type(&ctx);
    let name = &ctx.command().name;

    if !gate.is_dev_command(name, command_type) {
        return Ok(true);
    }

    let scope = ExecutionScope {
        user_id: ctx.author().id.get(),
        location: match ctx.guild_id() {
            Some(guild_id) => ExecutionLocation::Guild(guild_id.get()),
            None => ExecutionLocation::DirectMessage,
        },
    };

    let allowed = gate.is_executable(&scope);
    if !allowed {
        tracing::debug!(
            command = %name,
            user_id = scope.user_id,
            "Blocked dev command"
        );
    }
    Ok(allowed)
}

// Application command registration.
//
// Reads the shared registration config (which the registry cache may have
// switched off) and publishes the regular application commands globally or
// to the configured guilds.

use super::{ApplicationCommandEntry, ModuleContext};
use crate::core::registry_cache::RegistrationConfig;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;

/// Builders of the entries that take part in registration under `config`.
pub fn registrable(
    entries: &[ApplicationCommandEntry],
    config: &RegistrationConfig,
) -> Vec<serenity::CreateCommand> {
    entries
        .iter()
        .filter(|entry| config.allows(entry.definition.kind))
        .map(|entry| entry.builder.clone())
        .collect()
}

/// Returns how many commands were sent, or `None` when registration is off.
pub async fn register_application_commands(ctx: &ModuleContext) -> anyhow::Result<Option<usize>> {
    let config = ctx.registration.read().await.clone();
    if !config.enabled {
        tracing::info!("Application command registration is disabled for this run");
        return Ok(None);
    }

    let builders = registrable(&ctx.application_commands, &config);
    let count = builders.len();

    if config.register_to_guilds.is_empty() {
        serenity::Command::set_global_commands(&ctx.http, builders)
            .await
            .context("Failed to register global application commands")?;
        tracing::info!(count, "Registered global application commands");
    } else {
        for &guild_id in &config.register_to_guilds {
            serenity::GuildId::new(guild_id)
                .set_commands(&ctx.http, builders.clone())
                .await
                .with_context(|| format!("Failed to register application commands to {guild_id}"))?;
            tracing::info!(count, guild_id, "Registered guild application commands");
        }
    }

    Ok(Some(count))
}

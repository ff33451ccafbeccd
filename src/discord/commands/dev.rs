// Development-only commands.
//
// Everything in the "Development" category is picked up by the dev-commands
// module: it only runs for dev users/guilds and is registered to dev guilds.

use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Show the application command cache state.
#[poise::command(slash_command, prefix_command, category = "Development")]
pub async fn cachestatus(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let cache = &data.registry_cache;
    let gate = data.dev_commands.gate();

    let last_check = match cache.last_check().await {
        Some(at) => format!("<t:{}:R>", at.timestamp()),
        None => "never".to_string(),
    };
    let registration = data.module_context.registration.read().await.clone();

    let embed = serenity::CreateEmbed::new()
        .title("Registry cache")
        .field("Cached", if cache.is_cached() { "yes" } else { "no" }, true)
        .field("Last check", last_check, true)
        .field(
            "Max age",
            format!("{}h", cache.max_age().num_hours()),
            true,
        )
        .field("Folder", format!("`{}`", cache.folder().display()), false)
        .field(
            "Registration",
            if registration.enabled { "enabled" } else { "skipped" },
            true,
        )
        .field("Dev commands", gate.len().to_string(), true)
        .field("Dev guilds", gate.dev_guilds().len().to_string(), true)
        .color(0x5865F2);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Fail on purpose so the anticrash report path can be checked.
#[poise::command(slash_command, prefix_command, category = "Development")]
pub async fn crashtest(
    ctx: Context<'_>,
    #[description = "Message to put in the report"] message: Option<String>,
) -> Result<(), Error> {
    let message = message.unwrap_or_else(|| "Crash test".to_string());
    tracing::info!(user_id = ctx.author().id.get(), "Triggered crash test");
    Err(message.into())
}

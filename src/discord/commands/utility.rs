// General purpose commands and their component listeners.
//
// Commands stay thin: read from the modules in `Data`, format a reply.

use crate::core::interaction_events::{HaltReason, InteractionKind, InteractionListener};
use crate::discord::modules::interaction_events::{handler, Listener};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;
use std::time::Duration;

pub const PING_AGAIN_ID: &str = "ping:again";
const PING_AGAIN_COOLDOWN: Duration = Duration::from_secs(5);

fn ping_again_button() -> serenity::CreateActionRow {
    serenity::CreateActionRow::Buttons(vec![serenity::CreateButton::new(PING_AGAIN_ID)
        .label("Ping again")
        .style(serenity::ButtonStyle::Secondary)])
}

/// Check that the bot is alive.
#[poise::command(slash_command, prefix_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    let latency = ctx.ping().await;
    ctx.send(
        poise::CreateReply::default()
            .content(format!("🏓 Pong! Gateway latency: {}ms", latency.as_millis()))
            .components(vec![ping_again_button()]),
    )
    .await?;
    Ok(())
}

/// List the bot modules that are currently loaded.
#[poise::command(slash_command, prefix_command)]
pub async fn modules(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let ids = data.modules.ids().await;
    let listeners = data.interactions.listener_count().await;

    let list = if ids.is_empty() {
        "No modules loaded".to_string()
    } else {
        ids.iter()
            .map(|id| format!("• `{}`", id))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title("Loaded modules")
        .description(list)
        .field("Interaction listeners", listeners.to_string(), true)
        .color(0x5865F2);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the id of a user.
#[poise::command(context_menu_command = "User ID")]
pub async fn user_id(ctx: Context<'_>, user: serenity::User) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(format!("{} has the id `{}`", user.name, user.id))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Listeners for the components the commands above send.
pub fn listeners() -> Vec<Listener> {
    vec![InteractionListener::new(
        InteractionKind::Button,
        handler(|ctx, interaction| async move {
            let serenity::Interaction::Component(component) = interaction else {
                return Ok(());
            };

            let api = match ctx.http.get_current_user().await {
                Ok(_) => "reachable",
                Err(_) => "unreachable",
            };

            component
                .create_response(
                    &ctx,
                    serenity::CreateInteractionResponse::Message(
                        serenity::CreateInteractionResponseMessage::new()
                            .content(format!("🏓 Pong again! Discord API is {}", api))
                            .ephemeral(true),
                    ),
                )
                .await?;
            Ok::<(), Error>(())
        }),
    )
    .matching(PING_AGAIN_ID)
    .with_cooldown(PING_AGAIN_COOLDOWN)
    // Cooldown presses are dropped quietly
    .on_halt(|reason| matches!(reason, HaltReason::Cooldown { .. }).then_some(true))]
}

// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Module logic (platform-agnostic)
// - `infra/` = Implementations of core traits (cache files)
// - `discord/` = Discord-specific adapters (commands, modules, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Build the modules (dependency injection)
// 3. Set up the Discord framework and run the module lifecycle

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::config::BotConfig;
use crate::core::anticrash::CrashSource;
use crate::core::dev_commands::DevCommandGate;
use crate::core::modules::{BotModule, ModuleHost};
use crate::discord::commands::{self, presence};
use crate::discord::modules::anticrash::AnticrashModule;
use crate::discord::modules::dev_commands::{check_dev_command, DevCommandsModule};
use crate::discord::modules::interaction_events::{InteractionEventsModule, ListenerSource};
use crate::discord::modules::registration::register_application_commands;
use crate::discord::modules::registry_cache::RegistryCacheModule;
use crate::discord::modules::ModuleContext;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::InteractionCreate { interaction } = event {
        data.interactions.handle(ctx, interaction).await;
    }

    Ok(())
}

/// Command and event errors go to the anticrash reporter, everything else to
/// poise's default handler.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let name = ctx.command().qualified_name.clone();
            tracing::error!(command = %name, error = %error, "Command failed");

            ctx.data()
                .anticrash
                .report(
                    CrashSource::Command { name },
                    &error.to_string(),
                    &format!("{error:?}"),
                )
                .await;

            if let Err(e) = ctx.say("Something went wrong while running this command.").await {
                tracing::warn!("Failed to send command error reply: {}", e);
            }
        }
        poise::FrameworkError::EventHandler {
            error, framework, ..
        } => {
            tracing::error!(error = %error, "Event handler failed");
            framework
                .user_data
                .anticrash
                .report(
                    CrashSource::EventHandler,
                    &error.to_string(),
                    &format!("{error:?}"),
                )
                .await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // RUST_LOG wins, otherwise info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = BotConfig::from_env().expect("Invalid bot configuration");

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Optional collaborators are handed in at construction time.

    let dev_gate = Arc::new(DevCommandGate::new(config.dev_commands.clone()));
    let registry_cache = Arc::new(RegistryCacheModule::new(
        &config.registry_cache_folder,
        config.registry_cache_max_age_ms,
        Some(Arc::clone(&dev_gate)),
    ));
    let dev_commands = Arc::new(DevCommandsModule::new(
        Arc::clone(&dev_gate),
        Some(Arc::clone(&registry_cache)),
    ));
    let anticrash = Arc::new(AnticrashModule::new(
        config.anticrash_report_channels.clone(),
    ));
    let interactions = Arc::new(InteractionEventsModule::new(
        vec![ListenerSource {
            id: "utility",
            listeners: commands::utility::listeners,
        }],
        None,
        Some(Arc::clone(&anticrash)),
    ));

    let host: Arc<ModuleHost<ModuleContext>> = Arc::new(ModuleHost::new(vec![
        Arc::clone(&anticrash) as Arc<dyn BotModule<ModuleContext>>,
        Arc::clone(&registry_cache) as Arc<dyn BotModule<ModuleContext>>,
        Arc::clone(&dev_commands) as Arc<dyn BotModule<ModuleContext>>,
        Arc::clone(&interactions) as Arc<dyn BotModule<ModuleContext>>,
    ]));

    let registration = Arc::new(RwLock::new(config.registration.clone()));

    // Filled in by setup, read again on shutdown
    let context_slot: Arc<OnceLock<Arc<ModuleContext>>> = Arc::new(OnceLock::new());

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required for prefix commands
        | serenity::GatewayIntents::GUILDS;

    let setup_host = Arc::clone(&host);
    let setup_slot = Arc::clone(&context_slot);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.prefix.clone()),
                ..Default::default()
            },
            // Dev commands are gated here for every invocation type
            command_check: Some(|ctx| Box::pin(check_dev_command(ctx))),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!(user = %ready.user.name, "Bot is starting up");

                let module_context = Arc::new(ModuleContext::new(
                    Arc::clone(&ctx.http),
                    ready.user.id.get(),
                    registration,
                    &framework.options().commands,
                )?);
                let _ = setup_slot.set(Arc::clone(&module_context));

                let started = setup_host.start_all(&module_context).await;
                let loaded = setup_host.load_all(&module_context).await;
                tracing::info!(started, loaded, "Modules loaded");

                // The registry cache may have switched registration off by now
                if let Err(e) = register_application_commands(&module_context).await {
                    tracing::error!("Failed to register application commands: {:#}", e);
                }

                setup_host.modules_loaded(&module_context).await;
                presence::on_ready(ctx, loaded);
                tracing::info!("Bot is ready");

                Ok(Data {
                    modules: setup_host,
                    module_context,
                    registry_cache,
                    dev_commands,
                    anticrash,
                    interactions,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutting down");
        shard_manager.shutdown_all().await;
    });

    if let Err(e) = client.start().await {
        tracing::error!("Error running bot: {}", e);
    }

    if let Some(module_context) = context_slot.get() {
        host.unload_all(module_context).await;
    }
}

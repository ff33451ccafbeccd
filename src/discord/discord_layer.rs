// Discord layer - commands, module adapters and event handlers.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "modules/module_catalog.rs"]
pub mod modules;

use crate::core::modules::ModuleHost;
use modules::anticrash::AnticrashModule;
use modules::dev_commands::DevCommandsModule;
use modules::interaction_events::InteractionEventsModule;
use modules::registry_cache::RegistryCacheModule;
use modules::ModuleContext;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared state handed to every command.
pub struct Data {
    pub modules: Arc<ModuleHost<ModuleContext>>,
    pub module_context: Arc<ModuleContext>,
    pub registry_cache: Arc<RegistryCacheModule>,
    pub dev_commands: Arc<DevCommandsModule>,
    pub anticrash: Arc<AnticrashModule>,
    pub interactions: Arc<InteractionEventsModule>,
}

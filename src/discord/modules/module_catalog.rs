// Discord adapters for the core modules.
//
// Each adapter implements `BotModule<ModuleContext>` and does the
// Discord-specific half of its feature: HTTP calls, framework hooks and
// converting serenity types into core types.

pub mod anticrash;
pub mod dev_commands;
pub mod interaction_events;
pub mod registration;
pub mod registry_cache;

use crate::core::dev_commands::{CommandKey, CommandType};
use crate::core::registry_cache::{CommandDefinition, RegistrationConfig, RegistryCacheError};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Commands in this category are treated as dev commands.
pub const DEV_CATEGORY: &str = "Development";

/// An application command in both forms: the builder we send to Discord and
/// the JSON definition the registry cache fingerprints.
#[derive(Debug, Clone)]
pub struct ApplicationCommandEntry {
    pub definition: CommandDefinition,
    pub builder: serenity::CreateCommand,
}

impl ApplicationCommandEntry {
    fn from_builder(builder: serenity::CreateCommand) -> Result<Self, RegistryCacheError> {
        let definition = CommandDefinition::from_serializable(&builder)?;
        Ok(Self {
            definition,
            builder,
        })
    }
}

/// Everything a module needs from the running bot. Built once in the
/// framework setup and kept until shutdown.
pub struct ModuleContext {
    pub http: Arc<serenity::Http>,
    pub bot_user_id: u64,
    pub registration: Arc<RwLock<RegistrationConfig>>,
    pub application_commands: Vec<ApplicationCommandEntry>,
    pub dev_application_commands: Vec<ApplicationCommandEntry>,
    pub command_keys: Vec<CommandKey>,
    pub dev_command_keys: Vec<CommandKey>,
}

impl ModuleContext {
    /// Fails when a command cannot be turned into a registration payload.
    pub fn new(
        http: Arc<serenity::Http>,
        bot_user_id: u64,
        registration: Arc<RwLock<RegistrationConfig>>,
        commands: &[poise::Command<Data, Error>],
    ) -> Result<Self, RegistryCacheError> {
        let mut ctx = Self {
            http,
            bot_user_id,
            registration,
            application_commands: Vec::new(),
            dev_application_commands: Vec::new(),
            command_keys: Vec::new(),
            dev_command_keys: Vec::new(),
        };

        for command in commands {
            let is_dev = is_dev_command(command);

            let entries = application_entries(command)?;
            let keys = command_keys(command);

            if is_dev {
                ctx.dev_application_commands.extend(entries);
                ctx.dev_command_keys.extend(keys);
            } else {
                ctx.application_commands.extend(entries);
                ctx.command_keys.extend(keys);
            }
        }

        Ok(ctx)
    }
}

pub fn is_dev_command<U, E>(command: &poise::Command<U, E>) -> bool {
    command.category.as_deref() == Some(DEV_CATEGORY)
}

fn application_entries<U, E>(
    command: &poise::Command<U, E>,
) -> Result<Vec<ApplicationCommandEntry>, RegistryCacheError> {
    [
        command.create_as_slash_command(),
        command.create_as_context_menu_command(),
    ]
    .into_iter()
    .flatten()
    .map(ApplicationCommandEntry::from_builder)
    .collect()
}

/// One key per way the command can be invoked.
pub fn command_keys<U, E>(command: &poise::Command<U, E>) -> Vec<CommandKey> {
    let mut keys = Vec::new();
    if command.prefix_action.is_some() {
        keys.push(CommandKey::new(&command.name, CommandType::Prefix));
    }
    if command.slash_action.is_some() {
        keys.push(CommandKey::new(&command.name, CommandType::Slash));
    }
    if command.context_menu_action.is_some() {
        keys.push(CommandKey::new(&command.name, CommandType::ContextMenu));
    }
    keys
}

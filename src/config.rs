// Environment configuration.
//
// `main` loads `.env` through dotenv and then calls `BotConfig::from_env`.
// Parsing itself goes through a lookup closure so it can be tested without
// touching the process environment.

use crate::core::dev_commands::DevCommandsConfig;
use crate::core::registry_cache::{
    CommandKindRegistration, RegistrationConfig, DEFAULT_MAX_CACHE_AGE_MS,
};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_PREFIX: &str = "!";
pub const DEFAULT_CACHE_FOLDER: &str = "target/.cache/registry-cache";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing {0} environment variable! Create a .env file with your bot token.")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub prefix: String,
    pub registration: RegistrationConfig,
    pub registry_cache_folder: PathBuf,
    pub registry_cache_max_age_ms: u64,
    pub dev_commands: DevCommandsConfig,
    pub anticrash_report_channels: Vec<u64>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Blank values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let registration = RegistrationConfig {
            enabled: parse_bool("REGISTER_COMMANDS", get("REGISTER_COMMANDS"), true)?,
            register_to_guilds: parse_ids("REGISTER_TO_GUILDS", get("REGISTER_TO_GUILDS"))?,
            slash_commands: CommandKindRegistration {
                enabled: parse_bool(
                    "REGISTER_SLASH_COMMANDS",
                    get("REGISTER_SLASH_COMMANDS"),
                    true,
                )?,
            },
            context_menu_commands: CommandKindRegistration {
                enabled: parse_bool(
                    "REGISTER_CONTEXT_MENU_COMMANDS",
                    get("REGISTER_CONTEXT_MENU_COMMANDS"),
                    true,
                )?,
            },
        };

        let registry_cache_max_age_ms = match get("REGISTRY_CACHE_MAX_AGE_MS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "REGISTRY_CACHE_MAX_AGE_MS",
                value: raw,
            })?,
            None => DEFAULT_MAX_CACHE_AGE_MS,
        };

        let dev_guilds = match get("DEV_GUILDS") {
            Some(raw) => parse_ids("DEV_GUILDS", Some(raw))?,
            None => parse_ids("DEV_GUILD", get("DEV_GUILD"))?,
        };

        let dev_commands = DevCommandsConfig {
            allow_execute_in_dms: parse_bool("DEV_ALLOW_DMS", get("DEV_ALLOW_DMS"), true)?,
            allow_execute_in_non_dev_guild: parse_bool(
                "DEV_ALLOW_NON_DEV_GUILD",
                get("DEV_ALLOW_NON_DEV_GUILD"),
                true,
            )?,
            allow_non_dev_user_execute_in_dev_guild: parse_bool(
                "DEV_ALLOW_NON_DEV_USER_IN_DEV_GUILD",
                get("DEV_ALLOW_NON_DEV_USER_IN_DEV_GUILD"),
                true,
            )?,
            dev_guilds,
            dev_users: parse_ids("DEV_USERS", get("DEV_USERS"))?,
            ignore_commands_cache: parse_bool(
                "DEV_IGNORE_COMMANDS_CACHE",
                get("DEV_IGNORE_COMMANDS_CACHE"),
                false,
            )?,
        };

        Ok(Self {
            token,
            prefix: get("BOT_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            registration,
            registry_cache_folder: get("REGISTRY_CACHE_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FOLDER)),
            registry_cache_max_age_ms,
            dev_commands,
            anticrash_report_channels: parse_ids(
                "ANTICRASH_REPORT_CHANNELS",
                get("ANTICRASH_REPORT_CHANNELS"),
            )?,
        })
    }
}

fn parse_bool(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}

/// Snowflake lists separated by spaces and/or commas.
fn parse_ids(key: &'static str, raw: Option<String>) -> Result<Vec<u64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let mut ids = Vec::new();
    for part in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if part.is_empty() {
            continue;
        }

        match part.parse::<u64>() {
            Ok(id) if id != 0 => ids.push(id),
            _ => {
                return Err(ConfigError::Invalid {
                    key,
                    value: part.to_string(),
                })
            }
        }
    }
    Ok(ids)
}

// Registry cache domain models.
//
// These are plain data types with no Discord dependencies. The Discord layer
// converts the framework's command builders into `CommandDefinition`s before
// handing them to the core.

use super::registry_cache_store::RegistryCacheError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Application command kinds as Discord numbers them (`type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    ChatInput,
    User,
    Message,
}

impl CommandKind {
    pub fn from_api_type(value: u64) -> Option<Self> {
        match value {
            1 => Some(CommandKind::ChatInput),
            2 => Some(CommandKind::User),
            3 => Some(CommandKind::Message),
            _ => None,
        }
    }

    pub fn is_context_menu(&self) -> bool {
        matches!(self, CommandKind::User | CommandKind::Message)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::ChatInput => write!(f, "slash"),
            CommandKind::User => write!(f, "user context menu"),
            CommandKind::Message => write!(f, "message context menu"),
        }
    }
}

/// One application command as it would be sent to the registration endpoint.
///
/// `body` is the full JSON payload so every option, localization and
/// permission change ends up in the fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandDefinition {
    pub name: String,
    pub kind: CommandKind,
    pub body: Value,
}

impl CommandDefinition {
    /// Build a definition from a registration payload. A missing `type`
    /// means chat input, matching the API default.
    pub fn from_api_json(body: Value) -> Option<Self> {
        let name = body.get("name")?.as_str()?.to_string();
        let kind = match body.get("type").and_then(Value::as_u64) {
            Some(raw) => CommandKind::from_api_type(raw)?,
            None => CommandKind::ChatInput,
        };

        Some(Self { name, kind, body })
    }

    /// Serialize a command builder into a definition. Failing to serialize or
    /// producing a payload without a name or known type is an error.
    pub fn from_serializable<T: Serialize>(command: &T) -> Result<Self, RegistryCacheError> {
        let body = serde_json::to_value(command)?;
        let summary = body.to_string();
        Self::from_api_json(body).ok_or(RegistryCacheError::InvalidDefinition(summary))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandKindRegistration {
    pub enabled: bool,
}

impl Default for CommandKindRegistration {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Settings consulted by the bot's own command registration routine.
///
/// `enabled` is the flag the registry cache switches off when nothing changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationConfig {
    pub enabled: bool,
    /// Empty means register globally.
    pub register_to_guilds: Vec<u64>,
    pub slash_commands: CommandKindRegistration,
    pub context_menu_commands: CommandKindRegistration,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            register_to_guilds: Vec::new(),
            slash_commands: CommandKindRegistration::default(),
            context_menu_commands: CommandKindRegistration::default(),
        }
    }
}

impl RegistrationConfig {
    /// Whether commands of this kind take part in registration at all.
    pub fn allows(&self, kind: CommandKind) -> bool {
        if kind.is_context_menu() {
            self.context_menu_commands.enabled
        } else {
            self.slash_commands.enabled
        }
    }
}

/// Persisted summary of everything that affects command registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryFingerprint {
    pub client_id: String,
    /// Hex-encoded JSON payload.
    pub data: String,
    /// MD5 of `data`.
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_defaults_to_chat_input() {
        let def = CommandDefinition::from_api_json(json!({ "name": "ping" })).unwrap();
        assert_eq!(def.name, "ping");
        assert_eq!(def.kind, CommandKind::ChatInput);
    }

    #[test]
    fn test_definition_reads_context_menu_type() {
        let def = CommandDefinition::from_api_json(json!({ "name": "Inspect", "type": 2 })).unwrap();
        assert_eq!(def.kind, CommandKind::User);

        let def = CommandDefinition::from_api_json(json!({ "name": "Quote", "type": 3 })).unwrap();
        assert_eq!(def.kind, CommandKind::Message);
    }

    #[test]
    fn test_definition_rejects_unnamed_or_unknown_type() {
        assert!(CommandDefinition::from_api_json(json!({ "type": 1 })).is_none());
        assert!(CommandDefinition::from_api_json(json!({ "name": "x", "type": 9 })).is_none());
    }

    #[derive(Serialize)]
    struct RawCommand {
        name: Option<&'static str>,
        #[serde(rename = "type")]
        kind: u8,
    }

    #[test]
    fn test_definition_from_serializable_builder() {
        let def = CommandDefinition::from_serializable(&RawCommand {
            name: Some("Quote"),
            kind: 3,
        })
        .unwrap();
        assert_eq!(def.name, "Quote");
        assert_eq!(def.kind, CommandKind::Message);
        assert_eq!(def.body, json!({ "name": "Quote", "type": 3 }));
    }

    #[test]
    fn test_unserializable_command_is_an_error() {
        // JSON object keys must be strings
        let mut options = std::collections::HashMap::new();
        options.insert(vec![1u8], "first");

        let err = CommandDefinition::from_serializable(&options).unwrap_err();
        assert!(matches!(err, RegistryCacheError::Serialization(_)));
    }

    #[test]
    fn test_nameless_command_is_an_error() {
        let err = CommandDefinition::from_serializable(&RawCommand { name: None, kind: 1 })
            .unwrap_err();
        assert!(matches!(err, RegistryCacheError::InvalidDefinition(_)));
    }

    #[test]
    fn test_registration_allows_by_kind() {
        let config = RegistrationConfig {
            context_menu_commands: CommandKindRegistration { enabled: false },
            ..Default::default()
        };

        assert!(config.allows(CommandKind::ChatInput));
        assert!(!config.allows(CommandKind::User));
        assert!(!config.allows(CommandKind::Message));
    }

    #[test]
    fn test_fingerprint_uses_camel_case_keys() {
        let fingerprint = RegistryFingerprint {
            client_id: "42".to_string(),
            data: "7b7d".to_string(),
            hash: "abc".to_string(),
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&fingerprint).unwrap();
        assert!(value.get("clientId").is_some());
        assert!(value.get("createdAt").is_some());
    }
}

// Dev command gatekeeping.
//
// Dev commands are regular commands that should only run for allow-listed
// users and guilds. This module decides WHO may run them; the Discord layer
// plugs the decision into the framework's command check.

use dashmap::DashSet;
use std::collections::HashSet;

/// How a command was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandType {
    Prefix,
    Slash,
    ContextMenu,
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandType::Prefix => write!(f, "prefix"),
            CommandType::Slash => write!(f, "slash"),
            CommandType::ContextMenu => write!(f, "context menu"),
        }
    }
}

/// Commands are identified by name and invocation type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandKey {
    pub name: String,
    pub command_type: CommandType,
}

impl CommandKey {
    pub fn new(name: impl Into<String>, command_type: CommandType) -> Self {
        Self {
            name: name.into(),
            command_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevCommandsConfig {
    pub allow_execute_in_dms: bool,
    pub allow_execute_in_non_dev_guild: bool,
    pub allow_non_dev_user_execute_in_dev_guild: bool,
    pub dev_guilds: Vec<u64>,
    pub dev_users: Vec<u64>,
    /// Register dev commands even when the registry cache says nothing changed.
    pub ignore_commands_cache: bool,
}

impl Default for DevCommandsConfig {
    fn default() -> Self {
        Self {
            allow_execute_in_dms: true,
            allow_execute_in_non_dev_guild: true,
            allow_non_dev_user_execute_in_dev_guild: true,
            dev_guilds: Vec::new(),
            dev_users: Vec::new(),
            ignore_commands_cache: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionLocation {
    DirectMessage,
    Guild(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionScope {
    pub user_id: u64,
    pub location: ExecutionLocation,
}

pub struct DevCommandGate {
    config: DevCommandsConfig,
    commands: DashSet<CommandKey>,
}

impl DevCommandGate {
    pub fn new(config: DevCommandsConfig) -> Self {
        Self {
            config,
            commands: DashSet::new(),
        }
    }

    pub fn config(&self) -> &DevCommandsConfig {
        &self.config
    }

    pub fn dev_guilds(&self) -> &[u64] {
        &self.config.dev_guilds
    }

    pub fn is_dev_guild(&self, guild_id: u64) -> bool {
        self.config.dev_guilds.contains(&guild_id)
    }

    pub fn is_dev_user(&self, user_id: u64) -> bool {
        self.config.dev_users.contains(&user_id)
    }

    /// Returns `false` if the command was already registered.
    pub fn register(&self, key: CommandKey) -> bool {
        self.commands.insert(key)
    }

    pub fn clear(&self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn count_of(&self, command_type: CommandType) -> usize {
        self.commands
            .iter()
            .filter(|key| key.command_type == command_type)
            .count()
    }

    pub fn is_dev_command(&self, name: &str, command_type: CommandType) -> bool {
        self.commands.contains(&CommandKey::new(name, command_type))
    }

    /// Whether a dev command may run in the given scope.
    pub fn is_executable(&self, scope: &ExecutionScope) -> bool {
        let is_dev_user = self.is_dev_user(scope.user_id);

        match scope.location {
            ExecutionLocation::DirectMessage => is_dev_user && self.config.allow_execute_in_dms,
            ExecutionLocation::Guild(guild_id) => {
                match (is_dev_user, self.is_dev_guild(guild_id)) {
                    (true, true) => true,
                    (true, false) => self.config.allow_execute_in_non_dev_guild,
                    (false, true) => self.config.allow_non_dev_user_execute_in_dev_guild,
                    (false, false) => false,
                }
            }
        }
    }
}

/// Dev commands that collide with a regular command of the same name and type.
pub fn find_conflicts(regular: &[CommandKey], dev: &[CommandKey]) -> Vec<CommandKey> {
    let regular: HashSet<&CommandKey> = regular.iter().collect();
    let mut conflicts: Vec<CommandKey> = dev
        .iter()
        .filter(|key| regular.contains(key))
        .cloned()
        .collect();
    conflicts.sort();
    conflicts.dedup();
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV_USER: u64 = 10;
    const OTHER_USER: u64 = 20;
    const DEV_GUILD: u64 = 100;
    const OTHER_GUILD: u64 = 200;

    fn gate(config: DevCommandsConfig) -> DevCommandGate {
        DevCommandGate::new(DevCommandsConfig {
            dev_guilds: vec![DEV_GUILD],
            dev_users: vec![DEV_USER],
            ..config
        })
    }

    fn scope(user_id: u64, location: ExecutionLocation) -> ExecutionScope {
        ExecutionScope { user_id, location }
    }

    #[test]
    fn test_dev_command_identity_includes_type() {
        let gate = gate(DevCommandsConfig::default());
        assert!(gate.register(CommandKey::new("eval", CommandType::Prefix)));
        assert!(!gate.register(CommandKey::new("eval", CommandType::Prefix)));

        assert!(gate.is_dev_command("eval", CommandType::Prefix));
        assert!(!gate.is_dev_command("eval", CommandType::Slash));
        assert!(!gate.is_dev_command("ping", CommandType::Prefix));
        assert_eq!(gate.count_of(CommandType::Prefix), 1);
    }

    #[test]
    fn test_direct_messages() {
        let open = gate(DevCommandsConfig::default());
        assert!(open.is_executable(&scope(DEV_USER, ExecutionLocation::DirectMessage)));
        assert!(!open.is_executable(&scope(OTHER_USER, ExecutionLocation::DirectMessage)));

        let closed = gate(DevCommandsConfig {
            allow_execute_in_dms: false,
            ..Default::default()
        });
        assert!(!closed.is_executable(&scope(DEV_USER, ExecutionLocation::DirectMessage)));
    }

    #[test]
    fn test_dev_user_in_dev_guild_always_allowed() {
        let strict = gate(DevCommandsConfig {
            allow_execute_in_dms: false,
            allow_execute_in_non_dev_guild: false,
            allow_non_dev_user_execute_in_dev_guild: false,
            ..Default::default()
        });

        assert!(strict.is_executable(&scope(DEV_USER, ExecutionLocation::Guild(DEV_GUILD))));
        assert!(!strict.is_executable(&scope(DEV_USER, ExecutionLocation::Guild(OTHER_GUILD))));
        assert!(!strict.is_executable(&scope(OTHER_USER, ExecutionLocation::Guild(DEV_GUILD))));
    }

    #[test]
    fn test_guild_flags_apply_independently() {
        let gate = gate(DevCommandsConfig {
            allow_execute_in_non_dev_guild: true,
            allow_non_dev_user_execute_in_dev_guild: false,
            ..Default::default()
        });

        assert!(gate.is_executable(&scope(DEV_USER, ExecutionLocation::Guild(OTHER_GUILD))));
        assert!(!gate.is_executable(&scope(OTHER_USER, ExecutionLocation::Guild(DEV_GUILD))));
    }

    #[test]
    fn test_strangers_never_allowed() {
        let gate = gate(DevCommandsConfig::default());
        assert!(!gate.is_executable(&scope(OTHER_USER, ExecutionLocation::Guild(OTHER_GUILD))));
    }

    #[test]
    fn test_find_conflicts() {
        let regular = vec![
            CommandKey::new("ping", CommandType::Slash),
            CommandKey::new("help", CommandType::Prefix),
        ];
        let dev = vec![
            CommandKey::new("ping", CommandType::Slash),
            CommandKey::new("ping", CommandType::Prefix),
            CommandKey::new("eval", CommandType::Prefix),
        ];

        assert_eq!(
            find_conflicts(&regular, &dev),
            vec![CommandKey::new("ping", CommandType::Slash)]
        );
    }
}

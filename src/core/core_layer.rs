// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "registry_cache/mod.rs"]
pub mod registry_cache;

#[path = "dev_commands/dev_commands_service.rs"]
pub mod dev_commands;

#[path = "anticrash/anticrash_service.rs"]
pub mod anticrash;

#[path = "interaction_events/mod.rs"]
pub mod interaction_events;

#[path = "modules/module_host.rs"]
pub mod modules;

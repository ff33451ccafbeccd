// Core interaction-event module - listener matching, cooldowns and halts.

pub mod interaction_models;
pub mod interaction_service;

pub use interaction_models::*;
pub use interaction_service::*;

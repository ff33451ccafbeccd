// Discord commands module.
// Each feature gets its own command file.

pub mod dev;

pub mod utility;

// Bot presence management
pub mod presence;

use crate::discord::{Data, Error};

/// Every command the framework knows about, dev commands included.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        utility::ping(),
        utility::modules(),
        utility::user_id(),
        dev::cachestatus(),
        dev::crashtest(),
    ]
}

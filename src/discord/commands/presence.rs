// Bot presence.
//
// Discord-layer glue only: we work with Discord SDK types (Context,
// ActivityData, OnlineStatus) and keep the logic short.

use poise::serenity_prelude as serenity;

/// Text shown while the bot is running with `modules` loaded.
pub fn status_text(modules: usize) -> String {
    match modules {
        1 => "with 1 module".to_string(),
        n => format!("with {} modules", n),
    }
}

/// Called once the modules are loaded so the presence shows how many are active.
pub fn on_ready(ctx: &serenity::Context, modules: usize) {
    let activity = serenity::ActivityData::playing(status_text(modules));
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(1), "with 1 module");
        assert_eq!(status_text(4), "with 4 modules");
    }
}

use super::interaction_models::{
    HaltHandler, HaltReason, InteractionListener, InteractionSnapshot,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Members with this bit pass every permission requirement.
const ADMINISTRATOR: u64 = 1 << 3;

/// What should happen with one matching listener.
pub enum Dispatch<H> {
    Execute(Arc<InteractionListener<H>>),
    Halt {
        listener: Arc<InteractionListener<H>>,
        reason: HaltReason,
    },
}

struct ListenerSet<H> {
    module_id: String,
    listeners: Vec<Arc<InteractionListener<H>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CooldownKey {
    module_id: String,
    listener_index: usize,
    target: String,
    guild_id: Option<u64>,
    user_id: u64,
}

/// Per-listener, per-user cooldowns.
#[derive(Default)]
struct CooldownTracker {
    ends_at: DashMap<CooldownKey, Instant>,
}

impl CooldownTracker {
    fn remaining(&self, key: &CooldownKey, now: Instant) -> Option<Duration> {
        let ends_at = *self.ends_at.get(key)?;
        if ends_at > now {
            return Some(ends_at - now);
        }

        self.ends_at.remove(key);
        None
    }

    /// Drops every expired entry before inserting.
    fn start(&self, key: CooldownKey, now: Instant, ends_at: Instant) {
        self.ends_at.retain(|_, end| *end > now);
        self.ends_at.insert(key, ends_at);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.ends_at.len()
    }
}

pub struct InteractionEventService<H> {
    sets: RwLock<Vec<ListenerSet<H>>>,
    cooldowns: CooldownTracker,
    default_halt: Option<HaltHandler>,
}

impl<H: Send + Sync> InteractionEventService<H> {
    pub fn new(default_halt: Option<HaltHandler>) -> Self {
        Self {
            sets: RwLock::new(Vec::new()),
            cooldowns: CooldownTracker::default(),
            default_halt,
        }
    }

    /// Register (or replace) the listeners a module contributes.
    pub async fn register_module(
        &self,
        module_id: impl Into<String>,
        listeners: Vec<InteractionListener<H>>,
    ) {
        let module_id = module_id.into();
        let listeners = listeners.into_iter().map(Arc::new).collect();
        let mut sets = self.sets.write().await;

        match sets.iter_mut().find(|set| set.module_id == module_id) {
            Some(existing) => existing.listeners = listeners,
            None => sets.push(ListenerSet {
                module_id,
                listeners,
            }),
        }
    }

    pub async fn remove_module(&self, module_id: &str) -> bool {
        let mut sets = self.sets.write().await;
        let before = sets.len();
        sets.retain(|set| set.module_id != module_id);
        sets.len() != before
    }

    pub async fn clear(&self) {
        self.sets.write().await.clear();
    }

    pub async fn listener_count(&self) -> usize {
        self.sets
            .read()
            .await
            .iter()
            .map(|set| set.listeners.len())
            .sum()
    }

    /// Decide, in registration order, which listeners run for an interaction.
    ///
    /// Starting a cooldown happens here, so a plan must be carried out once.
    pub async fn plan(&self, snapshot: &InteractionSnapshot, now: Instant) -> Vec<Dispatch<H>> {
        let sets = self.sets.read().await;
        let mut plan = Vec::new();

        for set in sets.iter() {
            for (index, listener) in set.listeners.iter().enumerate() {
                if listener.kind != snapshot.kind || !listener.filter.matches(&snapshot.target) {
                    continue;
                }

                let member_missing = missing_permissions(
                    snapshot,
                    listener.required_member_permissions,
                    snapshot.member_permissions,
                );
                if let Some(missing) = member_missing {
                    plan.push(Dispatch::Halt {
                        listener: Arc::clone(listener),
                        reason: HaltReason::MissingMemberPermissions { missing },
                    });
                    continue;
                }

                let bot_missing = missing_permissions(
                    snapshot,
                    listener.required_bot_permissions,
                    snapshot.app_permissions,
                );
                if let Some(missing) = bot_missing {
                    plan.push(Dispatch::Halt {
                        listener: Arc::clone(listener),
                        reason: HaltReason::MissingBotPermissions { missing },
                    });
                    continue;
                }

                if let Some(cooldown) = listener.cooldown {
                    let key = CooldownKey {
                        module_id: set.module_id.clone(),
                        listener_index: index,
                        target: snapshot.target.clone(),
                        guild_id: snapshot.guild_id,
                        user_id: snapshot.user_id,
                    };

                    if let Some(remaining) = self.cooldowns.remaining(&key, now) {
                        plan.push(Dispatch::Halt {
                            listener: Arc::clone(listener),
                            reason: HaltReason::Cooldown { remaining },
                        });
                        continue;
                    }

                    self.cooldowns.start(key, now, now + cooldown);
                }

                plan.push(Dispatch::Execute(Arc::clone(listener)));
            }
        }

        plan
    }

    /// Run the listener's halt handler, falling back to the default one.
    /// Returns whether the halt counts as handled.
    ///
    /// Permission and cooldown halts of a listener without its own handler are
    /// left unhandled. Errors always reach the default.
    pub fn resolve_halt(&self, listener: &InteractionListener<H>, reason: &HaltReason) -> bool {
        let Some(halt) = listener.halt.as_ref() else {
            return matches!(reason, HaltReason::Error(_)) && self.default_resolves(reason);
        };

        match halt(reason) {
            Some(handled) => handled,
            None => self.default_resolves(reason),
        }
    }

    fn default_resolves(&self, reason: &HaltReason) -> bool {
        self.default_halt
            .as_ref()
            .and_then(|halt| halt(reason))
            .unwrap_or(false)
    }
}

/// Required bits that `have` lacks. Only checked inside guilds.
fn missing_permissions(
    snapshot: &InteractionSnapshot,
    required: Option<u64>,
    have: Option<u64>,
) -> Option<u64> {
    snapshot.guild_id?;
    let required = required?;
    let have = have?;

    if have & ADMINISTRATOR != 0 {
        return None;
    }

    let missing = required & !have;
    (missing != 0).then_some(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interaction_events::InteractionKind;

    const MANAGE_MESSAGES: u64 = 1 << 13;
    const SEND_MESSAGES: u64 = 1 << 11;

    fn snapshot(kind: InteractionKind, target: &str) -> InteractionSnapshot {
        InteractionSnapshot {
            kind,
            target: target.to_string(),
            user_id: 1,
            guild_id: Some(2),
            member_permissions: Some(SEND_MESSAGES),
            app_permissions: Some(SEND_MESSAGES),
        }
    }

    fn executed(plan: &[Dispatch<&'static str>]) -> Vec<&'static str> {
        plan.iter()
            .filter_map(|d| match d {
                Dispatch::Execute(listener) => Some(listener.handler),
                Dispatch::Halt { .. } => None,
            })
            .collect()
    }

    fn halts(plan: &[Dispatch<&'static str>]) -> Vec<HaltReason> {
        plan.iter()
            .filter_map(|d| match d {
                Dispatch::Halt { reason, .. } => Some(reason.clone()),
                Dispatch::Execute(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_matches_by_kind_and_target() {
        let service = InteractionEventService::new(None);
        service
            .register_module(
                "buttons",
                vec![
                    InteractionListener::new(InteractionKind::Button, "confirm").matching("confirm"),
                    InteractionListener::new(InteractionKind::Button, "any-button"),
                    InteractionListener::new(InteractionKind::ChatInput, "slash").matching("confirm"),
                    InteractionListener::new(InteractionKind::Button, "paged")
                        .matching_with(|id| id.starts_with("page:")),
                ],
            )
            .await;

        let plan = service
            .plan(&snapshot(InteractionKind::Button, "confirm"), Instant::now())
            .await;
        assert_eq!(executed(&plan), vec!["confirm", "any-button"]);

        let plan = service
            .plan(&snapshot(InteractionKind::Button, "page:2"), Instant::now())
            .await;
        assert_eq!(executed(&plan), vec!["any-button", "paged"]);
    }

    #[tokio::test]
    async fn test_modules_run_in_registration_order() {
        let service = InteractionEventService::new(None);
        service
            .register_module("a", vec![InteractionListener::new(InteractionKind::ModalSubmit, "a")])
            .await;
        service
            .register_module("b", vec![InteractionListener::new(InteractionKind::ModalSubmit, "b")])
            .await;

        let plan = service
            .plan(&snapshot(InteractionKind::ModalSubmit, "form"), Instant::now())
            .await;
        assert_eq!(executed(&plan), vec!["a", "b"]);

        assert!(service.remove_module("a").await);
        assert!(!service.remove_module("a").await);
        assert_eq!(service.listener_count().await, 1);
    }

    #[tokio::test]
    async fn test_missing_member_permissions_halts() {
        let service = InteractionEventService::new(None);
        service
            .register_module(
                "mod",
                vec![InteractionListener::new(InteractionKind::ChatInput, "purge")
                    .requiring_member_permissions(MANAGE_MESSAGES | SEND_MESSAGES)],
            )
            .await;

        let plan = service
            .plan(&snapshot(InteractionKind::ChatInput, "purge"), Instant::now())
            .await;
        assert_eq!(
            halts(&plan),
            vec![HaltReason::MissingMemberPermissions {
                missing: MANAGE_MESSAGES
            }]
        );

        let mut admin = snapshot(InteractionKind::ChatInput, "purge");
        admin.member_permissions = Some(ADMINISTRATOR);
        let plan = service.plan(&admin, Instant::now()).await;
        assert_eq!(executed(&plan), vec!["purge"]);

        let mut direct = snapshot(InteractionKind::ChatInput, "purge");
        direct.guild_id = None;
        direct.member_permissions = None;
        let plan = service.plan(&direct, Instant::now()).await;
        assert_eq!(executed(&plan), vec!["purge"]);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_until_expired() {
        let service = InteractionEventService::new(None);
        service
            .register_module(
                "mod",
                vec![InteractionListener::new(InteractionKind::Button, "vote")
                    .with_cooldown(Duration::from_secs(10))],
            )
            .await;

        let start = Instant::now();
        let vote = snapshot(InteractionKind::Button, "vote");

        assert_eq!(executed(&service.plan(&vote, start).await), vec!["vote"]);

        let plan = service.plan(&vote, start + Duration::from_secs(4)).await;
        assert_eq!(
            halts(&plan),
            vec![HaltReason::Cooldown {
                remaining: Duration::from_secs(6)
            }]
        );

        let mut other_user = vote.clone();
        other_user.user_id = 99;
        assert_eq!(
            executed(&service.plan(&other_user, start + Duration::from_secs(4)).await),
            vec!["vote"]
        );

        let later = start + Duration::from_secs(10);
        assert_eq!(executed(&service.plan(&vote, later).await), vec!["vote"]);
    }

    #[tokio::test]
    async fn test_expired_cooldowns_are_pruned() {
        let service = InteractionEventService::new(None);
        service
            .register_module(
                "mod",
                vec![InteractionListener::new(InteractionKind::Button, "again")
                    .with_cooldown(Duration::from_secs(5))],
            )
            .await;

        let start = Instant::now();
        let press = snapshot(InteractionKind::Button, "again");
        for user_id in 0..500 {
            let mut user = press.clone();
            user.user_id = user_id;
            service.plan(&user, start).await;
        }
        assert_eq!(service.cooldowns.len(), 500);

        let mut latecomer = press.clone();
        latecomer.user_id = 10_000;
        let plan = service
            .plan(&latecomer, start + Duration::from_secs(3600))
            .await;
        assert_eq!(executed(&plan), vec!["again"]);
        assert_eq!(service.cooldowns.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_bot_permissions_halts_before_cooldown() {
        let service = InteractionEventService::new(None);
        service
            .register_module(
                "mod",
                vec![InteractionListener::new(InteractionKind::Button, "pin")
                    .requiring_bot_permissions(MANAGE_MESSAGES)
                    .with_cooldown(Duration::from_secs(30))],
            )
            .await;

        let now = Instant::now();
        let pin = snapshot(InteractionKind::Button, "pin");
        let plan = service.plan(&pin, now).await;
        assert_eq!(
            halts(&plan),
            vec![HaltReason::MissingBotPermissions {
                missing: MANAGE_MESSAGES
            }]
        );
        assert_eq!(service.cooldowns.len(), 0);

        let mut granted = pin.clone();
        granted.app_permissions = Some(MANAGE_MESSAGES | SEND_MESSAGES);
        assert_eq!(executed(&service.plan(&granted, now).await), vec!["pin"]);

        let mut admin_bot = pin.clone();
        admin_bot.user_id = 7;
        admin_bot.app_permissions = Some(ADMINISTRATOR);
        assert_eq!(executed(&service.plan(&admin_bot, now).await), vec!["pin"]);
    }

    #[tokio::test]
    async fn test_member_permissions_are_checked_before_bot_permissions() {
        let service = InteractionEventService::new(None);
        service
            .register_module(
                "mod",
                vec![InteractionListener::new(InteractionKind::ChatInput, "ban")
                    .requiring_member_permissions(MANAGE_MESSAGES)
                    .requiring_bot_permissions(MANAGE_MESSAGES)],
            )
            .await;

        let plan = service
            .plan(&snapshot(InteractionKind::ChatInput, "ban"), Instant::now())
            .await;
        assert_eq!(
            halts(&plan),
            vec![HaltReason::MissingMemberPermissions {
                missing: MANAGE_MESSAGES
            }]
        );

        let mut direct = snapshot(InteractionKind::ChatInput, "ban");
        direct.guild_id = None;
        direct.member_permissions = None;
        direct.app_permissions = None;
        let plan = service.plan(&direct, Instant::now()).await;
        assert_eq!(executed(&plan), vec!["ban"]);
    }

    #[tokio::test]
    async fn test_halt_resolution_prefers_listener_handler() {
        let service: InteractionEventService<&'static str> =
            InteractionEventService::new(Some(Arc::new(|_: &HaltReason| Some(true))));

        let deferring = InteractionListener::new(InteractionKind::Button, "x").on_halt(|_| None);
        let refusing = InteractionListener::new(InteractionKind::Button, "y").on_halt(|_| Some(false));
        let bare = InteractionListener::new(InteractionKind::Button, "z");
        let reason = HaltReason::Error("boom".to_string());

        assert!(service.resolve_halt(&deferring, &reason));
        assert!(!service.resolve_halt(&refusing, &reason));
        assert!(service.resolve_halt(&bare, &reason));

        let no_default: InteractionEventService<&'static str> = InteractionEventService::new(None);
        assert!(!no_default.resolve_halt(&bare, &reason));
    }

    #[tokio::test]
    async fn test_default_halt_skips_listeners_without_handler_for_non_errors() {
        let service: InteractionEventService<&'static str> =
            InteractionEventService::new(Some(Arc::new(|_: &HaltReason| Some(true))));

        let bare = InteractionListener::new(InteractionKind::Button, "z");
        let deferring = InteractionListener::new(InteractionKind::Button, "x").on_halt(|_| None);
        let cooldown = HaltReason::Cooldown {
            remaining: Duration::from_secs(2),
        };
        let member = HaltReason::MissingMemberPermissions {
            missing: MANAGE_MESSAGES,
        };
        let bot = HaltReason::MissingBotPermissions {
            missing: MANAGE_MESSAGES,
        };

        for reason in [&cooldown, &member, &bot] {
            assert!(!service.resolve_halt(&bare, reason));
            assert!(service.resolve_halt(&deferring, reason));
        }
    }
}

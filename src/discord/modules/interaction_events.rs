use super::anticrash::AnticrashModule;
use super::ModuleContext;
use crate::core::anticrash::CrashSource;
use crate::core::interaction_events::{
    Dispatch, HaltHandler, HaltReason, InteractionEventService, InteractionKind,
    InteractionListener, InteractionSnapshot,
};
use crate::core::modules::{BotModule, ModuleError};
use crate::discord::Error;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub type ListenerFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;
pub type ListenerHandler =
    Arc<dyn Fn(serenity::Context, serenity::Interaction) -> ListenerFuture + Send + Sync>;
pub type Listener = InteractionListener<ListenerHandler>;

/// Wrap an async fn as a listener handler.
pub fn handler<F, Fut>(f: F) -> ListenerHandler
where
    F: Fn(serenity::Context, serenity::Interaction) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    Arc::new(move |ctx, interaction| Box::pin(f(ctx, interaction)))
}

/// A named group of listeners, registered together on load.
pub struct ListenerSource {
    pub id: &'static str,
    pub listeners: fn() -> Vec<Listener>,
}

pub struct InteractionEventsModule {
    service: InteractionEventService<ListenerHandler>,
    sources: Vec<ListenerSource>,
    anticrash: Option<Arc<AnticrashModule>>,
}

impl InteractionEventsModule {
    pub fn new(
        sources: Vec<ListenerSource>,
        default_halt: Option<HaltHandler>,
        anticrash: Option<Arc<AnticrashModule>>,
    ) -> Self {
        Self {
            service: InteractionEventService::new(default_halt),
            sources,
            anticrash,
        }
    }

    pub async fn listener_count(&self) -> usize {
        self.service.listener_count().await
    }

    /// Run every listener that applies to `interaction`.
    pub async fn handle(&self, ctx: &serenity::Context, interaction: &serenity::Interaction) {
        let Some(snapshot) = snapshot_of(interaction) else {
            return;
        };

        for dispatch in self.service.plan(&snapshot, Instant::now()).await {
            match dispatch {
                Dispatch::Execute(listener) => {
                    let result = (listener.handler)(ctx.clone(), interaction.clone()).await;
                    if let Err(e) = result {
                        self.handle_error(&snapshot, &listener, e).await;
                    }
                }
                Dispatch::Halt { listener, reason } => {
                    if !self.service.resolve_halt(&listener, &reason) {
                        tracing::debug!(
                            kind = %snapshot.kind,
                            target = %snapshot.target,
                            %reason,
                            "Interaction listener halted"
                        );
                    }
                }
            }
        }
    }

    async fn handle_error(&self, snapshot: &InteractionSnapshot, listener: &Listener, error: Error) {
        let reason = HaltReason::Error(error.to_string());
        if self.service.resolve_halt(listener, &reason) {
            return;
        }

        tracing::error!(
            kind = %snapshot.kind,
            target = %snapshot.target,
            error = %error,
            "Interaction listener failed"
        );

        if let Some(anticrash) = &self.anticrash {
            anticrash
                .report(
                    CrashSource::InteractionListener {
                        kind: snapshot.kind.to_string(),
                    },
                    &error.to_string(),
                    &format!("{error:?}"),
                )
                .await;
        }
    }
}

#[async_trait]
impl BotModule<ModuleContext> for InteractionEventsModule {
    fn id(&self) -> &'static str {
        "interaction-events"
    }

    async fn load(&self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        for source in &self.sources {
            self.service
                .register_module(source.id, (source.listeners)())
                .await;
        }

        let listeners = self.service.listener_count().await;
        tracing::info!(listeners, "Registered interaction listeners");
        Ok(())
    }

    async fn unload(&self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.service.clear().await;
        Ok(())
    }
}

/// Pull out what the dispatcher matches on. Pings and unknown kinds give `None`.
pub fn snapshot_of(interaction: &serenity::Interaction) -> Option<InteractionSnapshot> {
    let (kind, target, user, guild_id, member, app_permissions) = match interaction {
        serenity::Interaction::Command(command) => {
            let kind = if command.data.kind == serenity::CommandType::ChatInput {
                InteractionKind::ChatInput
            } else {
                InteractionKind::ContextMenu
            };
            (
                kind,
                &command.data.name,
                &command.user,
                command.guild_id,
                command.member.as_deref(),
                command.app_permissions,
            )
        }
        serenity::Interaction::Autocomplete(autocomplete) => (
            InteractionKind::Autocomplete,
            &autocomplete.data.name,
            &autocomplete.user,
            autocomplete.guild_id,
            autocomplete.member.as_deref(),
            autocomplete.app_permissions,
        ),
        serenity::Interaction::Component(component) => {
            let kind = match component.data.kind {
                serenity::ComponentInteractionDataKind::Button => InteractionKind::Button,
                _ => InteractionKind::SelectMenu,
            };
            (
                kind,
                &component.data.custom_id,
                &component.user,
                component.guild_id,
                component.member.as_ref(),
                component.app_permissions,
            )
        }
        serenity::Interaction::Modal(modal) => (
            InteractionKind::ModalSubmit,
            &modal.data.custom_id,
            &modal.user,
            modal.guild_id,
            modal.member.as_ref(),
            modal.app_permissions,
        ),
        _ => return None,
    };

    Some(InteractionSnapshot {
        kind,
        target: target.clone(),
        user_id: user.id.get(),
        guild_id: guild_id.map(|id| id.get()),
        member_permissions: member.and_then(|m| m.permissions).map(|p| p.bits()),
        app_permissions: app_permissions.map(|p| p.bits()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry_cache::RegistrationConfig;
    use crate::discord::commands;
    use tokio::sync::RwLock;

    fn context() -> ModuleContext {
        ModuleContext::new(
            Arc::new(serenity::Http::new("token")),
            42,
            Arc::new(RwLock::new(RegistrationConfig::default())),
            &[commands::utility::ping()],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_load_registers_sources_and_unload_clears() {
        let module = InteractionEventsModule::new(
            vec![ListenerSource {
                id: "utility",
                listeners: commands::utility::listeners,
            }],
            None,
            None,
        );
        let ctx = context();

        // tokio::spawn only accepts Send futures
        let loading = tokio::spawn({
            let module = Arc::new(module);
            let ctx = Arc::new(ctx);
            async move {
                module.load(&ctx).await.unwrap();
                let loaded = module.listener_count().await;
                module.unload(&ctx).await.unwrap();
                (loaded, module.listener_count().await)
            }
        });

        assert_eq!(loading.await.unwrap(), (1, 0));
    }
}

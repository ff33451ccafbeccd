// Module lifecycle.
//
// A bot module is started, loaded, told when every module has loaded, and
// finally unloaded. The host owns the ordered list and drops any module that
// declines to start or fails to load. The context type `C` is whatever the
// frontend wants to hand its modules - the core never looks inside it.

use crate::core::registry_cache::RegistryCacheError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Registry cache error: {0}")]
    RegistryCache(#[from] RegistryCacheError),

    #[error("{0}")]
    External(String),
}

#[async_trait]
pub trait BotModule<C: Send + Sync>: Send + Sync {
    fn id(&self) -> &'static str;

    /// Returning `Ok(false)` keeps the module out of the rest of the lifecycle.
    async fn start(&self, _ctx: &C) -> Result<bool, ModuleError> {
        Ok(true)
    }

    async fn load(&self, ctx: &C) -> Result<(), ModuleError>;

    /// Called once after every module has loaded.
    async fn modules_loaded(&self, _ctx: &C) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn unload(&self, _ctx: &C) -> Result<(), ModuleError> {
        Ok(())
    }
}

pub struct ModuleHost<C: Send + Sync> {
    modules: RwLock<Vec<Arc<dyn BotModule<C>>>>,
}

impl<C: Send + Sync> ModuleHost<C> {
    pub fn new(modules: Vec<Arc<dyn BotModule<C>>>) -> Self {
        Self {
            modules: RwLock::new(modules),
        }
    }

    pub async fn ids(&self) -> Vec<&'static str> {
        self.modules.read().await.iter().map(|m| m.id()).collect()
    }

    pub async fn len(&self) -> usize {
        self.modules.read().await.len()
    }

    /// Start every module in order. Returns how many are still active.
    pub async fn start_all(&self, ctx: &C) -> usize {
        let modules = self.modules.read().await.clone();
        let mut active = Vec::with_capacity(modules.len());

        for module in modules {
            match module.start(ctx).await {
                Ok(true) => active.push(module),
                Ok(false) => {
                    tracing::warn!(module = module.id(), "Module declined to start");
                }
                Err(e) => {
                    tracing::error!(module = module.id(), error = %e, "Failed to start module");
                }
            }
        }

        let count = active.len();
        *self.modules.write().await = active;
        count
    }

    /// Load every started module in order. Returns how many loaded.
    pub async fn load_all(&self, ctx: &C) -> usize {
        let modules = self.modules.read().await.clone();
        let mut loaded = Vec::with_capacity(modules.len());

        for module in modules {
            match module.load(ctx).await {
                Ok(()) => {
                    tracing::info!(module = module.id(), "Loaded module");
                    loaded.push(module);
                }
                Err(e) => {
                    tracing::error!(module = module.id(), error = %e, "Failed to load module");
                }
            }
        }

        let count = loaded.len();
        *self.modules.write().await = loaded;
        count
    }

    pub async fn modules_loaded(&self, ctx: &C) {
        let modules = self.modules.read().await.clone();
        for module in modules {
            if let Err(e) = module.modules_loaded(ctx).await {
                tracing::error!(module = module.id(), error = %e, "Module post-load hook failed");
            }
        }
    }

    /// Unload in reverse order. Unloaded modules are removed from the host.
    pub async fn unload_all(&self, ctx: &C) {
        let modules = std::mem::take(&mut *self.modules.write().await);
        for module in modules.into_iter().rev() {
            match module.unload(ctx).await {
                Ok(()) => tracing::info!(module = module.id(), "Unloaded module"),
                Err(e) => {
                    tracing::error!(module = module.id(), error = %e, "Failed to unload module")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Journal(Mutex<Vec<String>>);

    impl Journal {
        fn push(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct MockModule {
        id: &'static str,
        start_result: Option<bool>,
        fail_load: bool,
    }

    impl MockModule {
        fn ok(id: &'static str) -> Arc<dyn BotModule<Journal>> {
            Arc::new(Self {
                id,
                start_result: Some(true),
                fail_load: false,
            })
        }
    }

    #[async_trait]
    impl BotModule<Journal> for MockModule {
        fn id(&self) -> &'static str {
            self.id
        }

        async fn start(&self, ctx: &Journal) -> Result<bool, ModuleError> {
            ctx.push(format!("start {}", self.id));
            self.start_result
                .ok_or_else(|| ModuleError::External("start failed".to_string()))
        }

        async fn load(&self, ctx: &Journal) -> Result<(), ModuleError> {
            ctx.push(format!("load {}", self.id));
            if self.fail_load {
                return Err(ModuleError::External("load failed".to_string()));
            }
            Ok(())
        }

        async fn modules_loaded(&self, ctx: &Journal) -> Result<(), ModuleError> {
            ctx.push(format!("loaded {}", self.id));
            Ok(())
        }

        async fn unload(&self, ctx: &Journal) -> Result<(), ModuleError> {
            ctx.push(format!("unload {}", self.id));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle_order() {
        let journal = Journal::default();
        let host = ModuleHost::new(vec![MockModule::ok("a"), MockModule::ok("b")]);

        assert_eq!(host.start_all(&journal).await, 2);
        assert_eq!(host.load_all(&journal).await, 2);
        host.modules_loaded(&journal).await;
        host.unload_all(&journal).await;

        assert_eq!(
            journal.entries(),
            vec![
                "start a", "start b", "load a", "load b", "loaded a", "loaded b", "unload b",
                "unload a"
            ]
        );
        assert_eq!(host.len().await, 0);
    }

    #[tokio::test]
    async fn test_declined_and_failed_modules_are_dropped() {
        let journal = Journal::default();
        let host = ModuleHost::new(vec![
            Arc::new(MockModule {
                id: "declines",
                start_result: Some(false),
                fail_load: false,
            }),
            Arc::new(MockModule {
                id: "errors",
                start_result: None,
                fail_load: false,
            }),
            Arc::new(MockModule {
                id: "bad-load",
                start_result: Some(true),
                fail_load: true,
            }),
            MockModule::ok("good"),
        ]);

        assert_eq!(host.start_all(&journal).await, 2);
        assert_eq!(host.load_all(&journal).await, 1);
        assert_eq!(host.ids().await, vec!["good"]);

        host.modules_loaded(&journal).await;
        assert!(!journal.entries().contains(&"loaded bad-load".to_string()));
    }
}

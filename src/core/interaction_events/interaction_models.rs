// Interaction listener models.
//
// Listeners are generic over their handler type so the core never needs to
// know what a Discord interaction looks like. The Discord layer fills `H`
// with an async callback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Autocomplete,
    ChatInput,
    ContextMenu,
    Button,
    ModalSubmit,
    SelectMenu,
}

impl InteractionKind {
    /// Command interactions match on the command name, components on the custom id.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            InteractionKind::Autocomplete | InteractionKind::ChatInput | InteractionKind::ContextMenu
        )
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InteractionKind::Autocomplete => "Autocomplete",
            InteractionKind::ChatInput => "ChatInput",
            InteractionKind::ContextMenu => "ContextMenu",
            InteractionKind::Button => "Button",
            InteractionKind::ModalSubmit => "ModalSubmit",
            InteractionKind::SelectMenu => "SelectMenu",
        };
        write!(f, "{}", name)
    }
}

/// The parts of an incoming interaction the dispatcher looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionSnapshot {
    pub kind: InteractionKind,
    /// Command name or component custom id.
    pub target: String,
    pub user_id: u64,
    pub guild_id: Option<u64>,
    /// Resolved permission bits of the invoking member, guild only.
    pub member_permissions: Option<u64>,
    /// The bot's own permission bits in the channel the interaction came from.
    pub app_permissions: Option<u64>,
}

#[derive(Clone)]
pub enum ListenerFilter {
    Any,
    Exact(String),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl ListenerFilter {
    pub fn matches(&self, target: &str) -> bool {
        match self {
            ListenerFilter::Any => true,
            ListenerFilter::Exact(expected) => expected == target,
            ListenerFilter::Predicate(predicate) => predicate(target),
        }
    }
}

impl fmt::Debug for ListenerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerFilter::Any => write!(f, "Any"),
            ListenerFilter::Exact(id) => write!(f, "Exact({:?})", id),
            ListenerFilter::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// Why a listener did not run (or failed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    MissingMemberPermissions { missing: u64 },
    MissingBotPermissions { missing: u64 },
    Cooldown { remaining: Duration },
    Error(String),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::MissingMemberPermissions { missing } => {
                write!(f, "missing member permissions ({:#x})", missing)
            }
            HaltReason::MissingBotPermissions { missing } => {
                write!(f, "missing bot permissions ({:#x})", missing)
            }
            HaltReason::Cooldown { remaining } => {
                write!(f, "on cooldown for {:.1}s", remaining.as_secs_f64())
            }
            HaltReason::Error(message) => write!(f, "listener error: {}", message),
        }
    }
}

/// Returns `Some(true)` when the halt was handled, `None` to defer to the default.
/// The default only sees permission and cooldown halts for listeners that set
/// their own handler.
pub type HaltHandler = Arc<dyn Fn(&HaltReason) -> Option<bool> + Send + Sync>;

pub struct InteractionListener<H> {
    pub kind: InteractionKind,
    pub filter: ListenerFilter,
    pub cooldown: Option<Duration>,
    pub required_member_permissions: Option<u64>,
    pub required_bot_permissions: Option<u64>,
    pub handler: H,
    pub halt: Option<HaltHandler>,
}

impl<H> InteractionListener<H> {
    pub fn new(kind: InteractionKind, handler: H) -> Self {
        Self {
            kind,
            filter: ListenerFilter::Any,
            cooldown: None,
            required_member_permissions: None,
            required_bot_permissions: None,
            handler,
            halt: None,
        }
    }

    pub fn matching(mut self, target: impl Into<String>) -> Self {
        self.filter = ListenerFilter::Exact(target.into());
        self
    }

    pub fn matching_with(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.filter = ListenerFilter::Predicate(Arc::new(predicate));
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn requiring_member_permissions(mut self, bits: u64) -> Self {
        self.required_member_permissions = Some(bits);
        self
    }

    pub fn requiring_bot_permissions(mut self, bits: u64) -> Self {
        self.required_bot_permissions = Some(bits);
        self
    }

    pub fn on_halt(mut self, halt: impl Fn(&HaltReason) -> Option<bool> + Send + Sync + 'static) -> Self {
        self.halt = Some(Arc::new(halt));
        self
    }
}

impl<H> fmt::Debug for InteractionListener<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionListener")
            .field("kind", &self.kind)
            .field("filter", &self.filter)
            .field("cooldown", &self.cooldown)
            .field("required_member_permissions", &self.required_member_permissions)
            .field("required_bot_permissions", &self.required_bot_permissions)
            .finish_non_exhaustive()
    }
}

pub mod config;
pub mod error;
pub mod event;
pub mod event_registry;

// Re-exports
pub use config::BusConfig;
pub use error::*;
pub use event::event_bus::{EventBus, EventBusBuilder};
pub use event::invoker::{Invoker, InvokerKind};
pub use event::listener::{Accept, Labeled, Listener, ListenerId, ListenerResult, SharedListener};
pub use event_registry::{EventKey, EventRegistry};

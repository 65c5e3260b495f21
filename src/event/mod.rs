//! # Ordered Event Dispatch
//!
//! An event is a point where extensions can override a decision of the host
//! application. Each event owns an [`EventBus`](event_bus::EventBus); every
//! extension registers a listener on it, and the host dispatches a payload
//! whenever the decision is needed.
//!
//! ## Dispatch Flow
//!
//! ```text
//! ┌────────┐   ┌──────────┐   ┌──────────┐         ┌──────────┐
//! │Payload │──▶│Listener 1│──▶│Listener 2│──▶ ... ─▶│ Default  │
//! └────────┘   └────┬─────┘   └────┬─────┘         └──────────┘
//!                   │ accepted     │ accepted
//!                   ▼              ▼
//!                 Result         Result
//! ```
//!
//! 1. Listeners run in registration order
//! 2. The first result passing the acceptance predicate is returned
//! 3. If nobody accepts, the default result is returned
//!
//! ## Example
//!
//! ```rust
//! use relay_bus::{Accept, EventBus, EventRegistry, ListenerResult};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = EventRegistry::new();
//! let bus = registry.register_bus(
//!     "client:greeting",
//!     EventBus::<String, String>::builder()
//!         .default_result(|| "hello".to_string())
//!         .accept(Accept::not_equal(String::new()))
//!         .build()?,
//! )?;
//!
//! bus.register(|name: &String| -> ListenerResult<String> {
//!     Ok(if name == "ferris" { "hi crab".to_string() } else { String::new() })
//! })?;
//!
//! assert_eq!(bus.invoke(&"ferris".to_string())?, "hi crab");
//! assert_eq!(bus.invoke(&"alice".to_string())?, "hello");
//! # Ok(())
//! # }
//! ```

pub mod event_bus;
pub mod invoker;
pub mod listener;

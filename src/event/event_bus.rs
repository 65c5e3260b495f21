//! # Event Bus Implementation
//!
//! The EventBus is an ordered, short-circuiting dispatcher: listeners are
//! invoked in registration order and the first result accepted by the
//! acceptance predicate wins. When nobody accepts, the bus falls back to a
//! default result.
//!
//! ## Design Decisions
//!
//! - **Cached invoker**: registering a listener only appends and marks the
//!   cached [`Invoker`] stale. The next dispatch compiles a new invoker from an
//!   immutable snapshot of the list, so one invoker is built per modification
//!   epoch no matter how many dispatches follow.
//! - **Lock-free dispatch**: a dispatch clones the current `Arc<Invoker>` under
//!   a short read lock and runs listeners with no lock held. Dispatches never
//!   block each other, and listeners may register further listeners without
//!   deadlocking; those only take part in later dispatches.
//! - **Explicit failures**: a listener error aborts the dispatch with
//!   [`EventError::ListenerFailure`]; later listeners are skipped.

use std::{
    fmt,
    marker::PhantomData,
    sync::{Arc, OnceLock},
};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::{
    config::BusConfig,
    event::{
        invoker::Invoker,
        listener::{Accept, Listener, ListenerId, SharedListener},
    },
    EventError, EventResult,
};

type DefaultFactory<R> = Arc<dyn Fn() -> R + Send + Sync>;

/// `result != default_result()`, with the sentinel taken from the factory on
/// the first comparison rather than at construction.
fn not_default<R>(factory: &DefaultFactory<R>) -> Accept<R>
where
    R: PartialEq + Send + Sync + 'static,
{
    let factory = factory.clone();
    let sentinel = OnceLock::new();
    Accept::new(move |result: &R| result != sentinel.get_or_init(|| factory()))
}

struct State<P, R> {
    listeners: Vec<SharedListener<P, R>>,
    /// `None` once a registration has made the cached invoker stale
    invoker: Option<Arc<Invoker<P, R>>>,
    epoch: u64,
}

/// # EventBus
///
/// Holds the listeners of one event and dispatches payloads of type `P` to
/// them, producing a single result of type `R`.
///
/// ## Example
///
/// ```rust
/// use relay_bus::{EventBus, ListenerResult};
///
/// let bus: EventBus<u32, String> = EventBus::new();
/// bus.register(|n: &u32| -> ListenerResult<String> {
///     Ok(if n % 2 == 0 { "even".to_string() } else { String::new() })
/// })
/// .unwrap();
///
/// assert_eq!(bus.invoke(&4).unwrap(), "even");
/// assert_eq!(bus.invoke(&3).unwrap(), "");
/// ```
pub struct EventBus<P, R> {
    state: RwLock<State<P, R>>,
    default_result: DefaultFactory<R>,
    accept: Accept<R>,
    config: BusConfig,
}

impl<P, R> EventBus<P, R>
where
    R: PartialEq + Send + Sync + 'static,
{
    /// Creates a bus whose fallback is produced by `default_result`.
    ///
    /// Construction does not call the factory. The first [`EventBus::invoke`]
    /// calls it once to obtain the sentinel for the bus-level acceptance
    /// predicate (`result != sentinel`); after that it runs only when a
    /// dispatch finds no accepting listener.
    pub fn create(default_result: impl Fn() -> R + Send + Sync + 'static) -> Self {
        let factory: DefaultFactory<R> = Arc::new(default_result);
        let accept = not_default(&factory);
        Self::from_parts(factory, accept, BusConfig::default())
    }

    pub fn builder() -> EventBusBuilder<P, R> {
        EventBusBuilder::new()
    }
}

impl<P, R> EventBus<P, R>
where
    R: Default + PartialEq + Send + Sync + 'static,
{
    /// Creates a bus using `R::default()` as both fallback and sentinel.
    pub fn new() -> Self {
        Self::create(R::default)
    }
}

impl<P, R> Default for EventBus<P, R>
where
    R: Default + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> EventBus<P, R> {
    /// Creates a bus with an explicit bus-level acceptance predicate. Unlike
    /// [`EventBus::create`], `R` needs no `PartialEq`.
    pub fn with_accept(
        default_result: impl Fn() -> R + Send + Sync + 'static,
        accept: Accept<R>,
        config: BusConfig,
    ) -> Self {
        Self::from_parts(Arc::new(default_result), accept, config)
    }

    fn from_parts(default_result: DefaultFactory<R>, accept: Accept<R>, config: BusConfig) -> Self {
        Self {
            state: RwLock::new(State {
                listeners: Vec::with_capacity(config.initial_capacity),
                invoker: None,
                epoch: 0,
            }),
            default_result,
            accept,
            config,
        }
    }

    /// Appends `listener` to the end of the dispatch order.
    ///
    /// Returns the listener's 1-based position.
    pub fn register<L>(&self, listener: L) -> EventResult<ListenerId>
    where
        L: Listener<P, R> + 'static,
    {
        self.try_register(Some(Arc::new(listener)))
    }

    /// Registers an already shared listener, which may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidArgument`] if `listener` is `None`; the bus
    /// is left unchanged.
    pub fn try_register(&self, listener: Option<SharedListener<P, R>>) -> EventResult<ListenerId> {
        let listener = listener.ok_or_else(|| {
            EventError::invalid_argument(format!(
                "{}: cannot register an absent listener",
                self.label()
            ))
        })?;

        let mut state = self.state.write();
        state.listeners.push(listener);
        state.invoker = None;
        state.epoch += 1;
        let id = state.listeners.len();
        debug!(
            "{}: registered listener {} (epoch {})",
            self.label(),
            id,
            state.epoch
        );
        Ok(id)
    }

    /// Dispatches `payload` to the listeners in registration order.
    ///
    /// Returns the first result for which `accept` is true, or `default` if
    /// no listener accepts. Listeners after the accepting one are not called.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ListenerFailure`] as soon as a listener fails; no
    /// partial result is returned and the remaining listeners are skipped.
    pub fn dispatch(
        &self,
        payload: &P,
        default: R,
        accept: impl Fn(&R) -> bool,
    ) -> EventResult<R> {
        let accepted = self.current_invoker().invoke(payload, &accept)?;
        Ok(match accepted {
            Some(result) => result,
            None => {
                trace!("{}: no listener accepted, using default", self.label());
                default
            }
        })
    }

    /// Like [`EventBus::dispatch`], with the fallback built by the bus's
    /// default factory only when no listener accepts.
    pub fn dispatch_with(&self, payload: &P, accept: impl Fn(&R) -> bool) -> EventResult<R> {
        let accepted = self.current_invoker().invoke(payload, &accept)?;
        Ok(match accepted {
            Some(result) => result,
            None => {
                trace!("{}: no listener accepted, using default", self.label());
                (self.default_result)()
            }
        })
    }

    /// Dispatches with the bus-level acceptance predicate and default factory.
    pub fn invoke(&self, payload: &P) -> EventResult<R> {
        let accept = &self.accept;
        self.dispatch_with(payload, |r| accept.test(r))
    }

    /// Returns the compiled invoker for the current listener list, building
    /// it if a registration made the cached one stale.
    pub fn invoker(&self) -> Arc<Invoker<P, R>> {
        self.current_invoker()
    }

    fn current_invoker(&self) -> Arc<Invoker<P, R>> {
        let cached = self.state.read().invoker.clone();
        if let Some(invoker) = cached {
            return invoker;
        }

        let mut state = self.state.write();
        // another dispatch may have rebuilt it while we waited for the lock
        if let Some(invoker) = &state.invoker {
            return invoker.clone();
        }
        let snapshot: Arc<[SharedListener<P, R>]> = state.listeners.iter().cloned().collect();
        let invoker = Arc::new(Invoker::new(snapshot, &self.config));
        debug!(
            "{}: built {} invoker for {} listeners (epoch {})",
            self.label(),
            invoker.kind(),
            invoker.len(),
            state.epoch
        );
        state.invoker = Some(invoker.clone());
        invoker
    }

    pub fn len(&self) -> usize {
        self.state.read().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().listeners.is_empty()
    }

    /// Number of registrations so far; each one starts a new epoch.
    pub fn epoch(&self) -> u64 {
        self.state.read().epoch
    }

    pub fn label(&self) -> &str {
        self.config.label()
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

impl<P, R> fmt::Debug for EventBus<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("EventBus")
            .field("label", &self.label())
            .field("listeners", &state.listeners.len())
            .field("epoch", &state.epoch)
            .field("cached", &state.invoker.is_some())
            .finish()
    }
}

pub struct EventBusBuilder<P, R> {
    default_result: Option<DefaultFactory<R>>,
    accept: Option<Accept<R>>,
    config: BusConfig,
    _payload: PhantomData<fn(&P)>,
}

impl<P, R> EventBusBuilder<P, R>
where
    R: PartialEq + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            default_result: None,
            accept: None,
            config: BusConfig::default(),
            _payload: PhantomData,
        }
    }

    pub fn default_result(mut self, factory: impl Fn() -> R + Send + Sync + 'static) -> Self {
        self.default_result = Some(Arc::new(factory));
        self
    }

    /// Bus-level acceptance predicate used by [`EventBus::invoke`]. Defaults
    /// to "not equal to the default result".
    pub fn accept(mut self, accept: Accept<R>) -> Self {
        self.accept = Some(accept);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// # Errors
    ///
    /// Returns [`EventError::InvalidArgument`] if no default result factory was
    /// set; use [`EventBusBuilder::build_default`] for `R: Default`.
    pub fn build(self) -> EventResult<EventBus<P, R>> {
        let factory = self.default_result.ok_or_else(|| {
            EventError::invalid_argument("default_result is required to build an event bus")
        })?;
        Ok(Self::assemble(factory, self.accept, self.config))
    }

    fn assemble(
        factory: DefaultFactory<R>,
        accept: Option<Accept<R>>,
        config: BusConfig,
    ) -> EventBus<P, R> {
        let accept = accept.unwrap_or_else(|| not_default(&factory));
        EventBus::from_parts(factory, accept, config)
    }
}

impl<P, R> EventBusBuilder<P, R>
where
    R: Default + PartialEq + Send + Sync + 'static,
{
    /// Builds the bus, falling back to `R::default` when no default result
    /// factory was set.
    pub fn build_default(self) -> EventBus<P, R> {
        let factory = self
            .default_result
            .unwrap_or_else(|| Arc::new(R::default) as DefaultFactory<R>);
        Self::assemble(factory, self.accept, self.config)
    }
}

impl<P, R> Default for EventBusBuilder<P, R>
where
    R: PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

use dashmap::{mapref::entry::Entry, DashMap};
use std::{
    any::{type_name, Any},
    fmt,
    sync::Arc,
};
use tracing::debug;

use crate::{event::event_bus::EventBus, EventError, EventResult};

/// Name of an event, e.g. `client:pick_block_gather`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey(String);

impl EventKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self(format!("{}:{}", namespace, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part before the first `:`, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once(':').map(|(namespace, _)| namespace)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EventKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

struct RegisteredBus {
    bus: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl RegisteredBus {
    fn new<P: 'static, R: 'static>(bus: Arc<EventBus<P, R>>) -> Self {
        Self {
            bus,
            type_name: type_name::<EventBus<P, R>>(),
        }
    }

    fn downcast<P: 'static, R: 'static>(&self, key: &EventKey) -> EventResult<Arc<EventBus<P, R>>> {
        self.bus
            .clone()
            .downcast::<EventBus<P, R>>()
            .map_err(|_| EventError::TypeMismatch {
                event_key: key.to_string(),
                expected: type_name::<EventBus<P, R>>().to_string(),
                got: self.type_name.to_string(),
            })
    }
}

/// イベントレジストリ
///
/// Owned by the application and passed to whatever needs to register or
/// dispatch; maps each event key to the bus for that event. Buses of
/// different payload and result types live side by side, and lookups check
/// the requested types.
#[derive(Default)]
pub struct EventRegistry {
    buses: DashMap<EventKey, RegisteredBus>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `bus` under `key` and returns the shared handle.
    pub fn register_bus<P: 'static, R: 'static>(
        &self,
        key: impl Into<EventKey>,
        bus: EventBus<P, R>,
    ) -> EventResult<Arc<EventBus<P, R>>> {
        let key = key.into();
        match self.buses.entry(key.clone()) {
            Entry::Occupied(_) => Err(EventError::AlreadyRegistered {
                event_key: key.to_string(),
            }),
            Entry::Vacant(entry) => {
                let bus = Arc::new(bus);
                entry.insert(RegisteredBus::new(bus.clone()));
                debug!("Registered event bus {} ({})", key, type_name::<EventBus<P, R>>());
                Ok(bus)
            }
        }
    }

    /// Looks up the bus for `key`.
    pub fn bus<P: 'static, R: 'static>(
        &self,
        key: impl Into<EventKey>,
    ) -> EventResult<Arc<EventBus<P, R>>> {
        let key = key.into();
        let entry = self
            .buses
            .get(&key)
            .ok_or_else(|| EventError::NotFound(key.to_string()))?;
        entry.downcast(&key)
    }

    /// Looks up the bus for `key`, creating it with `factory` if missing.
    ///
    /// `factory` runs while the key's shard is locked and must not call back
    /// into the registry.
    pub fn get_or_create<P: 'static, R: 'static>(
        &self,
        key: impl Into<EventKey>,
        factory: impl FnOnce() -> EventBus<P, R>,
    ) -> EventResult<Arc<EventBus<P, R>>> {
        let key = key.into();
        let entry = self.buses.entry(key.clone()).or_insert_with(|| {
            debug!("Creating event bus {}", key);
            RegisteredBus::new(Arc::new(factory()))
        });
        entry.downcast(&key)
    }

    pub fn contains(&self, key: impl Into<EventKey>) -> bool {
        self.buses.contains_key(&key.into())
    }

    /// Removes the bus for `key` from the registry. Handles already handed out
    /// stay usable.
    pub fn remove(&self, key: impl Into<EventKey>) -> bool {
        let key = key.into();
        let removed = self.buses.remove(&key).is_some();
        if removed {
            debug!("Removed event bus {}", key);
        }
        removed
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<EventKey> {
        let mut keys: Vec<EventKey> = self.buses.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }
}

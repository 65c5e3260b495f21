//! # Compiled invoker
//!
//! An [`Invoker`] is the dispatch function the bus builds from one snapshot
//! of its listener list. It is immutable: registering a listener makes the bus
//! build a new invoker, while dispatches already holding the old one keep
//! running against the old snapshot.
//!
//! The invoker is specialised on the number of listeners:
//!
//! - **Empty**: no listener is ever called, the caller falls back to its default
//! - **Single**: one direct call, no iteration
//! - **Chain**: in-order iteration over a shared slice, stopping at the first
//!   accepted result

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{trace, warn};

use crate::{
    config::BusConfig, event::listener::SharedListener, EventError, EventResult, ListenerPanic,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum InvokerKind {
    Empty,
    Single,
    Chain,
}

pub struct Invoker<P, R> {
    kind: InvokerKind,
    listeners: Arc<[SharedListener<P, R>]>,
    bus_label: String,
    slow_listener_threshold: Option<Duration>,
    catch_panics: bool,
}

impl<P, R> Invoker<P, R> {
    pub fn new(listeners: Arc<[SharedListener<P, R>]>, config: &BusConfig) -> Self {
        let kind = match listeners.len() {
            0 => InvokerKind::Empty,
            1 => InvokerKind::Single,
            _ => InvokerKind::Chain,
        };
        Self {
            kind,
            listeners,
            bus_label: config.label().to_string(),
            slow_listener_threshold: config.slow_listener_threshold,
            catch_panics: config.catch_panics,
        }
    }

    pub fn kind(&self) -> InvokerKind {
        self.kind
    }

    /// Number of listeners in the snapshot this invoker was built from.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Runs the snapshot against `payload`.
    ///
    /// Returns `Ok(Some(result))` for the first result `accept` returns true
    /// for, `Ok(None)` if no listener accepted. A failing listener stops the
    /// chain and its error is returned.
    pub fn invoke(&self, payload: &P, accept: &dyn Fn(&R) -> bool) -> EventResult<Option<R>> {
        match self.kind {
            InvokerKind::Empty => Ok(None),
            InvokerKind::Single => {
                let candidate = self.call(0, payload)?;
                Ok(accept(&candidate).then_some(candidate))
            }
            InvokerKind::Chain => {
                for index in 0..self.listeners.len() {
                    let candidate = self.call(index, payload)?;
                    if accept(&candidate) {
                        trace!("{}: listener {} accepted", self.bus_label, index + 1);
                        return Ok(Some(candidate));
                    }
                }
                Ok(None)
            }
        }
    }

    fn call(&self, index: usize, payload: &P) -> EventResult<R> {
        let listener = &self.listeners[index];
        let position = index + 1;
        let started = self.slow_listener_threshold.map(|_| Instant::now());

        let outcome = if self.catch_panics {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(payload))) {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    let label = self.label_of(index);
                    warn!("{}: listener {} panicked: {}", self.bus_label, label, message);
                    return Err(EventError::ListenerFailure {
                        position,
                        label,
                        source: Box::new(ListenerPanic { message }),
                    });
                }
            }
        } else {
            listener.on_event(payload)
        };

        if let (Some(threshold), Some(started)) = (self.slow_listener_threshold, started) {
            let elapsed = started.elapsed();
            if elapsed > threshold {
                warn!(
                    "{}: listener {} took {:?} (threshold {:?})",
                    self.bus_label,
                    self.label_of(index),
                    elapsed,
                    threshold
                );
            }
        }

        outcome.map_err(|source| {
            let label = self.label_of(index);
            warn!("{}: listener {} failed: {}", self.bus_label, label, source);
            EventError::ListenerFailure {
                position,
                label,
                source,
            }
        })
    }

    fn label_of(&self, index: usize) -> String {
        match self.listeners[index].label() {
            Some(label) => label.to_string(),
            None => format!("{}#{}", self.bus_label, index + 1),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

use std::{fmt, sync::Arc};

use crate::ListenerError;

pub type ListenerResult<R> = Result<R, ListenerError>;

/// 1-based registration position of a listener on its bus.
pub type ListenerId = usize;

/// A handler taking part in dispatch.
///
/// Any `Fn(&P) -> ListenerResult<R>` closure is a listener. Listeners run
/// synchronously on the dispatching thread; one that blocks holds up the
/// whole dispatch.
pub trait Listener<P, R>: Send + Sync {
    fn on_event(&self, payload: &P) -> ListenerResult<R>;

    /// Name used in logs and in `ListenerFailure` errors.
    fn label(&self) -> Option<&str> {
        None
    }
}

impl<P, R, F> Listener<P, R> for F
where
    F: Fn(&P) -> ListenerResult<R> + Send + Sync,
{
    fn on_event(&self, payload: &P) -> ListenerResult<R> {
        self(payload)
    }
}

pub type SharedListener<P, R> = Arc<dyn Listener<P, R>>;

/// Wraps a listener with a fixed label.
pub struct Labeled<L> {
    label: String,
    inner: L,
}

impl<L> Labeled<L> {
    pub fn new(label: impl Into<String>, inner: L) -> Self {
        Self {
            label: label.into(),
            inner,
        }
    }
}

impl<P, R, L> Listener<P, R> for Labeled<L>
where
    L: Listener<P, R>,
{
    fn on_event(&self, payload: &P) -> ListenerResult<R> {
        self.inner.on_event(payload)
    }

    fn label(&self) -> Option<&str> {
        Some(&self.label)
    }
}

/// Acceptance predicate deciding whether a listener result ends the dispatch.
pub struct Accept<R> {
    predicate: Arc<dyn Fn(&R) -> bool + Send + Sync>,
}

impl<R> Accept<R> {
    pub fn new(predicate: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Accepts every result, so the first listener always wins.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// Accepts nothing; every listener runs and the default is returned.
    pub fn never() -> Self {
        Self::new(|_| false)
    }

    /// Accepts only results that pass both predicates.
    pub fn and(self, other: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self
    where
        R: 'static,
    {
        let first = self.predicate;
        Self::new(move |r| first(r) && other(r))
    }

    pub fn test(&self, result: &R) -> bool {
        (self.predicate)(result)
    }
}

impl<R> Accept<R>
where
    R: PartialEq + Send + Sync + 'static,
{
    /// Accepts anything that is not equal to `sentinel`.
    pub fn not_equal(sentinel: R) -> Self {
        Self::new(move |r| *r != sentinel)
    }
}

impl<R> Clone for Accept<R> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
        }
    }
}

impl<R> fmt::Debug for Accept<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accept").finish_non_exhaustive()
    }
}

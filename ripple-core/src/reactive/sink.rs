//! Sinks and subscriptions.
//!
//! A sink is the external consumer at the end of a propagation path: the
//! renderer's text node, style binding, list container, and so on. The core
//! only calls into sinks; it never inspects them.
//!
//! Registrations are explicit. [`Subscription`] turns a registration into a
//! guard so that teardown follows scope instead of caller discipline, and
//! [`Scope`] groups the subscriptions owned by one rendered collection
//! element so that removing the element releases everything it captured.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::error;

use crate::error::Result;
use crate::graph::{downcast, ErasedRangeSink, ErasedSink, Payload, ValueNode};

/// Consumer of a scalar value.
///
/// `update` is called exactly once per propagation pass that reaches the
/// sink, including passes that deliver a value equal to the previous one.
pub trait Sink<T> {
    fn update(&mut self, value: &T);
}

impl<T, F> Sink<T> for F
where
    F: FnMut(&T),
{
    fn update(&mut self, value: &T) {
        self(value)
    }
}

/// Consumer of an ordered collection.
///
/// The sink tracks a contiguous range that mirrors the collection. Elements
/// only ever arrive at the tail.
pub trait RangeSink<T> {
    /// `elem` was appended. Subscriptions created while materializing it
    /// belong in `scope`; they are released when the element is removed.
    fn on_insert(&mut self, elem: &T, scope: &mut Scope);

    /// `[start, start + count)` was removed. The scopes of the removed
    /// elements have already been released.
    fn on_remove(&mut self, start: usize, count: usize);
}

/// A live registration that is released when dropped.
///
/// Dropping a `Subscription` unregisters it; a release failure at that point
/// is logged at `error` level. Call [`Subscription::unsubscribe`] to observe
/// the result instead.
#[must_use = "dropping a Subscription unregisters it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() -> Result<()>>>,
}

impl Subscription {
    pub(crate) fn new<F>(release: F) -> Self
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release the registration now.
    pub fn unsubscribe(mut self) -> Result<()> {
        self.release_now()
    }

    /// Whether the registration is still held.
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn release_now(&mut self) -> Result<()> {
        match self.release.take() {
            Some(release) => release(),
            None => Ok(()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Err(err) = self.release_now() {
            error!(%err, "failed to release subscription on drop");
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The subscriptions owned by one rendered collection element.
#[derive(Debug, Default)]
pub struct Scope {
    subscriptions: Vec<Subscription>,
}

impl Scope {
    /// Keep `subscription` alive for as long as the element exists.
    pub fn hold(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every held subscription, in registration order.
    ///
    /// All subscriptions are released even if one fails; the first failure
    /// is returned.
    pub fn release(self) -> Result<()> {
        let mut outcome = Ok(());
        for subscription in self.subscriptions {
            let result = subscription.unsubscribe();
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }
}

/// Wrap a typed sink as a value node.
pub(crate) fn sink_node<T, S>(mut sink: S) -> ValueNode
where
    T: 'static,
    S: Sink<T> + 'static,
{
    let erased: ErasedSink = Rc::new(RefCell::new(move |payload: &Payload| {
        sink.update(downcast::<T>(payload))
    }));
    ValueNode::Sink(erased)
}

/// Typed range sink behind the erased interface.
pub(crate) struct RangeSinkAdapter<T, S> {
    sink: S,
    _marker: PhantomData<fn(&T)>,
}

impl<T, S> RangeSinkAdapter<T, S> {
    pub(crate) fn new(sink: S) -> Self {
        Self {
            sink,
            _marker: PhantomData,
        }
    }
}

impl<T, S> ErasedRangeSink for RangeSinkAdapter<T, S>
where
    T: 'static,
    S: RangeSink<T>,
{
    fn insert(&mut self, elem: &Payload, scope: &mut Scope) {
        self.sink.on_insert(downcast::<T>(elem), scope)
    }

    fn remove(&mut self, start: usize, count: usize) {
        self.sink.on_remove(start, count)
    }
}

//! Scalar Registration API
//!
//! Every scalar reactive value (cell, mapped value, zipped value) exposes the
//! same three operations: read the current value, register a downstream node
//! built from that value, and unregister it again.
//!
//! # How Registration Works
//!
//! `register` takes a factory rather than a finished node. The source calls
//! the factory with its current value, the factory builds the node and
//! inserts it into the runtime, and the source appends the returned key to
//! its dependents. Derived values use this to build their shared upstream
//! node lazily, on the first downstream registration.
//!
//! [`ReactiveValueExt`] layers the sink contract and combinators on top.

use std::rc::Rc;

use super::mapped::MappedValue;
use super::runtime::Runtime;
use super::sink::{sink_node, Sink, Subscription};
use crate::error::Result;
use crate::graph::{NodeId, Payload};

/// Builds a node from a source's current value and returns its key.
pub type NodeFactory<'a, T> = Box<dyn FnOnce(&T) -> NodeId + 'a>;

/// A source of scalar values that downstream nodes can register with.
pub trait ReactiveValue {
    type Value: Clone + 'static;

    /// The current value. No side effects.
    fn read(&self) -> Self::Value;

    /// Call `factory` with the current value and append the node it
    /// returns to this value's dependents.
    ///
    /// Implementations must call `factory` exactly once and return the key
    /// it produced.
    fn register(&self, factory: NodeFactory<'_, Self::Value>) -> NodeId;

    /// Remove `node` from this value's dependents and destroy it.
    ///
    /// Fails with [`InvariantViolation`](crate::ReactiveError::InvariantViolation)
    /// when `node` is not a dependent.
    fn unregister(&self, node: NodeId) -> Result<()>;
}

impl<R> ReactiveValue for Rc<R>
where
    R: ReactiveValue + ?Sized,
{
    type Value = R::Value;

    fn read(&self) -> Self::Value {
        (**self).read()
    }

    fn register(&self, factory: NodeFactory<'_, Self::Value>) -> NodeId {
        (**self).register(factory)
    }

    fn unregister(&self, node: NodeId) -> Result<()> {
        (**self).unregister(node)
    }
}

/// Sinks, subscriptions and combinators for every [`ReactiveValue`].
pub trait ReactiveValueExt: ReactiveValue + Clone + 'static {
    /// Register a sink built by `factory` from the current value.
    ///
    /// The sink is not called for the initial value; `factory` sees it.
    /// The caller must eventually pass the returned key to `unregister`.
    fn register_sink<S, F>(&self, factory: F) -> NodeId
    where
        F: FnOnce(&Self::Value) -> S,
        S: Sink<Self::Value> + 'static,
    {
        self.register(Box::new(move |value: &Self::Value| {
            Runtime::insert_value(sink_node(factory(value)))
        }))
    }

    /// Like [`register_sink`](Self::register_sink), but the registration is
    /// released when the returned guard is dropped.
    fn subscribe<S, F>(&self, factory: F) -> Subscription
    where
        F: FnOnce(&Self::Value) -> S,
        S: Sink<Self::Value> + 'static,
    {
        let node = self.register_sink(factory);
        let source = self.clone();
        Subscription::new(move || source.unregister(node))
    }

    /// Call `f` with the current value now and with every propagated value
    /// afterwards.
    fn observe<F>(&self, mut f: F) -> Subscription
    where
        F: FnMut(&Self::Value) + 'static,
    {
        self.subscribe(move |initial: &Self::Value| {
            f(initial);
            f
        })
    }

    /// A derived value computed from this one.
    fn map<V, M>(&self, mapper: M) -> MappedValue<Self::Value, V>
    where
        V: Clone + 'static,
        M: Fn(&Self::Value) -> V + 'static,
    {
        MappedValue::new(self.clone(), mapper)
    }

    /// Erase the concrete source type.
    fn into_dyn(self) -> Rc<dyn ReactiveValue<Value = Self::Value>> {
        Rc::new(self)
    }
}

impl<R> ReactiveValueExt for R where R: ReactiveValue + Clone + 'static {}

/// Payload-level view of a source, for combinators whose inputs have
/// different value types.
pub(crate) trait ErasedSource {
    fn read_payload(&self) -> Payload;

    fn register_payload(&self, factory: Box<dyn FnOnce(Payload) -> NodeId + '_>) -> NodeId;

    fn unregister_node(&self, node: NodeId) -> Result<()>;
}

impl<R> ErasedSource for R
where
    R: ReactiveValue,
{
    fn read_payload(&self) -> Payload {
        Rc::new(self.read())
    }

    fn register_payload(&self, factory: Box<dyn FnOnce(Payload) -> NodeId + '_>) -> NodeId {
        self.register(Box::new(move |value: &R::Value| factory(Rc::new(value.clone()))))
    }

    fn unregister_node(&self, node: NodeId) -> Result<()> {
        self.unregister(node)
    }
}

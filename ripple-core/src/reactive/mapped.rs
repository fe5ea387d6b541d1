//! Mapped Value Implementation
//!
//! A mapped value is a single-source pure transform with its own cached
//! value and dependents.
//!
//! # How Mapped Values Work
//!
//! 1. A new mapped value is cold: it holds no upstream registration and
//!    `read` computes `mapper(source.read())` on demand.
//!
//! 2. The first downstream registration registers one shared node on the
//!    source. That node caches `mapper(value)` and lists the downstream
//!    nodes. The mapped value is live from the moment the node exists,
//!    before the downstream factory runs.
//!
//! 3. Further registrations append to the shared node and are built from
//!    its cached value. The source is not touched again.
//!
//! 4. When the last downstream node unregisters, the shared node is
//!    unregistered from the source and the mapped value goes cold. The next
//!    registration starts over from the source's current value, so a stale
//!    cache is never observed.
//!
//! # Why This Matters
//!
//! Many sinks usually render the same derived expression. Sharing keeps
//! the mapper running once per change regardless of how many sinks consume
//! its output.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, error};

use super::runtime::Runtime;
use super::value::{NodeFactory, ReactiveValue};
use crate::error::{ReactiveError, Result};
use crate::graph::{downcast, Dependents, ErasedMapper, MappedNode, NodeId, Payload, ValueNode};

struct MappedInner<S, V> {
    source: Rc<dyn ReactiveValue<Value = S>>,
    mapper: Rc<dyn Fn(&S) -> V>,
    erased: ErasedMapper,
    /// The shared upstream node while live.
    node: std::cell::Cell<Option<NodeId>>,
}

/// A derived value computed from one source.
///
/// Clones share the same upstream registration.
pub struct MappedValue<S, V> {
    inner: Rc<MappedInner<S, V>>,
}

impl<S, V> MappedValue<S, V>
where
    S: Clone + 'static,
    V: Clone + 'static,
{
    /// Create a cold mapped value. Nothing is registered on `source` until
    /// the first downstream registration.
    pub fn new<R, M>(source: R, mapper: M) -> Self
    where
        R: ReactiveValue<Value = S> + 'static,
        M: Fn(&S) -> V + 'static,
    {
        let mapper: Rc<dyn Fn(&S) -> V> = Rc::new(mapper);
        let typed = mapper.clone();
        let erased: ErasedMapper =
            Rc::new(move |payload: &Payload| Rc::new(typed(downcast::<S>(payload))) as Payload);

        Self {
            inner: Rc::new(MappedInner {
                source: Rc::new(source),
                mapper,
                erased,
                node: std::cell::Cell::new(None),
            }),
        }
    }

    /// Whether an upstream registration currently exists.
    pub fn is_live(&self) -> bool {
        self.inner.node.get().is_some()
    }

    /// Number of downstream nodes sharing the upstream registration.
    pub fn dependent_count(&self) -> usize {
        self.inner
            .node
            .get()
            .and_then(|node| {
                Runtime::with(|rt| match rt.values.get(node) {
                    Some(ValueNode::Mapped(mapped)) => Some(mapped.dependents.len()),
                    _ => None,
                })
            })
            .unwrap_or(0)
    }

    fn cached(&self) -> Option<(NodeId, Payload)> {
        let node = self.inner.node.get()?;
        Runtime::with(|rt| match rt.values.get(node) {
            Some(ValueNode::Mapped(mapped)) => Some((node, mapped.value.clone())),
            _ => None,
        })
    }

    fn register_live(
        &self,
        node: NodeId,
        cached: Payload,
        factory: NodeFactory<'_, V>,
    ) -> NodeId {
        let child = factory(downcast::<V>(&cached));
        let attached = Runtime::with(|rt| match rt.values.get_mut(node) {
            Some(ValueNode::Mapped(mapped)) => {
                mapped.dependents.push(child);
                true
            }
            _ => false,
        });
        if !attached {
            error!(?node, ?child, "mapped node vanished during registration");
        }
        child
    }

    /// Installs the shared node and publishes it before the caller's
    /// factory runs. A registration made from inside that factory then
    /// attaches to the same node.
    fn register_cold(&self, factory: NodeFactory<'_, V>) -> NodeId {
        let mapped = self.inner.source.register(Box::new(|value: &S| {
            let node = Runtime::insert_value(ValueNode::Mapped(MappedNode {
                mapper: self.inner.erased.clone(),
                value: Rc::new((self.inner.mapper)(value)),
                dependents: Dependents::new(),
            }));
            self.inner.node.set(Some(node));
            node
        }));
        self.inner.node.set(Some(mapped));
        debug!(?mapped, "mapped value went live");

        let cached = match self.cached() {
            Some((_, cached)) => cached,
            None => {
                error!(?mapped, "source registered the mapped node without building it");
                Rc::new((self.inner.mapper)(&self.inner.source.read())) as Payload
            }
        };
        self.register_live(mapped, cached, factory)
    }
}

impl<S, V> ReactiveValue for MappedValue<S, V>
where
    S: Clone + 'static,
    V: Clone + 'static,
{
    type Value = V;

    fn read(&self) -> V {
        match self.cached() {
            Some((_, cached)) => downcast::<V>(&cached).clone(),
            None => (self.inner.mapper)(&self.inner.source.read()),
        }
    }

    fn register(&self, factory: NodeFactory<'_, V>) -> NodeId {
        match self.cached() {
            Some((node, cached)) => self.register_live(node, cached, factory),
            None => {
                self.inner.node.set(None);
                self.register_cold(factory)
            }
        }
    }

    fn unregister(&self, node: NodeId) -> Result<()> {
        let mapped = self
            .inner
            .node
            .get()
            .ok_or_else(|| {
                ReactiveError::invariant(format!("unregister of {node:?} on a cold mapped value"))
            })?;

        if Runtime::detach_from_mapped(mapped, node)? {
            self.inner.node.set(None);
            self.inner.source.unregister(mapped)?;
            debug!(?mapped, "mapped value went cold");
        }
        Ok(())
    }
}

impl<S, V> Clone for MappedValue<S, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, V> fmt::Debug for MappedValue<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedValue")
            .field("node", &self.inner.node.get())
            .finish_non_exhaustive()
    }
}

/// Select `truthy` or `falsy` depending on `condition`.
pub fn when<R, T>(condition: R, truthy: T, falsy: T) -> MappedValue<bool, T>
where
    R: ReactiveValue<Value = bool> + 'static,
    T: Clone + 'static,
{
    MappedValue::new(condition, move |flag: &bool| {
        if *flag {
            truthy.clone()
        } else {
            falsy.clone()
        }
    })
}

//! Mapped List Implementation
//!
//! A mapped list is an index-aligned projection of another collection:
//! element `i` is always `mapper(source[i])`.
//!
//! Like a mapped value it is shared and lazy. The first registration
//! installs one mirror node on the source; the mirror maps each inserted
//! element once, drops removed ranges at the same indices, and forwards both
//! to its own dependents. When the last dependent leaves, the mirror is
//! unregistered and the list goes cold.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error};

use super::cell::ReadOnlyCell;
use super::collection::{ArrayNodeFactory, Element, ReactiveCollection};
use super::runtime::Runtime;
use crate::error::{ReactiveError, Result};
use crate::graph::{
    downcast, ArrayNode, ArrayNodeId, Dependents, MappedArrayNode, Payload, Projection,
};

/// Mirror storage of a live mapped list.
struct ListProjection<S, T> {
    mapper: Rc<dyn Fn(&S) -> T>,
    storage: Vec<T>,
}

impl<S, T> Projection for ListProjection<S, T>
where
    S: 'static,
    T: Clone + 'static,
{
    fn push(&mut self, elem: &Payload) -> Payload {
        let mapped = (self.mapper)(downcast::<S>(elem));
        self.storage.push(mapped.clone());
        Rc::new(mapped)
    }

    fn remove(&mut self, start: usize, count: usize) {
        let end = start.saturating_add(count).min(self.storage.len());
        self.storage.drain(start.min(end)..end);
    }

    fn storage(&self) -> &dyn Any {
        &self.storage
    }
}

fn mirror<T: 'static>(projection: &dyn Projection) -> &Vec<T> {
    projection
        .storage()
        .downcast_ref::<Vec<T>>()
        .unwrap_or_else(|| panic!("mapped list mirror is not a `Vec<{}>`", type_name::<T>()))
}

struct MappedListInner<S, T> {
    source: Rc<dyn ReactiveCollection<Item = S>>,
    mapper: Rc<dyn Fn(&S) -> T>,
    /// The mirror node while live.
    node: std::cell::Cell<Option<ArrayNodeId>>,
}

/// An index-aligned projection of a collection.
///
/// Mapped lists chain: `list.map(f).map(g)` maps each element once per
/// level, and every level shares the root's length cell.
pub struct MappedList<S, T> {
    inner: Rc<MappedListInner<S, T>>,
}

impl<S, T> MappedList<S, T>
where
    S: Element + Clone,
    T: Element + Clone,
{
    /// Create a cold mapped list.
    pub fn new<R, M>(source: R, mapper: M) -> Self
    where
        R: ReactiveCollection<Item = S> + 'static,
        M: Fn(&S) -> T + 'static,
    {
        Self {
            inner: Rc::new(MappedListInner {
                source: Rc::new(source),
                mapper: Rc::new(mapper),
                node: std::cell::Cell::new(None),
            }),
        }
    }

    /// Whether the mirror node currently exists.
    pub fn is_live(&self) -> bool {
        self.inner.node.get().is_some()
    }

    /// Number of elements, which is always the source's length.
    pub fn len(&self) -> usize {
        self.inner.source.length().read()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the first mapped element equal to `elem`.
    ///
    /// Reads the mirror while live. A cold list maps the source's elements
    /// until it finds a match.
    pub fn index_of(&self, elem: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        match self.projection() {
            Some((_, projection)) => {
                let projection = projection.borrow();
                mirror::<T>(&*projection).iter().position(|candidate| candidate == elem)
            }
            None => self
                .inner
                .source
                .read()
                .iter()
                .position(|source| (self.inner.mapper)(source) == *elem),
        }
    }

    /// Number of array nodes sharing the mirror.
    pub fn dependent_count(&self) -> usize {
        self.inner
            .node
            .get()
            .and_then(|node| {
                Runtime::with(|rt| match rt.arrays.get(node) {
                    Some(ArrayNode::Mapped(mirror)) => Some(mirror.dependents.len()),
                    _ => None,
                })
            })
            .unwrap_or(0)
    }

    fn projection(&self) -> Option<(ArrayNodeId, Rc<RefCell<dyn Projection>>)> {
        let node = self.inner.node.get()?;
        Runtime::with(|rt| match rt.arrays.get(node) {
            Some(ArrayNode::Mapped(mirror)) => Some((node, mirror.projection.clone())),
            _ => None,
        })
    }

    fn snapshot(projection: &RefCell<dyn Projection>) -> Vec<T> {
        mirror::<T>(&*projection.borrow()).clone()
    }

    fn map_source(&self) -> Vec<T> {
        self.inner
            .source
            .read()
            .iter()
            .map(|elem| (self.inner.mapper)(elem))
            .collect()
    }

    fn register_live(
        &self,
        node: ArrayNodeId,
        current: Vec<T>,
        factory: ArrayNodeFactory<'_, T>,
    ) -> ArrayNodeId {
        let child = factory(&current);
        let attached = Runtime::with(|rt| match rt.arrays.get_mut(node) {
            Some(ArrayNode::Mapped(mirror)) => {
                mirror.dependents.push(child);
                true
            }
            _ => false,
        });
        if !attached {
            error!(?node, ?child, "mapped list mirror vanished during registration");
        }
        child
    }

    /// Installs the mirror on the source and publishes it before the
    /// caller's factory runs. A registration made from inside that factory
    /// then attaches to the same mirror.
    fn register_cold(&self, factory: ArrayNodeFactory<'_, T>) -> ArrayNodeId {
        let mirror = self.inner.source.register(Box::new(|elems: &[S]| {
            let projection = ListProjection {
                mapper: self.inner.mapper.clone(),
                storage: elems.iter().map(|elem| (self.inner.mapper)(elem)).collect(),
            };
            let node = Runtime::insert_array(ArrayNode::Mapped(MappedArrayNode {
                projection: Rc::new(RefCell::new(projection)),
                dependents: Dependents::new(),
            }));
            self.inner.node.set(Some(node));
            node
        }));
        self.inner.node.set(Some(mirror));
        debug!(?mirror, "mapped list went live");

        let current = match self.projection() {
            Some((_, projection)) => Self::snapshot(&projection),
            None => {
                error!(?mirror, "source registered the mirror without building it");
                self.map_source()
            }
        };
        self.register_live(mirror, current, factory)
    }
}

impl<S, T> ReactiveCollection for MappedList<S, T>
where
    S: Element + Clone,
    T: Element + Clone,
{
    type Item = T;

    fn read(&self) -> Vec<T> {
        match self.projection() {
            Some((_, projection)) => Self::snapshot(&projection),
            None => self.map_source(),
        }
    }

    fn length(&self) -> ReadOnlyCell<usize> {
        self.inner.source.length()
    }

    fn register(&self, factory: ArrayNodeFactory<'_, T>) -> ArrayNodeId {
        match self.projection() {
            Some((node, projection)) => {
                self.register_live(node, Self::snapshot(&projection), factory)
            }
            None => {
                self.inner.node.set(None);
                self.register_cold(factory)
            }
        }
    }

    fn unregister(&self, node: ArrayNodeId) -> Result<()> {
        let mirror = self.inner.node.get().ok_or_else(|| {
            ReactiveError::invariant(format!("unregister of {node:?} on a cold mapped list"))
        })?;

        if Runtime::detach_from_mapped_array(mirror, node)? {
            self.inner.node.set(None);
            self.inner.source.unregister(mirror)?;
            debug!(?mirror, "mapped list went cold");
        }
        Ok(())
    }
}

impl<S, T> Element for MappedList<S, T>
where
    S: Element + Clone,
    T: Element + Clone,
{
    const IS_COLLECTION: bool = true;
}

impl<S, T> Clone for MappedList<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, T> fmt::Debug for MappedList<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedList")
            .field("node", &self.inner.node.get())
            .finish_non_exhaustive()
    }
}

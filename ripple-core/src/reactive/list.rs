//! Reactive List Implementation
//!
//! A reactive list is a mutable ordered collection with two structural
//! operations: `append` at the tail and `remove_range`. Each operation
//! updates the storage and the length cell, then propagates the change
//! through every registered array node before returning.
//!
//! Range sinks receive `on_insert` / `on_remove`. Mapped lists apply the
//! same change to their mirror and forward it, so index alignment holds at
//! every level without re-deriving anything.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::cell::{Cell, ReadOnlyCell};
use super::collection::{ArrayNodeFactory, Element, ReactiveCollection};
use super::runtime::Runtime;
use crate::error::Result;
use crate::graph::{detach, propagate_array, ArrayChange, ArrayNodeId, Dependents};

struct ListInner<T> {
    storage: RefCell<Vec<T>>,
    length: Cell<usize>,
    dependents: RefCell<Dependents<ArrayNodeId>>,
}

/// A mutable reactive list.
///
/// # Example
///
/// ```rust
/// use ripple_core::{ReactiveCollection, ReactiveCollectionExt, ReactiveList};
///
/// let names = ReactiveList::new(vec!["a".to_string()]);
/// let upper = names.map(|s: &String| s.to_uppercase());
///
/// names.append("b".to_string());
/// assert_eq!(upper.read(), vec!["A", "B"]);
/// assert_eq!(names.length().read(), 2);
/// ```
pub struct ReactiveList<T> {
    inner: Rc<ListInner<T>>,
}

impl<T> ReactiveList<T>
where
    T: Element + Clone,
{
    /// Create a list holding `initial`.
    pub fn new(initial: Vec<T>) -> Self {
        Self {
            inner: Rc::new(ListInner {
                length: Cell::new(initial.len()),
                storage: RefCell::new(initial),
                dependents: RefCell::new(Dependents::new()),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.storage.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.storage.borrow().is_empty()
    }

    /// Borrow the elements without cloning them.
    ///
    /// `f` must not mutate this list.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.storage.borrow())
    }

    /// Number of array nodes currently registered on this list.
    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.borrow().len()
    }

    /// Append `elem` at the tail and propagate the insertion.
    pub fn append(&self, elem: T) {
        let len = {
            let mut storage = self.inner.storage.borrow_mut();
            storage.push(elem.clone());
            storage.len()
        };
        self.inner.length.set(len);

        let seeds = self.inner.dependents.borrow().clone();
        debug!(len, dependents = seeds.len(), "list append");
        if !seeds.is_empty() {
            propagate_array(&seeds, ArrayChange::Insert(Rc::new(elem)));
        }
    }

    /// Remove `[start, start + count)` and propagate the removal.
    ///
    /// Out-of-bounds requests are clamped or rejected according to the
    /// thread's [`RangePolicy`](crate::config::RangePolicy). A rejected
    /// request leaves the list untouched. Returns the removed elements.
    pub fn remove_range(&self, start: usize, count: usize) -> Result<Vec<T>> {
        let policy = Runtime::config().range_policy;
        let (start, count) = policy.resolve(start, count, self.len())?;

        let (removed, len) = {
            let mut storage = self.inner.storage.borrow_mut();
            let removed: Vec<T> = storage.drain(start..start + count).collect();
            (removed, storage.len())
        };
        self.inner.length.set(len);

        let seeds = self.inner.dependents.borrow().clone();
        debug!(start, count, len, dependents = seeds.len(), "list remove_range");
        if !seeds.is_empty() {
            propagate_array(&seeds, ArrayChange::Remove { start, count });
        }
        Ok(removed)
    }

    /// Position of the first element equal to `elem`.
    pub fn index_of(&self, elem: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.inner.storage.borrow().iter().position(|candidate| candidate == elem)
    }
}

impl<T> ReactiveCollection for ReactiveList<T>
where
    T: Element + Clone,
{
    type Item = T;

    fn read(&self) -> Vec<T> {
        self.inner.storage.borrow().clone()
    }

    fn length(&self) -> ReadOnlyCell<usize> {
        self.inner.length.read_only()
    }

    fn register(&self, factory: ArrayNodeFactory<'_, T>) -> ArrayNodeId {
        let snapshot = self.read();
        let node = factory(&snapshot);
        self.inner.dependents.borrow_mut().push(node);
        node
    }

    fn unregister(&self, node: ArrayNodeId) -> Result<()> {
        detach(&mut self.inner.dependents.borrow_mut(), node, "reactive list")?;
        Runtime::free_array(node);
        Ok(())
    }
}

impl<T> Clone for ReactiveList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Element + Clone> Element for ReactiveList<T> {
    const IS_COLLECTION: bool = true;
}

impl<T: Element + Clone> Default for ReactiveList<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: fmt::Debug> fmt::Debug for ReactiveList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveList")
            .field("storage", &*self.inner.storage.borrow())
            .field("dependents", &self.inner.dependents.borrow().len())
            .finish()
    }
}

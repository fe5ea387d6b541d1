//! Cell Implementation
//!
//! A cell is the only reactive value that can be assigned from outside. It
//! holds a value and the ordered list of nodes registered on it.
//!
//! # How Cells Work
//!
//! 1. `register` hands the current value to a factory and records the node
//!    it returns as a dependent.
//!
//! 2. `set` stores the new value and starts a propagation pass seeded with
//!    every dependent, in registration order.
//!
//! 3. The pass is fully drained before `set` returns.
//!
//! There is no equality short-circuit: setting a value equal to the current
//! one still reaches every sink.
//!
//! # Memory Layout
//!
//! A `Cell` is a reference-counted handle. Clones share the value and the
//! dependents list, so a clone captured inside a sink or a subscription
//! observes and mutates the same cell.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::runtime::Runtime;
use super::value::{NodeFactory, ReactiveValue};
use crate::error::Result;
use crate::graph::{detach, propagate, Dependents, NodeId};

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct CellInner<T> {
    id: u64,
    value: RefCell<T>,
    dependents: RefCell<Dependents<NodeId>>,
}

/// A mutable reactive value.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Cell, ReactiveValue, ReactiveValueExt};
///
/// let count = Cell::new(0);
/// let doubled = count.map(|n: &i32| n * 2);
///
/// count.set(5);
/// assert_eq!(doubled.read(), 10);
/// ```
pub struct Cell<T> {
    inner: Rc<CellInner<T>>,
}

impl<T> Cell<T>
where
    T: Clone + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(CellInner {
                id: next_cell_id(),
                value: RefCell::new(value),
                dependents: RefCell::new(Dependents::new()),
            }),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get a clone of the current value.
    pub fn read(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning it.
    ///
    /// `f` must not call `set` on this cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store `value` and propagate it to every dependent.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value.clone();

        let seeds = self.inner.dependents.borrow().clone();
        trace!(cell = self.inner.id, dependents = seeds.len(), "cell set");
        if !seeds.is_empty() {
            propagate(&seeds, Rc::new(value));
        }
    }

    /// Set the value from a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.with(f);
        self.set(next);
    }

    /// Number of nodes currently registered on this cell.
    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.borrow().len()
    }

    /// A handle that can be read and registered with but not set.
    pub fn read_only(&self) -> ReadOnlyCell<T> {
        ReadOnlyCell { cell: self.clone() }
    }
}

impl<T> ReactiveValue for Cell<T>
where
    T: Clone + 'static,
{
    type Value = T;

    fn read(&self) -> T {
        Cell::read(self)
    }

    fn register(&self, factory: NodeFactory<'_, T>) -> NodeId {
        let value = self.read();
        let node = factory(&value);
        self.inner.dependents.borrow_mut().push(node);
        node
    }

    fn unregister(&self, node: NodeId) -> Result<()> {
        detach(&mut self.inner.dependents.borrow_mut(), node, "cell")?;
        Runtime::free_value(node);
        Ok(())
    }
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Default + Clone + 'static> Default for Cell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("dependents", &self.inner.dependents.borrow().len())
            .finish()
    }
}

/// Read-only view of a [`Cell`].
///
/// Collections expose their length through this type so that only the
/// collection itself can change it.
pub struct ReadOnlyCell<T> {
    cell: Cell<T>,
}

impl<T> ReadOnlyCell<T>
where
    T: Clone + 'static,
{
    pub fn read(&self) -> T {
        self.cell.read()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.cell.with(f)
    }

    pub fn dependent_count(&self) -> usize {
        self.cell.dependent_count()
    }
}

impl<T> ReactiveValue for ReadOnlyCell<T>
where
    T: Clone + 'static,
{
    type Value = T;

    fn read(&self) -> T {
        self.cell.read()
    }

    fn register(&self, factory: NodeFactory<'_, T>) -> NodeId {
        ReactiveValue::register(&self.cell, factory)
    }

    fn unregister(&self, node: NodeId) -> Result<()> {
        ReactiveValue::unregister(&self.cell, node)
    }
}

impl<T> Clone for ReadOnlyCell<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadOnlyCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnlyCell").field(&self.cell).finish()
    }
}

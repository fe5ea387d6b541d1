//! Ripple Core
//!
//! This crate provides the incremental-update engine of the Ripple reactive
//! UI toolkit. It implements:
//!
//! - Mutable cells and lazily shared derived values (mapped and zipped)
//! - Reactive lists with structural change propagation
//! - Index-aligned mapped lists
//! - A breadth-first propagation engine over an arena of graph nodes
//! - The sink contract consumed by rendering layers
//!
//! Rendering itself is not part of this crate; a renderer plugs in by
//! implementing [`Sink`] and [`RangeSink`].
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Typed reactive primitives and the registration API
//! - `graph`: Node arena types and the propagation engine
//! - `config`: Per-thread runtime configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use ripple_core::{Cell, ReactiveValue, ReactiveValueExt};
//!
//! // Create a cell
//! let count = Cell::new(0);
//!
//! // Create a derived value
//! let doubled = count.map(|n: &i32| n * 2);
//!
//! // Register a sink; the guard unregisters it when dropped
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! let subscription = doubled.subscribe(move |_initial: &i32| {
//!     move |value: &i32| log.borrow_mut().push(*value)
//! });
//!
//! // Update the cell; the sink runs before `set` returns
//! count.set(5);
//! count.set(5);
//! assert_eq!(*seen.borrow(), vec![10, 10]);
//!
//! drop(subscription);
//! assert!(!doubled.is_live());
//! assert_eq!(doubled.read(), 10);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::{RangePolicy, RuntimeConfig};
pub use error::{ReactiveError, Result};
pub use reactive::{
    when, zip2, zip3, ArrayNodeFactory, Cell, Element, MappedList, MappedValue, NodeFactory,
    RangeSink, ReactiveCollection, ReactiveCollectionExt, ReactiveList, ReactiveValue,
    ReactiveValueExt, ReadOnlyCell, Runtime, RuntimeStats, Scope, Sink, Subscription, ZippedValue,
};

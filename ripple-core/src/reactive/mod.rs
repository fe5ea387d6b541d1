//! Reactive Primitives
//!
//! This module implements the typed surface of the reactive graph: cells,
//! derived values, lists and the sink contract that renderers consume.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A [`Cell`] is a container for mutable state. Setting it synchronously
//! pushes the new value through every registered node before returning.
//!
//! ## Derived Values
//!
//! A [`MappedValue`] applies a function to one source; a [`ZippedValue`]
//! combines several. Both are lazy and shared: they hold exactly one
//! upstream registration while anything downstream is registered on them,
//! and none otherwise.
//!
//! ## Collections
//!
//! A [`ReactiveList`] propagates structural changes (append at the tail,
//! remove a range) rather than whole values. A [`MappedList`] mirrors a
//! collection element by element.
//!
//! ## Sinks
//!
//! [`Sink`] and [`RangeSink`] are the consumer side. Registrations are
//! explicit keys, or [`Subscription`] guards that release on drop; a
//! [`Scope`] ties the subscriptions of one rendered element to its lifetime.
//!
//! # Implementation Notes
//!
//! Dependencies are wired explicitly through `register`, not discovered by
//! tracking reads. Every node lives in the thread-local [`Runtime`].

mod cell;
mod collection;
mod list;
mod mapped;
mod mapped_list;
mod runtime;
mod sink;
mod value;
mod zipped;

pub use cell::{Cell, ReadOnlyCell};
pub use collection::{ArrayNodeFactory, Element, ReactiveCollection, ReactiveCollectionExt};
pub use list::ReactiveList;
pub use mapped::{when, MappedValue};
pub use mapped_list::MappedList;
pub use runtime::{Runtime, RuntimeStats};
pub use sink::{RangeSink, Scope, Sink, Subscription};
pub use value::{NodeFactory, ReactiveValue, ReactiveValueExt};
pub use zipped::{zip2, zip3, ZippedValue};

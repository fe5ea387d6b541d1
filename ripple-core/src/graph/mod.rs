//! Dependency Graph
//!
//! This module holds the node model of the reactive graph and the engine
//! that propagates changes through it.
//!
//! # Overview
//!
//! The graph is a DAG rooted at mutable sources:
//!
//! - Cells and lists are the roots. They own their dependents lists.
//! - Mapped values, zip stubs and mapped lists are interior nodes.
//! - Sinks and range sinks are leaves.
//!
//! Edges point downstream only. A node never holds a pointer back to its
//! source; the typed handle that created it remembers where it is
//! registered and tears it down from there.
//!
//! # Design Decisions
//!
//! 1. Nodes live in slot arenas owned by the runtime and are addressed by
//!    versioned keys, so upstream and downstream links are plain indices.
//!
//! 2. Node variants are closed enums; the propagation loop matches them
//!    exhaustively.
//!
//! 3. Payloads are type-erased (`Rc<dyn Any>`). The typed facades in
//!    `reactive` are the only producers and consumers.

mod node;
mod propagation;

pub use node::{ArrayNodeId, ArrayNodeKind, NodeId, NodeKind, ZipId};

pub(crate) use node::{
    detach, downcast, ArrayNode, Dependents, ErasedMapper, ErasedRangeSink, ErasedSink,
    ErasedZipper, MappedArrayNode, MappedNode, Payload, Projection, RangeNode, ValueNode,
    ZipContext,
};
pub(crate) use propagation::{propagate, propagate_array, ArrayChange};

//! Graph Nodes
//!
//! This module defines the node types that live in the runtime arenas.
//!
//! Value nodes hang off scalar sources (cells, mapped and zipped values);
//! array nodes hang off collections. Both are closed enums so that the
//! propagation loop matches every variant exhaustively.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use slotmap::{new_key_type, Key};
use smallvec::SmallVec;

use crate::error::{ReactiveError, Result};
use crate::reactive::Scope;

new_key_type! {
    /// Key of a value node (sink, mapped value or zip stub).
    pub struct NodeId;

    /// Key of the context shared by all stubs of one zipped value.
    pub struct ZipId;

    /// Key of a collection node (range sink or mapped-list mirror).
    pub struct ArrayNodeId;
}

/// A value travelling through the graph.
///
/// Always an `Rc<T>` for the `T` of the node that produced it.
pub(crate) type Payload = Rc<dyn Any>;

pub(crate) type ErasedMapper = Rc<dyn Fn(&Payload) -> Payload>;
pub(crate) type ErasedZipper = Rc<dyn Fn(&[Payload]) -> Payload>;
pub(crate) type ErasedSink = Rc<RefCell<dyn FnMut(&Payload)>>;

/// Downstream keys of a node, in registration order.
pub(crate) type Dependents<K> = SmallVec<[K; 4]>;

/// Borrow the `T` behind a payload.
///
/// Payloads are only produced by the typed facades, so a mismatch means the
/// graph was wired incorrectly.
pub(crate) fn downcast<T: 'static>(payload: &Payload) -> &T {
    (**payload).downcast_ref::<T>().unwrap_or_else(|| {
        panic!(
            "reactive graph payload is not a `{}`; node wiring is corrupt",
            type_name::<T>()
        )
    })
}

/// Remove `node` from `dependents`, preserving the order of the rest.
pub(crate) fn detach<K: Key + Debug>(
    dependents: &mut Dependents<K>,
    node: K,
    owner: &str,
) -> Result<()> {
    let index = dependents
        .iter()
        .position(|dependent| *dependent == node)
        .ok_or_else(|| {
            ReactiveError::invariant(format!("{owner} has no dependent {node:?}"))
        })?;
    dependents.remove(index);
    Ok(())
}

/// Discriminant of a [`ValueNode`], for logging and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Terminal consumer. Leaf of the graph.
    Sink,

    /// Single-source transform with a cached value and its own dependents.
    Mapped,

    /// One input slot of a zipped value.
    Zipped,
}

pub(crate) enum ValueNode {
    Sink(ErasedSink),
    Mapped(MappedNode),
    Zipped { index: usize, context: ZipId },
}

impl ValueNode {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            ValueNode::Sink(_) => NodeKind::Sink,
            ValueNode::Mapped(_) => NodeKind::Mapped,
            ValueNode::Zipped { .. } => NodeKind::Zipped,
        }
    }
}

pub(crate) struct MappedNode {
    pub(crate) mapper: ErasedMapper,
    pub(crate) value: Payload,
    pub(crate) dependents: Dependents<NodeId>,
}

/// State shared by every stub of one zipped value.
///
/// `source_values[i]` always holds the last value seen from input `i`.
pub(crate) struct ZipContext {
    pub(crate) source_values: Vec<Payload>,
    pub(crate) zipper: ErasedZipper,
    pub(crate) value: Option<Payload>,
    pub(crate) dependents: Dependents<NodeId>,
}

/// Discriminant of an [`ArrayNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayNodeKind {
    /// External consumer tracking a contiguous range of elements.
    Range,

    /// Index-aligned projection of its source collection.
    Mapped,
}

pub(crate) enum ArrayNode {
    Range(RangeNode),
    Mapped(MappedArrayNode),
}

impl ArrayNode {
    pub(crate) fn kind(&self) -> ArrayNodeKind {
        match self {
            ArrayNode::Range(_) => ArrayNodeKind::Range,
            ArrayNode::Mapped(_) => ArrayNodeKind::Mapped,
        }
    }
}

pub(crate) struct RangeNode {
    pub(crate) sink: Rc<RefCell<dyn ErasedRangeSink>>,
    /// One scope per tracked element, index-aligned with the source.
    pub(crate) scopes: Vec<Scope>,
}

pub(crate) struct MappedArrayNode {
    pub(crate) projection: Rc<RefCell<dyn Projection>>,
    pub(crate) dependents: Dependents<ArrayNodeId>,
}

/// Type-erased view of a range sink.
pub(crate) trait ErasedRangeSink {
    fn insert(&mut self, elem: &Payload, scope: &mut Scope);
    fn remove(&mut self, start: usize, count: usize);
}

/// Type-erased mirror storage of a mapped list.
pub(crate) trait Projection {
    /// Map and append one source element, returning the mapped payload.
    fn push(&mut self, elem: &Payload) -> Payload;

    /// Drop `[start, start + count)`, clipped to the mirror's length.
    fn remove(&mut self, start: usize, count: usize);

    /// The mirror as `&Vec<T>`.
    fn storage(&self) -> &dyn Any;
}

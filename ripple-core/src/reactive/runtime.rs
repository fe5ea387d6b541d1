//! Reactive Runtime
//!
//! The runtime owns every node of the reactive graph for the current thread.
//! Sources (cells and lists) keep their own dependents lists; the nodes
//! those lists point at live here, in three arenas addressed by stable keys:
//!
//! - value nodes: sinks, mapped values and zip stubs
//! - zip contexts: the state shared by all stubs of one zipped value
//! - array nodes: range sinks and mapped-list mirrors
//!
//! Links between nodes are keys, never owning pointers, so the graph has no
//! reference cycles and a node can be destroyed without touching its peers.
//!
//! # Borrowing Rules
//!
//! The arenas sit behind one `RefCell`. Code inside [`Runtime::with`] must
//! not run user callbacks (mappers, zippers, sinks, factories) and must not
//! drop anything that may itself touch the runtime (sinks, scopes,
//! subscriptions). Such values are moved out of the closure and dropped
//! afterwards.
//!
//! # Thread Safety
//!
//! The graph is single-threaded. Each thread gets its own runtime; reactive
//! handles are `!Send` so they cannot leak across.

use std::cell::RefCell;

use serde::Serialize;
use slotmap::SlotMap;
use tracing::{debug, error};

use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::graph::{
    detach, ArrayNode, ArrayNodeId, ArrayNodeKind, NodeId, NodeKind, ValueNode, ZipContext, ZipId,
};

thread_local! {
    static RUNTIME: RefCell<Arena> = RefCell::new(Arena::default());
}

#[derive(Default)]
pub(crate) struct Arena {
    pub(crate) values: SlotMap<NodeId, ValueNode>,
    pub(crate) contexts: SlotMap<ZipId, ZipContext>,
    pub(crate) arrays: SlotMap<ArrayNodeId, ArrayNode>,
    pub(crate) config: RuntimeConfig,
}

/// Live node counts of the current thread's runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeStats {
    pub sinks: usize,
    pub mapped_values: usize,
    pub zip_stubs: usize,
    pub zip_contexts: usize,
    pub range_sinks: usize,
    pub mapped_lists: usize,
}

impl RuntimeStats {
    /// Total number of live nodes across all arenas.
    pub fn total(&self) -> usize {
        self.sinks
            + self.mapped_values
            + self.zip_stubs
            + self.zip_contexts
            + self.range_sinks
            + self.mapped_lists
    }
}

/// Handle to the current thread's reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Install a configuration for the current thread.
    pub fn configure(config: RuntimeConfig) {
        debug!(?config, "reactive runtime configured");
        Self::with(|rt| rt.config = config);
    }

    /// The configuration in effect on the current thread.
    pub fn config() -> RuntimeConfig {
        Self::with(|rt| rt.config.clone())
    }

    /// Count the live nodes of the current thread's graph.
    pub fn stats() -> RuntimeStats {
        Self::with(|rt| {
            let mut stats = RuntimeStats {
                zip_contexts: rt.contexts.len(),
                ..RuntimeStats::default()
            };
            for node in rt.values.values() {
                match node.kind() {
                    NodeKind::Sink => stats.sinks += 1,
                    NodeKind::Mapped => stats.mapped_values += 1,
                    NodeKind::Zipped => stats.zip_stubs += 1,
                }
            }
            for node in rt.arrays.values() {
                match node.kind() {
                    ArrayNodeKind::Range => stats.range_sinks += 1,
                    ArrayNodeKind::Mapped => stats.mapped_lists += 1,
                }
            }
            stats
        })
    }

    /// Run `f` with exclusive access to the arenas.
    pub(crate) fn with<R>(f: impl FnOnce(&mut Arena) -> R) -> R {
        RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
    }

    /// Like [`Runtime::with`], but yields `None` once the thread's runtime
    /// has been torn down. Teardown paths use this so that handles dropped
    /// during thread exit do not panic.
    pub(crate) fn try_with<R>(f: impl FnOnce(&mut Arena) -> R) -> Option<R> {
        RUNTIME.try_with(|rt| f(&mut rt.borrow_mut())).ok()
    }

    pub(crate) fn insert_value(node: ValueNode) -> NodeId {
        Self::with(|rt| rt.values.insert(node))
    }

    pub(crate) fn insert_array(node: ArrayNode) -> ArrayNodeId {
        Self::with(|rt| rt.arrays.insert(node))
    }

    /// Destroy a value node.
    pub(crate) fn free_value(node: NodeId) {
        let removed = Self::try_with(|rt| rt.values.remove(node)).flatten();
        drop(removed);
    }

    /// Destroy an array node. A range node releases the scopes of every
    /// element it still tracks.
    pub(crate) fn free_array(node: ArrayNodeId) {
        let removed = Self::try_with(|rt| rt.arrays.remove(node)).flatten();
        if let Some(ArrayNode::Range(range)) = removed {
            for scope in range.scopes {
                if let Err(err) = scope.release() {
                    error!(%err, ?node, "failed to release element scope");
                }
            }
        }
    }

    /// Destroy a zip context.
    pub(crate) fn free_context(context: ZipId) {
        let removed = Self::try_with(|rt| rt.contexts.remove(context)).flatten();
        drop(removed);
    }

    /// Detach `child` from the dependents of the mapped node `parent` and
    /// destroy it. Returns `true` when `parent` has no dependents left.
    pub(crate) fn detach_from_mapped(parent: NodeId, child: NodeId) -> Result<bool> {
        let emptied = Self::try_with(|rt| match rt.values.get_mut(parent) {
            Some(ValueNode::Mapped(mapped)) => {
                detach(&mut mapped.dependents, child, "mapped value")
                    .map(|()| mapped.dependents.is_empty())
            }
            _ => Err(ReactiveError::invariant(format!(
                "{parent:?} is not a live mapped node"
            ))),
        });
        let emptied = emptied.transpose()?.unwrap_or(false);
        Self::free_value(child);
        Ok(emptied)
    }

    /// Detach `child` from a zip context's dependents and destroy it.
    /// Returns `true` when the context has no dependents left.
    pub(crate) fn detach_from_context(context: ZipId, child: NodeId) -> Result<bool> {
        let emptied = Self::try_with(|rt| match rt.contexts.get_mut(context) {
            Some(ctx) => detach(&mut ctx.dependents, child, "zipped value")
                .map(|()| ctx.dependents.is_empty()),
            None => Err(ReactiveError::invariant(format!(
                "{context:?} is not a live zip context"
            ))),
        });
        let emptied = emptied.transpose()?.unwrap_or(false);
        Self::free_value(child);
        Ok(emptied)
    }

    /// Detach `child` from the dependents of the mapped-list mirror
    /// `parent` and destroy it. Returns `true` when `parent` has no
    /// dependents left.
    pub(crate) fn detach_from_mapped_array(
        parent: ArrayNodeId,
        child: ArrayNodeId,
    ) -> Result<bool> {
        let emptied = Self::try_with(|rt| match rt.arrays.get_mut(parent) {
            Some(ArrayNode::Mapped(mapped)) => {
                detach(&mut mapped.dependents, child, "mapped list")
                    .map(|()| mapped.dependents.is_empty())
            }
            _ => Err(ReactiveError::invariant(format!(
                "{parent:?} is not a live mapped list"
            ))),
        });
        let emptied = emptied.transpose()?.unwrap_or(false);
        Self::free_array(child);
        Ok(emptied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RangePolicy;
    use crate::graph::{MappedNode, Payload};
    use smallvec::smallvec;
    use std::rc::Rc;

    fn sink_node() -> ValueNode {
        ValueNode::Sink(Rc::new(RefCell::new(|_: &Payload| {})))
    }

    #[test]
    fn stats_count_nodes_by_kind() {
        assert_eq!(Runtime::stats().total(), 0);

        let sink = Runtime::insert_value(sink_node());
        assert_eq!(Runtime::stats().sinks, 1);

        Runtime::free_value(sink);
        assert_eq!(Runtime::stats(), RuntimeStats::default());
    }

    #[test]
    fn configure_is_per_thread() {
        Runtime::configure(RuntimeConfig {
            range_policy: RangePolicy::Reject,
            dispatch_warn_threshold: None,
        });
        assert_eq!(Runtime::config().range_policy, RangePolicy::Reject);

        let other = std::thread::spawn(|| Runtime::config().range_policy)
            .join()
            .unwrap();
        assert_eq!(other, RangePolicy::Clamp);
    }

    #[test]
    fn detach_from_mapped_reports_emptiness() {
        let first = Runtime::insert_value(sink_node());
        let second = Runtime::insert_value(sink_node());
        let mapped = Runtime::insert_value(ValueNode::Mapped(MappedNode {
            mapper: Rc::new(|payload: &Payload| payload.clone()),
            value: Rc::new(0_i32),
            dependents: smallvec![first, second],
        }));

        assert!(!Runtime::detach_from_mapped(mapped, first).unwrap());
        assert!(Runtime::detach_from_mapped(mapped, second).unwrap());
        assert_eq!(Runtime::stats().sinks, 0);

        let err = Runtime::detach_from_mapped(mapped, first).unwrap_err();
        assert!(matches!(err, ReactiveError::InvariantViolation(_)));
    }
}

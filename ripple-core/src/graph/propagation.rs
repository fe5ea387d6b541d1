//! Propagation Engine
//!
//! Walks one change through the graph to every reachable sink.
//!
//! # Algorithm
//!
//! A mutation (`Cell::set`, `ReactiveList::append`, `ReactiveList::remove_range`)
//! seeds a FIFO queue with its direct dependents. The loop pops the front
//! item and dispatches on the node variant:
//!
//! 1. Sinks perform their side effect. Nothing is enqueued.
//! 2. Mapped nodes recompute their cached value and enqueue their own
//!    dependents with the new payload.
//! 3. Zip stubs overwrite their slot in the shared context, recompute the
//!    whole zipped value, and enqueue the context's dependents.
//!
//! The queue is breadth-first, so every node at distance `k` from the
//! mutation is updated before any node at distance `k + 1`. The queue is
//! drained before the mutating call returns.
//!
//! A node may be unregistered by a sink while items addressed to it are
//! still queued; such items are skipped.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, error, trace, trace_span, warn};

use super::node::{
    ArrayNode, ArrayNodeId, Dependents, ErasedMapper, ErasedRangeSink, ErasedSink, ErasedZipper,
    NodeId, Payload, Projection, ValueNode, ZipId,
};
use crate::reactive::{Runtime, Scope};

/// A structural change to an ordered collection.
#[derive(Clone)]
pub(crate) enum ArrayChange {
    /// One element appended at the tail.
    Insert(Payload),

    /// `[start, start + count)` removed. Already resolved against the
    /// source length.
    Remove { start: usize, count: usize },
}

/// What to do for one value-node dispatch, captured while the arena is
/// borrowed and executed after the borrow is released.
enum ValueStep {
    Sink(ErasedSink),
    Mapped(ErasedMapper),
    Zipped(ErasedZipper, Vec<Payload>, ZipId),
}

enum ArrayStep {
    Range(Rc<RefCell<dyn ErasedRangeSink>>),
    Mapped(Rc<RefCell<dyn Projection>>),
}

/// Counts dispatches of one pass and warns past the configured threshold.
struct PassBudget {
    dispatched: usize,
    warn_at: Option<usize>,
    warned: bool,
}

impl PassBudget {
    fn new() -> Self {
        Self {
            dispatched: 0,
            warn_at: Runtime::with(|rt| rt.config.dispatch_warn_threshold),
            warned: false,
        }
    }

    fn tick(&mut self) {
        self.dispatched += 1;
        if let Some(limit) = self.warn_at {
            if !self.warned && self.dispatched > limit {
                self.warned = true;
                warn!(limit, "propagation pass exceeded dispatch threshold");
            }
        }
    }
}

/// Deliver `payload` to `seeds` and everything downstream of them.
pub(crate) fn propagate(seeds: &[NodeId], payload: Payload) {
    let _span = trace_span!("propagate", seeds = seeds.len()).entered();
    let mut budget = PassBudget::new();
    let mut queue: VecDeque<(Payload, NodeId)> =
        seeds.iter().map(|&node| (payload.clone(), node)).collect();

    while let Some((payload, node)) = queue.pop_front() {
        budget.tick();

        let step = Runtime::with(|rt| {
            let step = match rt.values.get(node)? {
                ValueNode::Sink(sink) => ValueStep::Sink(sink.clone()),
                ValueNode::Mapped(mapped) => ValueStep::Mapped(mapped.mapper.clone()),
                ValueNode::Zipped { index, context } => {
                    let (index, context) = (*index, *context);
                    let ctx = rt.contexts.get_mut(context)?;
                    ctx.source_values[index] = payload.clone();
                    ValueStep::Zipped(ctx.zipper.clone(), ctx.source_values.clone(), context)
                }
            };
            Some(step)
        });

        let Some(step) = step else {
            trace!(?node, "skipping detached node");
            continue;
        };

        match step {
            ValueStep::Sink(sink) => {
                trace!(?node, "dispatch sink");
                let mut update = sink.borrow_mut();
                (&mut *update)(&payload);
            }
            ValueStep::Mapped(mapper) => {
                trace!(?node, "dispatch mapped");
                let next = mapper(&payload);
                let dependents = Runtime::with(|rt| match rt.values.get_mut(node) {
                    Some(ValueNode::Mapped(mapped)) => {
                        mapped.value = next.clone();
                        mapped.dependents.clone()
                    }
                    _ => Dependents::new(),
                });
                queue.extend(dependents.into_iter().map(|dep| (next.clone(), dep)));
            }
            ValueStep::Zipped(zipper, values, context) => {
                trace!(?node, ?context, "dispatch zipped");
                let next = zipper(&values);
                let dependents = Runtime::with(|rt| match rt.contexts.get_mut(context) {
                    Some(ctx) => {
                        ctx.value = Some(next.clone());
                        ctx.dependents.clone()
                    }
                    None => Dependents::new(),
                });
                queue.extend(dependents.into_iter().map(|dep| (next.clone(), dep)));
            }
        }
    }

    debug!(dispatched = budget.dispatched, "value propagation drained");
}

/// Deliver a structural change to `seeds` and everything downstream.
pub(crate) fn propagate_array(seeds: &[ArrayNodeId], change: ArrayChange) {
    let _span = trace_span!("propagate_array", seeds = seeds.len()).entered();
    let mut budget = PassBudget::new();
    let mut queue: VecDeque<(ArrayChange, ArrayNodeId)> =
        seeds.iter().map(|&node| (change.clone(), node)).collect();

    while let Some((change, node)) = queue.pop_front() {
        budget.tick();

        let step = Runtime::with(|rt| {
            rt.arrays.get(node).map(|entry| match entry {
                ArrayNode::Range(range) => ArrayStep::Range(range.sink.clone()),
                ArrayNode::Mapped(mapped) => ArrayStep::Mapped(mapped.projection.clone()),
            })
        });

        let Some(step) = step else {
            trace!(?node, "skipping detached array node");
            continue;
        };

        match (step, change) {
            (ArrayStep::Range(sink), ArrayChange::Insert(elem)) => {
                trace!(?node, "insert into range");
                let mut scope = Scope::default();
                sink.borrow_mut().insert(&elem, &mut scope);
                let orphan = Runtime::with(|rt| match rt.arrays.get_mut(node) {
                    Some(ArrayNode::Range(range)) => {
                        range.scopes.push(scope);
                        None
                    }
                    _ => Some(scope),
                });
                if let Some(scope) = orphan {
                    release_scopes(node, vec![scope]);
                }
            }
            (ArrayStep::Range(sink), ArrayChange::Remove { start, count }) => {
                trace!(?node, start, count, "remove from range");
                let removed = Runtime::with(|rt| match rt.arrays.get_mut(node) {
                    Some(ArrayNode::Range(range)) => {
                        let end = start.saturating_add(count).min(range.scopes.len());
                        range.scopes.drain(start.min(end)..end).collect()
                    }
                    _ => Vec::new(),
                });
                release_scopes(node, removed);
                sink.borrow_mut().remove(start, count);
            }
            (ArrayStep::Mapped(projection), ArrayChange::Insert(elem)) => {
                trace!(?node, "insert into mapped list");
                let next = projection.borrow_mut().push(&elem);
                let dependents = array_dependents(node);
                queue.extend(
                    dependents
                        .into_iter()
                        .map(|dep| (ArrayChange::Insert(next.clone()), dep)),
                );
            }
            (ArrayStep::Mapped(projection), ArrayChange::Remove { start, count }) => {
                trace!(?node, start, count, "remove from mapped list");
                projection.borrow_mut().remove(start, count);
                let dependents = array_dependents(node);
                queue.extend(
                    dependents
                        .into_iter()
                        .map(|dep| (ArrayChange::Remove { start, count }, dep)),
                );
            }
        }
    }

    debug!(dispatched = budget.dispatched, "array propagation drained");
}

fn array_dependents(node: ArrayNodeId) -> Dependents<ArrayNodeId> {
    Runtime::with(|rt| match rt.arrays.get(node) {
        Some(ArrayNode::Mapped(mapped)) => mapped.dependents.clone(),
        _ => Dependents::new(),
    })
}

fn release_scopes(node: ArrayNodeId, scopes: Vec<Scope>) {
    for scope in scopes {
        if let Err(err) = scope.release() {
            error!(%err, ?node, "failed to release element scope");
        }
    }
}

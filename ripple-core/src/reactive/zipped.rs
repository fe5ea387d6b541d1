//! Zipped Value Implementation
//!
//! A zipped value combines `N` sources with a zipper function. All of its
//! upstream state lives in one shared zip context: the last value seen from
//! each source, the zipper, the cached result and the downstream nodes.
//!
//! # How Zipped Values Work
//!
//! 1. The first registration creates and publishes the context, then
//!    registers one stub node per source, in source order. Each stub factory pushes its
//!    source's current value into the context, so slot `i` always belongs
//!    to source `i`.
//!
//! 2. Once every stub exists the zipper runs once, the result is cached
//!    and the caller's factory is built from it. A registration made from
//!    inside that factory attaches to the same context.
//!
//! 3. When source `i` changes its stub overwrites slot `i` and the whole
//!    value is recomputed from all slots.
//!
//! 4. When the last downstream node unregisters, every stub is unregistered
//!    from its source and the context is discarded.
//!
//! Sources of different types are supported through [`zip2`] and [`zip3`].

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::{debug, error};

use super::runtime::Runtime;
use super::value::{ErasedSource, NodeFactory, ReactiveValue};
use crate::error::{ReactiveError, Result};
use crate::graph::{
    downcast, Dependents, ErasedZipper, NodeId, Payload, ValueNode, ZipContext, ZipId,
};

/// Upstream registrations of a live zipped value.
struct LiveZip {
    context: ZipId,
    /// `stubs[i]` is registered on `sources[i]`.
    stubs: Vec<NodeId>,
}

struct ZippedInner<Out> {
    sources: Vec<Rc<dyn ErasedSource>>,
    zipper: ErasedZipper,
    state: RefCell<Option<LiveZip>>,
    _out: PhantomData<fn() -> Out>,
}

/// A value derived from several sources at once.
///
/// # Example
///
/// ```rust
/// use ripple_core::{zip2, Cell, ReactiveValue};
///
/// let first = Cell::new("a".to_string());
/// let second = Cell::new("b".to_string());
/// let joined = zip2(first.clone(), second, |x: &String, y: &String| format!("{x}{y}"));
///
/// first.set("x".to_string());
/// assert_eq!(joined.read(), "xb");
/// ```
pub struct ZippedValue<Out> {
    inner: Rc<ZippedInner<Out>>,
}

impl<Out> ZippedValue<Out>
where
    Out: Clone + 'static,
{
    /// Zip sources of one value type. The zipper receives the values in
    /// the order of `sources`.
    pub fn new<R, T, Z>(sources: Vec<R>, zipper: Z) -> Self
    where
        R: ReactiveValue<Value = T> + 'static,
        T: Clone + 'static,
        Z: Fn(&[T]) -> Out + 'static,
    {
        let sources = sources
            .into_iter()
            .map(|source| Rc::new(source) as Rc<dyn ErasedSource>)
            .collect();
        let zipper: ErasedZipper = Rc::new(move |values: &[Payload]| {
            let values: Vec<T> = values.iter().map(|value| downcast::<T>(value).clone()).collect();
            Rc::new(zipper(&values)) as Payload
        });
        Self::from_erased(sources, zipper)
    }

    fn from_erased(sources: Vec<Rc<dyn ErasedSource>>, zipper: ErasedZipper) -> Self {
        Self {
            inner: Rc::new(ZippedInner {
                sources,
                zipper,
                state: RefCell::new(None),
                _out: PhantomData,
            }),
        }
    }

    /// Whether the upstream stubs currently exist.
    pub fn is_live(&self) -> bool {
        self.inner.state.borrow().is_some()
    }

    /// Number of downstream nodes sharing the context.
    pub fn dependent_count(&self) -> usize {
        self.context()
            .and_then(|context| {
                Runtime::with(|rt| rt.contexts.get(context).map(|ctx| ctx.dependents.len()))
            })
            .unwrap_or(0)
    }

    fn context(&self) -> Option<ZipId> {
        self.inner.state.borrow().as_ref().map(|live| live.context)
    }

    /// The cached result. `None` while cold, and while the stubs of a new
    /// context are still being registered.
    fn cached(&self) -> Option<Payload> {
        let context = self.context()?;
        Runtime::with(|rt| rt.contexts.get(context).and_then(|ctx| ctx.value.clone()))
    }

    fn compute(&self) -> Payload {
        let values: Vec<Payload> = self
            .inner
            .sources
            .iter()
            .map(|source| source.read_payload())
            .collect();
        (self.inner.zipper)(&values)
    }

    fn register_live(
        &self,
        context: ZipId,
        cached: Payload,
        factory: NodeFactory<'_, Out>,
    ) -> NodeId {
        let child = factory(downcast::<Out>(&cached));
        let attached = Runtime::with(|rt| match rt.contexts.get_mut(context) {
            Some(ctx) => {
                ctx.dependents.push(child);
                true
            }
            None => false,
        });
        if !attached {
            error!(?context, ?child, "zip context vanished during registration");
        }
        child
    }

    fn register_cold(&self, factory: NodeFactory<'_, Out>) -> NodeId {
        let context = Runtime::with(|rt| {
            rt.contexts.insert(ZipContext {
                source_values: Vec::with_capacity(self.inner.sources.len()),
                zipper: self.inner.zipper.clone(),
                value: None,
                dependents: Dependents::new(),
            })
        });
        *self.inner.state.borrow_mut() = Some(LiveZip {
            context,
            stubs: Vec::new(),
        });

        let stubs: Vec<NodeId> = self
            .inner
            .sources
            .iter()
            .enumerate()
            .map(|(index, source)| {
                source.register_payload(Box::new(move |value: Payload| {
                    Runtime::with(|rt| {
                        if let Some(ctx) = rt.contexts.get_mut(context) {
                            ctx.source_values.push(value);
                        }
                        rt.values.insert(ValueNode::Zipped { index, context })
                    })
                }))
            })
            .collect();
        debug!(?context, sources = stubs.len(), "zipped value went live");
        if let Some(live) = self.inner.state.borrow_mut().as_mut() {
            live.stubs = stubs;
        }

        let values = Runtime::with(|rt| {
            rt.contexts
                .get(context)
                .map(|ctx| ctx.source_values.clone())
                .unwrap_or_default()
        });
        let value = (self.inner.zipper)(&values);
        Runtime::with(|rt| {
            if let Some(ctx) = rt.contexts.get_mut(context) {
                ctx.value = Some(value.clone());
            }
        });
        self.register_live(context, value, factory)
    }

    fn go_cold(&self, live: LiveZip) -> Result<()> {
        let mut outcome = Ok(());
        for (source, stub) in self.inner.sources.iter().zip(live.stubs) {
            let result = source.unregister_node(stub);
            if outcome.is_ok() {
                outcome = result;
            }
        }
        Runtime::free_context(live.context);
        debug!(context = ?live.context, "zipped value went cold");
        outcome
    }
}

impl<Out> ReactiveValue for ZippedValue<Out>
where
    Out: Clone + 'static,
{
    type Value = Out;

    fn read(&self) -> Out {
        let value = self.cached().unwrap_or_else(|| self.compute());
        downcast::<Out>(&value).clone()
    }

    fn register(&self, factory: NodeFactory<'_, Out>) -> NodeId {
        let Some(context) = self.context() else {
            return self.register_cold(factory);
        };
        let value = self.cached().unwrap_or_else(|| self.compute());
        self.register_live(context, value, factory)
    }

    fn unregister(&self, node: NodeId) -> Result<()> {
        let context = self.context().ok_or_else(|| {
            ReactiveError::invariant(format!("unregister of {node:?} on a cold zipped value"))
        })?;

        if Runtime::detach_from_context(context, node)? {
            let live = self.inner.state.borrow_mut().take();
            if let Some(live) = live {
                self.go_cold(live)?;
            }
        }
        Ok(())
    }
}

impl<Out> Clone for ZippedValue<Out> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<Out> fmt::Debug for ZippedValue<Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ZippedValue")
            .field("sources", &self.inner.sources.len())
            .field("context", &state.as_ref().map(|live| live.context))
            .finish()
    }
}

/// Zip two sources of possibly different types.
pub fn zip2<A, B, Out, Z>(a: A, b: B, zipper: Z) -> ZippedValue<Out>
where
    A: ReactiveValue + 'static,
    B: ReactiveValue + 'static,
    Out: Clone + 'static,
    Z: Fn(&A::Value, &B::Value) -> Out + 'static,
{
    let sources = vec![
        Rc::new(a) as Rc<dyn ErasedSource>,
        Rc::new(b) as Rc<dyn ErasedSource>,
    ];
    let zipper: ErasedZipper = Rc::new(move |values: &[Payload]| {
        Rc::new(zipper(
            downcast::<A::Value>(&values[0]),
            downcast::<B::Value>(&values[1]),
        )) as Payload
    });
    ZippedValue::from_erased(sources, zipper)
}

/// Zip three sources of possibly different types.
pub fn zip3<A, B, C, Out, Z>(a: A, b: B, c: C, zipper: Z) -> ZippedValue<Out>
where
    A: ReactiveValue + 'static,
    B: ReactiveValue + 'static,
    C: ReactiveValue + 'static,
    Out: Clone + 'static,
    Z: Fn(&A::Value, &B::Value, &C::Value) -> Out + 'static,
{
    let sources = vec![
        Rc::new(a) as Rc<dyn ErasedSource>,
        Rc::new(b) as Rc<dyn ErasedSource>,
        Rc::new(c) as Rc<dyn ErasedSource>,
    ];
    let zipper: ErasedZipper = Rc::new(move |values: &[Payload]| {
        Rc::new(zipper(
            downcast::<A::Value>(&values[0]),
            downcast::<B::Value>(&values[1]),
            downcast::<C::Value>(&values[2]),
        )) as Payload
    });
    ZippedValue::from_erased(sources, zipper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Cell, ReactiveValueExt};

    fn concat(a: &String, b: &String) -> String {
        format!("{a}{b}")
    }

    fn last_value<T: Clone + 'static>(
        log: &Rc<RefCell<Vec<T>>>,
    ) -> impl FnOnce(&T) -> Box<dyn FnMut(&T)> {
        let log = log.clone();
        move |_: &T| -> Box<dyn FnMut(&T)> {
            Box::new(move |value: &T| log.borrow_mut().push(value.clone()))
        }
    }

    #[test]
    fn zip_recomputes_when_any_input_changes() {
        let a = Cell::new("a".to_string());
        let b = Cell::new("b".to_string());
        let zipped = zip2(a.clone(), b.clone(), concat);

        let log = Rc::new(RefCell::new(Vec::new()));
        let _subscription = zipped.subscribe(last_value(&log));
        assert_eq!(zipped.read(), "ab");

        a.set("x".into());
        assert_eq!(zipped.read(), "xb");
        b.set("y".into());
        assert_eq!(zipped.read(), "xy");
        assert_eq!(*log.borrow(), vec!["xb", "xy"]);
    }

    #[test]
    fn argument_order_follows_source_order() {
        let cells: Vec<Cell<i32>> = (1..=3).map(Cell::new).collect();
        let zipped = ZippedValue::new(cells.clone(), |values: &[i32]| {
            values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
        });

        let log = Rc::new(RefCell::new(Vec::new()));
        let _subscription = zipped.subscribe(last_value(&log));
        cells[2].set(30);
        cells[0].set(10);

        assert_eq!(*log.borrow(), vec!["1,2,30", "10,2,30"]);
    }

    #[test]
    fn downstream_registrations_share_the_context() {
        let a = Cell::new(1);
        let b = Cell::new(2);
        let sum = zip2(a.clone(), b.clone(), |x: &i32, y: &i32| x + y);

        let first = sum.subscribe(|_: &i32| |_: &i32| {});
        let second = sum.subscribe(|_: &i32| |_: &i32| {});
        assert_eq!(a.dependent_count(), 1);
        assert_eq!(b.dependent_count(), 1);
        assert_eq!(sum.dependent_count(), 2);
        assert_eq!(Runtime::stats().zip_contexts, 1);

        drop(first);
        assert!(sum.is_live());
        drop(second);
        assert!(!sum.is_live());
        assert_eq!(a.dependent_count(), 0);
        assert_eq!(b.dependent_count(), 0);
        assert_eq!(Runtime::stats().total(), 0);
    }

    #[test]
    fn cold_zip_rebuilds_from_current_sources() {
        let a = Cell::new(1);
        let b = Cell::new(1);
        let product = zip2(a.clone(), b.clone(), |x: &i32, y: &i32| x * y);

        let subscription = product.subscribe(|_: &i32| |_: &i32| {});
        subscription.unsubscribe().unwrap();
        a.set(6);
        b.set(7);

        let initial = Rc::new(RefCell::new(0));
        let slot = initial.clone();
        let _subscription = product.subscribe(move |value: &i32| {
            *slot.borrow_mut() = *value;
            |_: &i32| {}
        });
        assert_eq!(*initial.borrow(), 42);
    }

    #[test]
    fn zip3_mixes_types() {
        let name = Cell::new("item".to_string());
        let count = Cell::new(2_u32);
        let visible = Cell::new(true);
        let label = zip3(
            name,
            count.clone(),
            visible.clone(),
            |n: &String, c: &u32, v: &bool| {
                if *v {
                    format!("{n} x{c}")
                } else {
                    String::new()
                }
            },
        );

        let log = Rc::new(RefCell::new(Vec::new()));
        let _subscription = label.subscribe(last_value(&log));
        count.set(3);
        visible.set(false);
        assert_eq!(*log.borrow(), vec!["item x3".to_string(), String::new()]);
    }

    #[test]
    fn zipping_derived_values() {
        let base = Cell::new(1);
        let zipped = zip2(
            base.map(|n: &i32| n + 1),
            base.map(|n: &i32| n * 10),
            |x: &i32, y: &i32| (*x, *y),
        );

        let log = Rc::new(RefCell::new(Vec::new()));
        let _subscription = zipped.subscribe(last_value(&log));
        base.set(2);

        // One dispatch per input; the second carries the settled value.
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(log.borrow().last(), Some(&(3, 20)));
        assert_eq!(zipped.read(), (3, 20));
    }

    #[test]
    fn unregister_on_cold_zip_fails() {
        let zipped = zip2(Cell::new(0), Cell::new(0), |x: &i32, y: &i32| x + y);
        let node = zipped.register_sink(|_: &i32| |_: &i32| {});
        zipped.unregister(node).unwrap();

        let err = zipped.unregister(node).unwrap_err();
        assert!(matches!(err, ReactiveError::InvariantViolation(_)));
    }

    #[test]
    fn registering_from_inside_a_factory_shares_the_context() {
        let a = Cell::new("a".to_string());
        let b = Cell::new("b".to_string());
        let joined = zip2(a.clone(), b.clone(), concat);

        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = Rc::new(std::cell::Cell::new(None));
        let (reentrant, slot) = (joined.clone(), inner.clone());
        let inner_factory = last_value(&log);
        let outer = joined.register_sink(move |initial: &String| {
            assert_eq!(initial, "ab");
            slot.set(Some(reentrant.register_sink(inner_factory)));
            |_: &String| {}
        });
        assert_eq!(a.dependent_count(), 1);
        assert_eq!(b.dependent_count(), 1);
        assert_eq!(joined.dependent_count(), 2);
        assert_eq!(Runtime::stats().zip_contexts, 1);

        b.set("c".into());
        assert_eq!(*log.borrow(), vec!["ac"]);

        let inner = inner.get().expect("inner sink registered");
        joined.unregister(inner).unwrap();
        joined.unregister(outer).unwrap();
        assert!(!joined.is_live());
        assert_eq!(Runtime::stats().total(), 0);
    }
}

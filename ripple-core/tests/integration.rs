//! Integration Tests for the Reactive Graph
//!
//! These tests drive cells, derived values and lists together through the
//! public API, the way a rendering layer would.

use std::cell::RefCell;
use std::rc::Rc;

use ripple_core::{
    when, zip2, Cell, Element, RangeSink, ReactiveCollection, ReactiveCollectionExt,
    ReactiveError, ReactiveList, ReactiveValue, ReactiveValueExt, Runtime, RuntimeConfig, Scope,
    Subscription, ZippedValue,
};

/// A sink factory that ignores the initial value and records every update.
fn record<T: Clone + 'static>(
    log: &Rc<RefCell<Vec<T>>>,
) -> impl FnOnce(&T) -> Box<dyn FnMut(&T)> {
    let log = log.clone();
    move |_: &T| -> Box<dyn FnMut(&T)> {
        Box::new(move |value: &T| log.borrow_mut().push(value.clone()))
    }
}

/// A range sink that keeps a plain copy of the range it renders.
struct Rendered<T> {
    items: Rc<RefCell<Vec<T>>>,
}

impl<T: Clone> RangeSink<T> for Rendered<T> {
    fn on_insert(&mut self, elem: &T, _scope: &mut Scope) {
        self.items.borrow_mut().push(elem.clone());
    }

    fn on_remove(&mut self, start: usize, count: usize) {
        self.items.borrow_mut().drain(start..start + count);
    }
}

fn render<C>(collection: &C) -> (Rc<RefCell<Vec<C::Item>>>, Subscription)
where
    C: ReactiveCollectionExt,
{
    let items = Rc::new(RefCell::new(Vec::new()));
    let sink_items = items.clone();
    let subscription = collection
        .subscribe_range(move |_: &[C::Item]| Rendered { items: sink_items })
        .unwrap();
    (items, subscription)
}

/// Test that setting an equal value still reaches the sink.
#[test]
fn mapped_sink_receives_every_set() {
    let cell = Cell::new(0);
    let doubled = cell.map(|n: &i32| n * 2);

    let log = Rc::new(RefCell::new(Vec::new()));
    let _subscription = doubled.subscribe(record(&log));

    cell.set(5);
    assert_eq!(*log.borrow(), vec![10]);
    cell.set(5);
    assert_eq!(*log.borrow(), vec![10, 10]);
    assert_eq!(cell.read(), 5);
}

/// Test the uppercase mapped list scenario end to end.
#[test]
fn mapped_list_tracks_appends_and_removals() {
    let list = ReactiveList::new(Vec::<String>::new());
    let upper = list.map(|s: &String| s.to_uppercase());
    let (rendered, _subscription) = render(&upper);

    list.append("a".into());
    list.append("b".into());
    assert_eq!(upper.read(), vec!["A", "B"]);

    let removed = list.remove_range(0, 1).unwrap();
    assert_eq!(removed, vec!["a"]);
    assert_eq!(upper.read(), vec!["B"]);
    assert_eq!(*rendered.borrow(), vec!["B"]);
    assert_eq!(list.length().read(), 1);
}

/// Test that a zip recomputes from all inputs when one changes.
#[test]
fn zip_of_two_cells() {
    let a = Cell::new("a".to_string());
    let b = Cell::new("b".to_string());
    let zipped =
        ZippedValue::new(vec![a.clone(), b.clone()], |values: &[String]| values.concat());

    let log = Rc::new(RefCell::new(Vec::new()));
    let _subscription = zipped.subscribe(record(&log));
    assert_eq!(zipped.read(), "ab");

    a.set("x".into());
    assert_eq!(zipped.read(), "xb");
    assert_eq!(*log.borrow(), vec!["xb"]);
}

/// Test that derived values chained several levels deep stay consistent.
#[test]
fn deep_chain_matches_composed_mapper() {
    let cell = Cell::new(1_i64);
    let mut level = cell.map(|n: &i64| n + 1).into_dyn();
    for _ in 0..8 {
        level = level.map(|n: &i64| n * 2 + 1).into_dyn();
    }

    let log = Rc::new(RefCell::new(Vec::new()));
    let _subscription = level.subscribe(record(&log));

    let composed = |seed: i64| (0..8).fold(seed + 1, |n, _| n * 2 + 1);
    for seed in [3, -7, 0, 3] {
        cell.set(seed);
        assert_eq!(level.read(), composed(seed));
    }
    assert_eq!(*log.borrow(), vec![composed(3), composed(-7), composed(0), composed(3)]);
    assert_eq!(cell.dependent_count(), 1);
}

/// Test that tearing down and re-registering never serves a stale cache.
#[test]
fn cold_derived_values_recompute_from_current_state() {
    let first = Cell::new(1);
    let second = Cell::new(2);
    let sum = zip2(first.clone(), second.clone(), |x: &i32, y: &i32| x + y);
    let label = sum.map(|n: &i32| format!("total {n}"));

    let subscription = label.subscribe(|_: &String| |_: &String| {});
    assert!(sum.is_live());
    subscription.unsubscribe().unwrap();
    assert!(!label.is_live());
    assert!(!sum.is_live());
    assert_eq!(first.dependent_count(), 0);

    first.set(40);
    let initial = Rc::new(RefCell::new(String::new()));
    let slot = initial.clone();
    let _subscription = label.subscribe(move |value: &String| {
        *slot.borrow_mut() = value.clone();
        |_: &String| {}
    });
    assert_eq!(*initial.borrow(), "total 42");
}

/// A to-do item as a renderer would see it.
#[derive(Clone)]
struct Todo {
    title: Cell<String>,
    tags: ReactiveList<String>,
}

impl Element for Todo {}

impl Todo {
    fn new(title: &str, tags: &[&str]) -> Self {
        Self {
            title: Cell::new(title.to_string()),
            tags: ReactiveList::new(tags.iter().map(|t| t.to_string()).collect()),
        }
    }
}

/// Renders each to-do's title and its tag list, both as nested
/// subscriptions held in the element's scope.
struct TodoRenderer {
    titles: Rc<RefCell<Vec<Rc<RefCell<String>>>>>,
}

impl RangeSink<Todo> for TodoRenderer {
    fn on_insert(&mut self, todo: &Todo, scope: &mut Scope) {
        let text = Rc::new(RefCell::new(String::new()));
        let target = text.clone();
        scope.hold(
            todo.title
                .observe(move |title: &String| *target.borrow_mut() = title.clone()),
        );
        scope.hold(
            todo.tags
                .subscribe_range(|_: &[String]| Rendered {
                    items: Rc::new(RefCell::new(Vec::new())),
                })
                .unwrap(),
        );
        self.titles.borrow_mut().push(text);
    }

    fn on_remove(&mut self, start: usize, count: usize) {
        self.titles.borrow_mut().drain(start..start + count);
    }
}

/// Test that removing an element releases everything it subscribed to,
/// including nested range subscriptions.
#[test]
fn removal_tears_down_nested_subscriptions() {
    let todos = ReactiveList::new(vec![
        Todo::new("write", &["docs"]),
        Todo::new("ship", &[]),
    ]);
    let first = todos.read()[0].clone();
    let second = todos.read()[1].clone();

    let titles = Rc::new(RefCell::new(Vec::new()));
    let sink_titles = titles.clone();
    let subscription = todos
        .subscribe_range(move |_: &[Todo]| TodoRenderer { titles: sink_titles })
        .unwrap();
    assert_eq!(first.title.dependent_count(), 1);
    assert_eq!(first.tags.dependent_count(), 1);

    second.title.set("ship it".into());
    assert_eq!(*titles.borrow()[1].borrow(), "ship it");

    todos.remove_range(0, 1).unwrap();
    assert_eq!(first.title.dependent_count(), 0);
    assert_eq!(first.tags.dependent_count(), 0);
    assert_eq!(titles.borrow().len(), 1);

    first.title.set("ignored".into());
    assert_eq!(*titles.borrow()[0].borrow(), "ship it");

    subscription.unsubscribe().unwrap();
    assert_eq!(second.title.dependent_count(), 0);
    assert_eq!(Runtime::stats().total(), 0);
}

/// Test that lists of lists are rejected before anything is registered.
#[test]
fn nested_collections_are_rejected() {
    let rows = ReactiveList::new(vec![
        ReactiveList::new(vec![1, 2]),
        ReactiveList::new(vec![3]),
    ]);
    let err = rows
        .register_range_sink(|_: &[ReactiveList<i32>]| Rendered {
            items: Rc::new(RefCell::new(Vec::new())),
        })
        .unwrap_err();

    assert!(matches!(err, ReactiveError::NestedCollection { .. }));
    assert_eq!(rows.dependent_count(), 0);
}

/// Test that nesting is detected from the element type alone, whether the
/// list is empty or holds shared handles to lists.
#[test]
fn nested_collections_are_rejected_by_type() {
    let empty = ReactiveList::<ReactiveList<u8>>::default();
    assert!(matches!(
        empty.subscribe_range(|_: &[ReactiveList<u8>]| Rendered {
            items: Rc::new(RefCell::new(Vec::new())),
        }),
        Err(ReactiveError::NestedCollection { .. })
    ));

    let shared = ReactiveList::new(vec![Rc::new(ReactiveList::new(vec![1]))]);
    let mapped = shared.map(|inner: &Rc<ReactiveList<i32>>| inner.clone().into_dyn());
    assert!(matches!(
        mapped.register_range_sink(|_: &[Rc<dyn ReactiveCollection<Item = i32>>]| Rendered {
            items: Rc::new(RefCell::new(Vec::new())),
        }),
        Err(ReactiveError::NestedCollection { .. })
    ));
    assert!(!mapped.is_live());
}

/// Test that a renderer may subscribe to the value it is being built from.
#[test]
fn factories_may_subscribe_to_their_own_source() {
    let count = Cell::new(1);
    let label = count.map(|n: &i32| format!("{n} items"));

    let nested: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
    let (reentrant, slot) = (label.clone(), nested.clone());
    let outer = label.subscribe(move |_: &String| {
        *slot.borrow_mut() = Some(reentrant.observe(|_: &String| {}));
        |_: &String| {}
    });
    assert_eq!(count.dependent_count(), 1);
    assert_eq!(label.dependent_count(), 2);

    let inner = nested.borrow_mut().take();
    drop(inner);
    drop(outer);
    assert_eq!(count.dependent_count(), 0);
    assert_eq!(Runtime::stats().total(), 0);
}

/// Test that a JSON-configured reject policy refuses out-of-bounds ranges.
#[test]
fn configured_reject_policy() {
    Runtime::configure(RuntimeConfig::from_json(r#"{ "range_policy": "reject" }"#).unwrap());

    let list = ReactiveList::new(vec![1, 2, 3]);
    let (rendered, _subscription) = render(&list);

    let err = list.remove_range(1, 5).unwrap_err();
    assert!(matches!(err, ReactiveError::RangeOutOfBounds { len: 3, .. }));
    assert_eq!(list.read(), vec![1, 2, 3]);
    assert_eq!(*rendered.borrow(), vec![1, 2, 3]);
}

/// Test that the list length is an ordinary reactive value.
#[test]
fn length_drives_scalar_sinks() {
    let list = ReactiveList::new(vec!['a']);
    let empty = list.length().map(|n: &usize| *n == 0);
    let status = when(empty, "empty".to_string(), "has items".to_string());

    let log = Rc::new(RefCell::new(Vec::new()));
    let _subscription = status.subscribe(record(&log));

    list.remove_range(0, 1).unwrap();
    list.append('b');
    assert_eq!(*log.borrow(), vec!["empty", "has items"]);
}

/// Test that sinks can register new subscriptions mid-propagation.
#[test]
fn sinks_may_subscribe_during_propagation() {
    let trigger = Cell::new(0);
    let other = Cell::new(100);
    let held: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

    let other_for_sink = other.clone();
    let held_for_sink = held.clone();
    let _subscription = trigger.subscribe(move |_: &i32| {
        move |_: &i32| {
            let subscription = other_for_sink.subscribe(|_: &i32| |_: &i32| {});
            held_for_sink.borrow_mut().push(subscription);
        }
    });

    trigger.set(1);
    trigger.set(2);
    assert_eq!(other.dependent_count(), 2);

    held.borrow_mut().clear();
    assert_eq!(other.dependent_count(), 0);
}

/// Test that runtime statistics are serializable for diagnostics.
#[test]
fn stats_serialize_to_json() {
    let cell = Cell::new(1);
    let _subscription = cell.map(|n: &i32| n + 1).subscribe(|_: &i32| |_: &i32| {});

    let stats = Runtime::stats();
    assert_eq!(stats.sinks, 1);
    assert_eq!(stats.mapped_values, 1);

    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["sinks"], 1);
    assert_eq!(json["mapped_values"], 1);
}

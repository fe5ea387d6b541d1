//! Collection Registration API
//!
//! Ordered collections mirror the scalar API: read the elements, register
//! an array node built from them, unregister it again. Their length is
//! exposed as a read-only cell so that scalar consumers can follow it.
//!
//! Range sinks are the collection equivalent of sinks. Each element a range
//! sink materializes gets its own [`Scope`]; removing the element releases
//! the scope, which unregisters whatever the element subscribed to.
//!
//! Collection elements implement [`Element`]. Reactive collections report
//! themselves through it, so a list of lists is refused when a range sink
//! registers on it.

use std::any::type_name;
use std::cell::RefCell;
use std::rc::Rc;

use super::cell::ReadOnlyCell;
use super::mapped_list::MappedList;
use super::runtime::Runtime;
use super::sink::{RangeSink, RangeSinkAdapter, Scope, Subscription};
use crate::error::{ReactiveError, Result};
use crate::graph::{ArrayNode, ArrayNodeId, RangeNode};

/// Builds an array node from a collection's current elements and returns
/// its key.
pub type ArrayNodeFactory<'a, T> = Box<dyn FnOnce(&[T]) -> ArrayNodeId + 'a>;

/// A type that can be stored in a reactive collection.
///
/// Plain data keeps the default. Reactive collections set `IS_COLLECTION`,
/// and wrappers forward their inner type's answer.
///
/// ```rust
/// use ripple_core::Element;
///
/// #[derive(Clone)]
/// struct Row {
///     title: String,
/// }
///
/// impl Element for Row {}
/// ```
pub trait Element: 'static {
    const IS_COLLECTION: bool = false;
}

macro_rules! plain_elements {
    ($($ty:ty),* $(,)?) => {
        $(impl Element for $ty {})*
    };
}

plain_elements!(
    (), bool, char, f32, f64, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
    str, String, &'static str,
);

impl<T: 'static> Element for Vec<T> {}

impl<T: Element> Element for Option<T> {
    const IS_COLLECTION: bool = T::IS_COLLECTION;
}

impl<T: Element + ?Sized> Element for Box<T> {
    const IS_COLLECTION: bool = T::IS_COLLECTION;
}

impl<T: Element + ?Sized> Element for Rc<T> {
    const IS_COLLECTION: bool = T::IS_COLLECTION;
}

impl<T: Element + Clone> Element for dyn ReactiveCollection<Item = T> {
    const IS_COLLECTION: bool = true;
}

/// An ordered collection that array nodes can register with.
pub trait ReactiveCollection {
    type Item: Element + Clone;

    /// A snapshot of the current elements.
    fn read(&self) -> Vec<Self::Item>;

    /// The number of elements, as a reactive value.
    fn length(&self) -> ReadOnlyCell<usize>;

    /// Call `factory` with the current elements and append the node it
    /// returns to this collection's dependents.
    ///
    /// Implementations must call `factory` exactly once and return the key
    /// it produced.
    fn register(&self, factory: ArrayNodeFactory<'_, Self::Item>) -> ArrayNodeId;

    /// Remove `node` from this collection's dependents and destroy it.
    fn unregister(&self, node: ArrayNodeId) -> Result<()>;
}

impl<R> ReactiveCollection for Rc<R>
where
    R: ReactiveCollection + ?Sized,
{
    type Item = R::Item;

    fn read(&self) -> Vec<Self::Item> {
        (**self).read()
    }

    fn length(&self) -> ReadOnlyCell<usize> {
        (**self).length()
    }

    fn register(&self, factory: ArrayNodeFactory<'_, Self::Item>) -> ArrayNodeId {
        (**self).register(factory)
    }

    fn unregister(&self, node: ArrayNodeId) -> Result<()> {
        (**self).unregister(node)
    }
}

/// Range sinks, subscriptions and projections for every
/// [`ReactiveCollection`].
pub trait ReactiveCollectionExt: ReactiveCollection + Clone + 'static {
    /// Register a range sink.
    ///
    /// `factory` receives the current elements and builds an empty sink.
    /// Each current element is then delivered through
    /// [`RangeSink::on_insert`] in order, each with a fresh [`Scope`].
    ///
    /// Fails with [`ReactiveError::NestedCollection`] when the elements are
    /// themselves reactive collections.
    fn register_range_sink<S, F>(&self, factory: F) -> Result<ArrayNodeId>
    where
        F: FnOnce(&[Self::Item]) -> S,
        S: RangeSink<Self::Item> + 'static,
    {
        if <Self::Item as Element>::IS_COLLECTION {
            return Err(ReactiveError::NestedCollection {
                element: type_name::<Self::Item>(),
            });
        }

        Ok(self.register(Box::new(move |initial: &[Self::Item]| {
            let mut sink = factory(initial);
            let scopes = initial
                .iter()
                .map(|elem| {
                    let mut scope = Scope::default();
                    sink.on_insert(elem, &mut scope);
                    scope
                })
                .collect();

            Runtime::insert_array(ArrayNode::Range(RangeNode {
                sink: Rc::new(RefCell::new(RangeSinkAdapter::<Self::Item, S>::new(sink))),
                scopes,
            }))
        })))
    }

    /// Like [`register_range_sink`](Self::register_range_sink), but the
    /// registration is released when the returned guard is dropped.
    fn subscribe_range<S, F>(&self, factory: F) -> Result<Subscription>
    where
        F: FnOnce(&[Self::Item]) -> S,
        S: RangeSink<Self::Item> + 'static,
    {
        let node = self.register_range_sink(factory)?;
        let source = self.clone();
        Ok(Subscription::new(move || source.unregister(node)))
    }

    /// An index-aligned projection of this collection.
    fn map<U, M>(&self, mapper: M) -> MappedList<Self::Item, U>
    where
        U: Element + Clone,
        M: Fn(&Self::Item) -> U + 'static,
    {
        MappedList::new(self.clone(), mapper)
    }

    /// Erase the concrete collection type.
    fn into_dyn(self) -> Rc<dyn ReactiveCollection<Item = Self::Item>> {
        Rc::new(self)
    }
}

impl<R> ReactiveCollectionExt for R where R: ReactiveCollection + Clone + 'static {}

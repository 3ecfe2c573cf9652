use std::marker::PhantomData;

use crate::context::Context;
use crate::error::BoxError;
use crate::store::Store;

/// A unit of work performed against a context.
///
/// The consumer is taken by value, so it runs at most once. Implement this
/// for named job types; plain closures go through
/// `ContextSupplier::consume_and_complete` instead.
///
/// # Examples
///
/// ```
/// use context_core::{Context, ContextConsumer, ContextSupplier, MemoryStore, StoreError};
///
/// struct Publish {
///     item: &'static str,
/// }
///
/// impl ContextConsumer<MemoryStore> for Publish {
///     type Error = StoreError;
///
///     fn accept(self, ctx: &mut Context<MemoryStore>) -> Result<(), StoreError> {
///         let session = ctx.session_mut().expect("supplied contexts are open");
///         session.put(self.item, "published")
///     }
/// }
///
/// let store = MemoryStore::new();
/// ContextSupplier::new(store.clone())
///     .consume(Publish { item: "item-9" })
///     .unwrap();
/// assert_eq!(store.get("item-9").as_deref(), Some("published"));
/// ```
pub trait ContextConsumer<St: Store> {
    /// The failure this work can raise.
    type Error: Into<BoxError>;

    /// Performs the work.
    ///
    /// # Errors
    ///
    /// Any error returned aborts the context and is handed back to the
    /// caller as `Error::Callback`.
    fn accept(self, context: &mut Context<St>) -> Result<(), Self::Error>;
}

/// Adapts a closure to [`ContextConsumer`].
pub(crate) struct FnConsumer<F, E> {
    work: F,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> FnConsumer<F, E> {
    pub(crate) fn new(work: F) -> Self {
        Self {
            work,
            _error: PhantomData,
        }
    }
}

impl<St, F, E> ContextConsumer<St> for FnConsumer<F, E>
where
    St: Store,
    F: FnOnce(&mut Context<St>) -> Result<(), E>,
    E: Into<BoxError>,
{
    type Error = E;

    fn accept(self, context: &mut Context<St>) -> Result<(), E> {
        (self.work)(context)
    }
}

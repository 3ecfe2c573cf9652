use std::sync::Arc;

use crate::consumer::{ContextConsumer, FnConsumer};
use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::principal::Principal;
use crate::store::Store;

/// The configuration a supplier applies to every context it produces.
///
/// A plain value: the default is read-write, authorization-checked, and
/// with no user bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextConfig {
    /// Open contexts read-only
    pub read_only: bool,
    /// Disable authorization checks on produced contexts
    pub privileged: bool,
    /// User bound to produced contexts, if any
    pub user: Option<Arc<Principal>>,
}

impl ContextConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the current configuration of `context`.
    ///
    /// Works on open and finalized contexts alike.
    pub fn of<St: Store>(context: &Context<St>) -> Self {
        Self {
            read_only: context.is_read_only(),
            privileged: context.ignore_authorization(),
            user: context.current_user().cloned(),
        }
    }
}

/// Produces pre-configured contexts and runs work against them with
/// guaranteed finalization.
///
/// The supplier holds a store handle and a [`ContextConfig`]; it never
/// holds on to a context it produced.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use context_core::{ContextSupplier, Error, MemoryStore, Principal};
///
/// let store = MemoryStore::new();
/// let admin = Arc::new(Principal::new("admin-1", "Admin"));
///
/// let supplier = ContextSupplier::new(store.clone())
///     .with_privileged(true)
///     .with_user(Some(admin));
///
/// supplier
///     .consume_and_complete(|ctx| -> Result<(), Error> {
///         assert!(ctx.ignore_authorization());
///         ctx.session_mut()?.put("policy", "open-access")?;
///         Ok(())
///     })
///     .unwrap();
///
/// assert_eq!(store.get("policy").as_deref(), Some("open-access"));
/// ```
#[derive(Debug, Clone)]
pub struct ContextSupplier<St: Store> {
    store: St,
    config: ContextConfig,
}

impl<St: Store> ContextSupplier<St> {
    /// Creates a supplier with the default configuration.
    pub fn new(store: St) -> Self {
        Self::with_config(store, ContextConfig::default())
    }

    /// Creates a supplier with the given configuration.
    pub fn with_config(store: St, config: ContextConfig) -> Self {
        Self { store, config }
    }

    /// Creates a supplier configured like `context`, then finalizes it.
    ///
    /// The configuration is snapshotted first; the context is then
    /// completed, or aborted if completion fails. Passing an already
    /// finalized context is fine.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if completing `context` fails. The context is
    /// aborted before returning.
    pub fn from_context(context: &mut Context<St>) -> Result<Self, Error> {
        let config = ContextConfig::of(context);
        let store = context.store().clone();
        finalize(context)?;
        Ok(Self::with_config(store, config))
    }

    /// Returns the configuration applied to produced contexts.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Returns the store contexts are opened against.
    pub fn store(&self) -> &St {
        &self.store
    }

    /// Returns true if contexts are opened read-only.
    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Returns true if contexts are produced with authorization disabled.
    pub fn is_privileged(&self) -> bool {
        self.config.privileged
    }

    /// Returns the user bound to produced contexts.
    pub fn user(&self) -> Option<&Arc<Principal>> {
        self.config.user.as_ref()
    }

    /// Opens produced contexts read-only or read-write.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Disables or enables authorization on produced contexts.
    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.config.privileged = privileged;
        self
    }

    /// Binds `user` to produced contexts; `None` means no user.
    pub fn with_user(mut self, user: Option<Arc<Principal>>) -> Self {
        self.config.user = user;
        self
    }

    /// In-place form of [`with_read_only`](Self::with_read_only).
    pub fn set_read_only(&mut self, read_only: bool) -> &mut Self {
        self.config.read_only = read_only;
        self
    }

    /// In-place form of [`with_privileged`](Self::with_privileged).
    pub fn set_privileged(&mut self, privileged: bool) -> &mut Self {
        self.config.privileged = privileged;
        self
    }

    /// In-place form of [`with_user`](Self::with_user).
    pub fn set_user(&mut self, user: Option<Arc<Principal>>) -> &mut Self {
        self.config.user = user;
        self
    }

    /// Opens a new context configured per this supplier.
    ///
    /// The caller owns the returned context and is responsible for
    /// finalizing it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the store cannot open a session.
    pub fn get(&self) -> Result<Context<St>, Error> {
        let mut context = Context::open(&self.store, self.config.read_only)?;
        if self.config.privileged {
            context.disable_authorization()?;
        }
        if let Some(user) = &self.config.user {
            context.set_current_user(Some(Arc::clone(user)))?;
        }
        Ok(context)
    }

    /// Finalizes `context`, then opens a fresh one.
    ///
    /// The new context follows this supplier's configuration, not that of
    /// the context being replaced.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if completing `context` fails (it is aborted
    /// and no new context is opened) or if opening the new one fails.
    pub fn renew(&self, context: &mut Context<St>) -> Result<Context<St>, Error> {
        finalize(context)?;
        self.get()
    }

    /// Runs `work` against a fresh context and finalizes it.
    ///
    /// The context is completed if `work` succeeds. If `work` fails, or the
    /// completion itself fails, the context is aborted before the error is
    /// returned. A panic in `work` aborts the context while unwinding.
    ///
    /// # Errors
    ///
    /// Returns `Error::Callback` with the work's error, or `Error::Store` if
    /// the context cannot be opened or completed.
    pub fn consume_and_complete<F, E>(&self, work: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Context<St>) -> Result<(), E>,
        E: Into<BoxError>,
    {
        self.consume(FnConsumer::<F, E>::new(work))
    }

    /// Runs a [`ContextConsumer`] against a fresh context and finalizes it.
    ///
    /// Same guarantees as [`consume_and_complete`](Self::consume_and_complete).
    ///
    /// # Errors
    ///
    /// See [`consume_and_complete`](Self::consume_and_complete).
    pub fn consume<C>(&self, consumer: C) -> Result<(), Error>
    where
        C: ContextConsumer<St>,
    {
        self.run(|context| consumer.accept(context).map_err(Error::callback))
    }

    /// Runs `work` against a fresh context, completing it and returning the
    /// work's value on success.
    ///
    /// Same guarantees as [`consume_and_complete`](Self::consume_and_complete).
    ///
    /// # Errors
    ///
    /// See [`consume_and_complete`](Self::consume_and_complete).
    pub fn complete_with<T, F, E>(&self, work: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Context<St>) -> Result<T, E>,
        E: Into<BoxError>,
    {
        self.run(|context| work(context).map_err(Error::callback))
    }

    fn run<T, F>(&self, work: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Context<St>) -> Result<T, Error>,
    {
        let mut context = self.get()?;
        let outcome = work(&mut context).and_then(|value| {
            complete(&mut context)?;
            Ok(value)
        });

        if let Err(e) = &outcome {
            context.log().warn(format_args!("unit of work failed: {}", e));
        }
        if context.is_valid() {
            context.abort();
        }
        outcome
    }
}

/// Completes `context`, propagating any store failure.
///
/// Does not attempt recovery: a context whose commit failed stays open.
///
/// # Errors
///
/// Returns `Error::Store` if the commit fails.
pub fn complete<St: Store>(context: &mut Context<St>) -> Result<(), Error> {
    context.complete()
}

/// Completes `context`, aborting it if it is still open afterwards.
fn finalize<St: Store>(context: &mut Context<St>) -> Result<(), Error> {
    let outcome = complete(context);
    if context.is_valid() {
        context.abort();
    }
    outcome
}

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Error;
use crate::logging::ContextLog;
use crate::principal::Principal;
use crate::state::{ContextState, Finalization};
use crate::store::{Session, Store};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A single logical session against a backing store.
///
/// A `Context` is created `Open` and is finalized exactly once, either by
/// [`complete`](Self::complete) (commit) or [`abort`](Self::abort)
/// (rollback). Store work goes through [`session_mut`](Self::session_mut),
/// which refuses to hand out the session once the context is closed.
///
/// Mode flags and the bound user stay queryable after the context closes so
/// its configuration can still be inspected or copied.
///
/// # Finalization
///
/// A context dropped while still open is aborted. Prefer
/// `ContextSupplier::consume_and_complete` when the unit of work fits in a
/// closure; it completes on success and aborts on every other exit path.
///
/// # Examples
///
/// ```
/// use context_core::{Context, MemoryStore};
///
/// let store = MemoryStore::new();
/// let mut ctx = Context::open(&store, false).unwrap();
///
/// ctx.session_mut().unwrap().put("item-1", "draft").unwrap();
/// ctx.complete().unwrap();
///
/// assert!(!ctx.is_valid());
/// assert_eq!(store.get("item-1").as_deref(), Some("draft"));
/// ```
pub struct Context<St: Store> {
    id: u64,
    store: St,
    session: St::Session,
    state: ContextState,
    read_only: bool,
    ignore_authorization: bool,
    current_user: Option<Arc<Principal>>,
}

impl<St: Store> Context<St> {
    /// Opens a new context in read-only or read-write mode.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the store cannot open a session.
    pub fn open(store: &St, read_only: bool) -> Result<Self, Error> {
        let session = store.open(read_only)?;
        let ctx = Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            store: store.clone(),
            session,
            state: ContextState::Open,
            read_only,
            ignore_authorization: false,
            current_user: None,
        };
        ctx.log()
            .debug(format_args!("context opened (read_only={})", read_only));
        Ok(ctx)
    }

    /// Returns the process-unique id of this context.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the store this context was opened against.
    pub fn store(&self) -> &St {
        &self.store
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Returns true until the context has been completed or aborted.
    pub fn is_valid(&self) -> bool {
        self.state.is_open()
    }

    /// Returns true if the context was opened read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns true if authorization checks are bypassed for this context.
    ///
    /// Downstream code performing authorization must consult this flag.
    pub fn ignore_authorization(&self) -> bool {
        self.ignore_authorization
    }

    /// Bypasses authorization checks for the rest of this context's life.
    ///
    /// There is no way to turn checks back on for the same context.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the context was already finalized.
    pub fn disable_authorization(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        if !self.ignore_authorization {
            self.ignore_authorization = true;
            self.log().info(format_args!("authorization disabled"));
        }
        Ok(())
    }

    /// Returns the user bound to this context, if any.
    pub fn current_user(&self) -> Option<&Arc<Principal>> {
        self.current_user.as_ref()
    }

    /// Binds `user` to this context, or clears the binding with `None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the context was already finalized.
    pub fn set_current_user(&mut self, user: Option<Arc<Principal>>) -> Result<(), Error> {
        self.ensure_open()?;
        let cleared = user.is_none() && self.current_user.is_some();
        self.current_user = user;
        if cleared {
            self.log().debug(format_args!("current user cleared"));
        } else if self.current_user.is_some() {
            self.log().debug(format_args!("current user bound"));
        }
        Ok(())
    }

    /// Returns the live store session.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the context was already finalized.
    pub fn session(&self) -> Result<&St::Session, Error> {
        self.ensure_open()?;
        Ok(&self.session)
    }

    /// Returns the live store session for issuing work.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the context was already finalized.
    pub fn session_mut(&mut self) -> Result<&mut St::Session, Error> {
        self.ensure_open()?;
        Ok(&mut self.session)
    }

    /// Returns a logger tagged with this context's id and user.
    pub fn log(&self) -> ContextLog<'_> {
        ContextLog::new(self.id, self.current_user.as_deref().map(|p| p.id.as_str()))
    }

    /// Durably applies all work and closes the context.
    ///
    /// Completing an already finalized context is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the commit fails. The context then stays
    /// open with its work still staged; the caller must abort it (dropping
    /// it also aborts).
    pub fn complete(&mut self) -> Result<(), Error> {
        if !self.is_valid() {
            self.log().debug(format_args!(
                "complete ignored, context already {}",
                self.state
            ));
            return Ok(());
        }

        if let Err(e) = self.session.commit() {
            self.log().warn(format_args!("commit failed: {}", e));
            return Err(Error::Store(e));
        }
        self.state = ContextState::Closed(Finalization::Completed);
        self.log().debug(format_args!("context completed"));
        Ok(())
    }

    /// Discards all uncommitted work and closes the context.
    ///
    /// Aborting an already finalized context is a no-op.
    pub fn abort(&mut self) {
        if !self.is_valid() {
            return;
        }
        self.session.rollback();
        self.state = ContextState::Closed(Finalization::Aborted);
        self.log().debug(format_args!("context aborted"));
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::Closed {
                context_id: self.id,
            })
        }
    }
}

impl<St: Store> fmt::Debug for Context<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("read_only", &self.read_only)
            .field("ignore_authorization", &self.ignore_authorization)
            .field("current_user", &self.current_user)
            .finish_non_exhaustive()
    }
}

impl<St: Store> Drop for Context<St> {
    fn drop(&mut self) {
        if self.is_valid() {
            self.log()
                .warn(format_args!("context dropped while open, aborting"));
            self.abort();
        }
    }
}

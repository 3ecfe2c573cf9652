use std::fmt;

use crate::store::StoreError;

/// Boxed error produced by caller-supplied work.
///
/// Anything convertible into this type (any `std::error::Error + Send + Sync`,
/// `String`, `&str`) can be returned from a work callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while producing, using, or finalizing a context.
#[derive(Debug)]
pub enum Error {
    /// The backing store failed.
    ///
    /// Covers opening a session and committing, and also store errors the
    /// work itself raised and returned as `Error` (such as a write through a
    /// read-only context). Use [`StoreError::kind`] to tell them apart:
    /// only `StoreErrorKind::Commit` means finalization failed.
    Store(StoreError),
    /// Caller-supplied work failed.
    ///
    /// The original error is kept intact and can be recovered with
    /// [`Error::callback_error`] or `downcast_ref`.
    Callback(BoxError),
    /// An operation was attempted on a context that was already finalized.
    Closed {
        /// Identifier of the finalized context
        context_id: u64,
    },
}

impl Error {
    /// Wraps a work failure.
    ///
    /// Work that fails with this crate's own `Error` (for example by using
    /// `?` on `Context::session_mut`) is passed through unwrapped.
    pub fn callback(err: impl Into<BoxError>) -> Self {
        let boxed: BoxError = err.into();
        match boxed.downcast::<Error>() {
            Ok(own) => *own,
            Err(other) => Error::Callback(other),
        }
    }

    /// Returns the store error, if this is a store failure.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Error::Store(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the original work failure, if this is a callback failure.
    pub fn callback_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Callback(e) => Some(&**e),
            _ => None,
        }
    }

    /// Returns true if the error was caused by using a finalized context.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(e) => write!(f, "store failure: {}", e),
            Error::Callback(e) => write!(f, "context work failed: {}", e),
            Error::Closed { context_id } => {
                write!(f, "context {} is no longer valid", context_id)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(e) => Some(e),
            Error::Callback(e) => Some(&**e),
            Error::Closed { .. } => None,
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

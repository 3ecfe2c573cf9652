//! Transactional execution contexts with guaranteed finalization.
//!
//! This crate creates, configures, and finalizes units of work against a
//! backing store:
//! - **Contexts**: one session against the store, with read-only and
//!   privileged modes and a bound user, finalized exactly once
//! - **Suppliers**: reusable configuration that produces contexts on demand
//! - **Guaranteed finalization**: work runs against a fresh context that is
//!   completed on success and aborted on every other exit path
//!
//! # Core Types
//!
//! - [`Context`]: session state machine (`Open` → `Closed`)
//! - [`ContextSupplier`]: produces configured contexts and runs work
//! - [`ContextConfig`]: the configuration value a supplier applies
//! - [`ContextConsumer`]: a unit of work taking a context
//! - [`Store`] / [`Session`]: the backing store the contexts talk to
//! - [`MemoryStore`]: an in-memory store with staged writes
//!
//! # Examples
//!
//! ```
//! use context_core::{ContextSupplier, Error, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let supplier = ContextSupplier::new(store.clone());
//!
//! // Completed: the write is persisted.
//! supplier
//!     .consume_and_complete(|ctx| -> Result<(), Error> {
//!         ctx.session_mut()?.put("item-1", "archived")?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! // Aborted: the failure comes back and the write is discarded.
//! let result = supplier.consume_and_complete(|ctx| -> Result<(), Error> {
//!     ctx.session_mut()?.put("item-2", "archived")?;
//!     Err(Error::callback("validation failed"))
//! });
//!
//! assert!(result.is_err());
//! assert!(store.contains_key("item-1"));
//! assert!(!store.contains_key("item-2"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod consumer;
mod context;
mod error;
mod logging;
mod principal;
mod state;
mod store;
mod supplier;

pub use consumer::ContextConsumer;
pub use context::Context;
pub use error::{BoxError, Error};
pub use logging::ContextLog;
pub use principal::Principal;
pub use state::{ContextState, Finalization};
pub use store::{MemorySession, MemoryStore, Session, Store, StoreError, StoreErrorKind};
pub use supplier::{complete, ContextConfig, ContextSupplier};

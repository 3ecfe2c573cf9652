use std::fmt;

/// A structured logger bound to one context.
///
/// `ContextLog` is obtained from `Context::log()`. It is lifetime-bound to
/// the context, and every message carries the context id and, when one is
/// bound, the acting user's id.
#[derive(Debug, Clone, Copy)]
pub struct ContextLog<'a> {
    context_id: u64,
    user: Option<&'a str>,
}

impl<'a> ContextLog<'a> {
    /// This is `pub(crate)` - only `Context` can create it.
    pub(crate) fn new(context_id: u64, user: Option<&'a str>) -> Self {
        Self { context_id, user }
    }

    /// Returns the id of the context this logger is bound to.
    pub fn context_id(&self) -> u64 {
        self.context_id
    }

    /// Returns the id of the user bound to the context, if any.
    pub fn user(&self) -> Option<&str> {
        self.user
    }

    /// Logs an info-level message with context fields.
    ///
    /// Use with `format_args!`:
    /// ```
    /// # use context_core::{Context, MemoryStore};
    /// let store = MemoryStore::new();
    /// let ctx = Context::open(&store, false).unwrap();
    /// ctx.log().info(format_args!("importing {} records", 3));
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(context_id = self.context_id, user = ?self.user, "{}", args);
    }

    /// Logs a warning-level message with context fields.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(context_id = self.context_id, user = ?self.user, "{}", args);
    }

    /// Logs an error-level message with context fields.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(context_id = self.context_id, user = ?self.user, "{}", args);
    }

    /// Logs a debug-level message with context fields.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(context_id = self.context_id, user = ?self.user, "{}", args);
    }
}

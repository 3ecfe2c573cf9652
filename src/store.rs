use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Failure reported by a [`Store`] or one of its sessions.
///
/// Each constructor names the store operation that failed; the optional
/// detail carries whatever the backend said about it.
///
/// # Examples
///
/// ```
/// use context_core::{StoreError, StoreErrorKind};
///
/// let error = StoreError::commit_rejected("disk full");
/// assert_eq!(error.kind(), StoreErrorKind::Commit);
/// assert_eq!(error.detail(), Some("disk full"));
/// assert_eq!(error.to_string(), "store did not apply staged work: disk full");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    kind: StoreErrorKind,
    detail: Option<String>,
}

impl StoreError {
    /// The store could not open a session.
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Unavailable,
            detail: Some(detail.into()),
        }
    }

    /// A write went through a session opened read-only.
    pub fn read_only() -> Self {
        Self {
            kind: StoreErrorKind::ReadOnly,
            detail: None,
        }
    }

    /// The store refused to durably apply a session's staged work.
    pub fn commit_rejected(detail: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Commit,
            detail: Some(detail.into()),
        }
    }

    /// Which store operation failed.
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// Backend-supplied detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            StoreErrorKind::Unavailable => "could not open a store session",
            StoreErrorKind::ReadOnly => "write rejected by read-only session",
            StoreErrorKind::Commit => "store did not apply staged work",
        };
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", what, detail),
            None => f.write_str(what),
        }
    }
}

impl std::error::Error for StoreError {}

/// The store operation behind a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Opening a session.
    Unavailable,
    /// Writing through a read-only session.
    ReadOnly,
    /// Committing staged work.
    Commit,
}

/// A handle to a persistent store that can open sessions.
///
/// Handles are cheap to clone; every clone refers to the same store. A
/// context keeps a clone so a supplier can be derived from it later.
pub trait Store: Clone {
    /// The session type opened by this store.
    type Session: Session;

    /// Opens a new session in read-only or read-write mode.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if no session can be opened.
    fn open(&self, read_only: bool) -> Result<Self::Session, StoreError>;
}

/// A live session against a store with two-phase completion.
pub trait Session {
    /// Durably applies all work staged through this session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the work could not be applied. The staged
    /// work is left in place so the caller can still roll it back.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discards all work staged through this session.
    fn rollback(&mut self);
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<String, String>,
    fail_commits: usize,
    fail_opens: usize,
    commits: usize,
    rollbacks: usize,
}

/// An in-memory key/value store with per-session staged writes.
///
/// Writes made through a [`MemorySession`] are invisible to the store until
/// the session commits. Uses interior mutability, so all clones of the
/// handle observe the same records.
///
/// # Examples
///
/// ```
/// use context_core::{MemoryStore, Session, Store};
///
/// let store = MemoryStore::new();
/// let mut session = store.open(false).unwrap();
/// session.put("greeting", "hello").unwrap();
/// assert_eq!(store.get("greeting"), None);
///
/// session.commit().unwrap();
/// assert_eq!(store.get("greeting").as_deref(), Some("hello"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the committed value for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.state.borrow().records.get(key).cloned()
    }

    /// Returns true if `key` has a committed value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.borrow().records.contains_key(key)
    }

    /// Returns the number of committed records.
    pub fn len(&self) -> usize {
        self.state.borrow().records.len()
    }

    /// Returns true if no records have been committed.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().records.is_empty()
    }

    /// Returns how many sessions have committed successfully.
    pub fn commit_count(&self) -> usize {
        self.state.borrow().commits
    }

    /// Returns how many sessions have rolled back.
    pub fn rollback_count(&self) -> usize {
        self.state.borrow().rollbacks
    }

    /// Makes the next commit fail with [`StoreErrorKind::Commit`].
    pub fn fail_next_commit(&self) {
        self.state.borrow_mut().fail_commits += 1;
    }

    /// Makes the next open fail with [`StoreErrorKind::Unavailable`].
    pub fn fail_next_open(&self) {
        self.state.borrow_mut().fail_opens += 1;
    }
}

impl Store for MemoryStore {
    type Session = MemorySession;

    fn open(&self, read_only: bool) -> Result<MemorySession, StoreError> {
        let mut state = self.state.borrow_mut();
        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(StoreError::unavailable("injected open failure"));
        }

        Ok(MemorySession {
            store: self.clone(),
            read_only,
            staged: BTreeMap::new(),
        })
    }
}

/// A session on a [`MemoryStore`].
///
/// `None` in the staged map marks a pending delete.
#[derive(Debug)]
pub struct MemorySession {
    store: MemoryStore,
    read_only: bool,
    staged: BTreeMap<String, Option<String>>,
}

impl MemorySession {
    /// Stages a write of `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` with kind `ReadOnly` if the session is read-only.
    pub fn put(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), StoreError> {
        self.ensure_writable()?;
        self.staged.insert(key.into(), Some(value.into()));
        Ok(())
    }

    /// Stages removal of `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` with kind `ReadOnly` if the session is read-only.
    pub fn delete(&mut self, key: impl Into<String>) -> Result<(), StoreError> {
        self.ensure_writable()?;
        self.staged.insert(key.into(), None);
        Ok(())
    }

    /// Reads `key`, seeing this session's staged writes first.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.staged.get(key) {
            Some(staged) => staged.clone(),
            None => self.store.get(key),
        }
    }

    /// Returns the number of staged, uncommitted changes.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Returns true if the session was opened read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            Err(StoreError::read_only())
        } else {
            Ok(())
        }
    }
}

impl Session for MemorySession {
    fn commit(&mut self) -> Result<(), StoreError> {
        let mut state = self.store.state.borrow_mut();
        if state.fail_commits > 0 {
            state.fail_commits -= 1;
            return Err(StoreError::commit_rejected("injected commit failure"));
        }

        for (key, value) in std::mem::take(&mut self.staged) {
            match value {
                Some(value) => state.records.insert(key, value),
                None => state.records.remove(&key),
            };
        }
        state.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.clear();
        self.store.state.borrow_mut().rollbacks += 1;
    }
}

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use context_core::{
    Context, ContextConsumer, ContextState, ContextSupplier, Error, Finalization, MemoryStore,
    Principal, StoreErrorKind,
};

#[derive(Debug, PartialEq)]
struct EmbargoViolation {
    item: String,
}

impl fmt::Display for EmbargoViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {} is under embargo", self.item)
    }
}

impl std::error::Error for EmbargoViolation {}

fn uploader() -> Arc<Principal> {
    Arc::new(Principal::new("user-42", "Uploader"))
}

fn privileged_supplier(store: &MemoryStore) -> ContextSupplier<MemoryStore> {
    ContextSupplier::new(store.clone())
        .with_read_only(false)
        .with_privileged(true)
        .with_user(Some(uploader()))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[test]
fn privileged_work_is_committed() {
    init_tracing();
    let store = MemoryStore::new();
    let supplier = privileged_supplier(&store);

    let mut seen_privileged = false;
    let mut seen_user = None;
    let mut seen_id = 0;
    supplier
        .consume_and_complete(|ctx| -> Result<(), Error> {
            seen_id = ctx.id();
            seen_user = ctx.current_user().cloned();
            ctx.session_mut()?.put("record-r", "value")?;
            seen_privileged = ctx.ignore_authorization();
            Ok(())
        })
        .expect("work should complete");

    assert!(seen_privileged);
    assert_eq!(seen_user, Some(uploader()));
    assert_ne!(seen_id, 0);
    assert_eq!(store.get("record-r").as_deref(), Some("value"));
    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.rollback_count(), 0);
}

#[test]
fn failing_work_is_aborted_and_error_returned() {
    init_tracing();
    let store = MemoryStore::new();
    let supplier = privileged_supplier(&store);

    let err = supplier
        .consume_and_complete(|ctx| {
            ctx.session_mut()
                .expect("open")
                .put("record-r", "value")
                .expect("writable");
            Err(EmbargoViolation {
                item: "record-r".to_string(),
            })
        })
        .unwrap_err();

    let cause = err
        .callback_error()
        .and_then(|e| e.downcast_ref::<EmbargoViolation>())
        .expect("original failure");
    assert_eq!(cause.item, "record-r");
    assert!(!store.contains_key("record-r"));
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn commit_failure_is_aborted_by_safety_net() {
    let store = MemoryStore::new();
    let supplier = ContextSupplier::new(store.clone());
    store.fail_next_commit();

    let err = supplier
        .consume_and_complete(|ctx| -> Result<(), Error> {
            ctx.session_mut()?.put("k", "v")?;
            Ok(())
        })
        .unwrap_err();

    assert_eq!(
        err.store_error().map(|e| e.kind()),
        Some(StoreErrorKind::Commit)
    );
    assert!(store.is_empty());
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn panicking_work_is_aborted() {
    let store = MemoryStore::new();
    let supplier = ContextSupplier::new(store.clone());

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        supplier.consume_and_complete(|ctx| -> Result<(), Error> {
            ctx.session_mut()?.put("k", "v")?;
            panic!("worker crashed");
        })
    }));

    assert!(result.is_err());
    assert!(store.is_empty());
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn work_that_finalizes_early_is_not_finalized_again() {
    let store = MemoryStore::new();
    let supplier = ContextSupplier::new(store.clone());

    supplier
        .consume_and_complete(|ctx| -> Result<(), Error> {
            ctx.session_mut()?.put("k", "v")?;
            ctx.abort();
            Ok(())
        })
        .unwrap();

    assert!(store.is_empty());
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.rollback_count(), 1);
}

#[test]
fn work_against_closed_context_reports_closed() {
    let store = MemoryStore::new();
    let supplier = ContextSupplier::new(store.clone());

    let err = supplier
        .consume_and_complete(|ctx| -> Result<(), Error> {
            ctx.complete()?;
            ctx.session_mut()?.put("late", "write")?;
            Ok(())
        })
        .unwrap_err();

    assert!(err.is_closed());
    assert!(!store.contains_key("late"));
}

#[test]
fn renew_rotates_context() {
    let store = MemoryStore::new();
    let supplier = privileged_supplier(&store);
    let mut ctx = supplier.get().unwrap();
    ctx.session_mut().unwrap().put("first", "1").unwrap();

    let mut next = supplier.renew(&mut ctx).unwrap();

    assert_eq!(ctx.state(), ContextState::Closed(Finalization::Completed));
    assert_eq!(store.get("first").as_deref(), Some("1"));
    assert!(next.is_valid());
    assert!(next.ignore_authorization());
    assert_eq!(next.current_user(), Some(&uploader()));
    next.abort();
}

#[test]
fn supplier_derived_from_context_reproduces_it() {
    let store = MemoryStore::new();
    let mut ctx = Context::open(&store, true).unwrap();
    ctx.disable_authorization().unwrap();
    ctx.set_current_user(Some(uploader())).unwrap();

    let supplier = ContextSupplier::from_context(&mut ctx).unwrap();
    assert!(!ctx.is_valid());

    let copy = supplier.get().unwrap();
    assert_eq!(copy.is_read_only(), ctx.is_read_only());
    assert_eq!(copy.ignore_authorization(), ctx.ignore_authorization());
    assert_eq!(copy.current_user(), ctx.current_user());
}

#[test]
fn abort_twice_is_harmless() {
    let store = MemoryStore::new();
    let mut ctx = ContextSupplier::new(store.clone()).get().unwrap();

    ctx.abort();
    ctx.abort();

    assert_eq!(ctx.state(), ContextState::Closed(Finalization::Aborted));
    assert_eq!(store.rollback_count(), 1);
}

struct Ingest {
    records: Vec<(&'static str, &'static str)>,
}

impl ContextConsumer<MemoryStore> for Ingest {
    type Error = Error;

    fn accept(self, ctx: &mut Context<MemoryStore>) -> Result<(), Error> {
        let session = ctx.session_mut()?;
        for (key, value) in self.records {
            session.put(key, value)?;
        }
        ctx.log()
            .info(format_args!("ingested {} records", session_len(ctx)?));
        Ok(())
    }
}

fn session_len(ctx: &Context<MemoryStore>) -> Result<usize, Error> {
    Ok(ctx.session()?.staged_len())
}

#[test]
fn named_consumer_runs_once_and_commits() {
    init_tracing();
    let store = MemoryStore::new();
    let supplier = ContextSupplier::new(store.clone());

    supplier
        .consume(Ingest {
            records: vec![("a", "1"), ("b", "2"), ("c", "3")],
        })
        .unwrap();

    assert_eq!(store.len(), 3);
    assert_eq!(store.commit_count(), 1);
}

#[test]
fn read_only_supplier_cannot_write() {
    let store = MemoryStore::new();
    let supplier = ContextSupplier::new(store.clone()).with_read_only(true);

    let err = supplier
        .consume(Ingest {
            records: vec![("a", "1")],
        })
        .unwrap_err();

    assert_eq!(
        err.store_error().map(|e| e.kind()),
        Some(StoreErrorKind::ReadOnly)
    );
    assert!(store.is_empty());
}

//! Contract tests for batched persistence against the in-memory context.

use quarry::persistence::ContextStats;
use quarry::{
    BatchExecutor, BatchOptions, Entity, InMemoryContext, MemoryStore, Objects, Operation,
    PersistenceContext, QuarryError,
};

#[derive(Debug, Clone, PartialEq)]
struct Account {
    id: u32,
    balance: i64,
}

impl Entity for Account {
    fn identity(&self) -> String {
        format!("Account#{}", self.id)
    }
}

fn accounts(n: u32) -> Vec<Account> {
    (1..=n).map(|id| Account { id, balance: 0 }).collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A context holding every object in `objects`, committed and managed.
fn seeded(objects: &[Account]) -> (MemoryStore<Account>, InMemoryContext<Account>) {
    let store = MemoryStore::new();
    let mut ctx = InMemoryContext::new(store.clone());
    BatchExecutor::new(&mut ctx)
        .run(objects, Operation::Create, &BatchOptions::default())
        .expect("seed");
    (store, ctx)
}

mod chunking_contracts {
    use super::*;

    #[test]
    fn test_chunked_commits_of_250() {
        init_tracing();
        let store = MemoryStore::new();
        let mut ctx = InMemoryContext::new(store.clone());
        let objects = accounts(250);

        let n = BatchExecutor::new(&mut ctx)
            .run(&objects, Operation::Create, &BatchOptions::new().with_iterations(100))
            .unwrap();

        assert_eq!(n, 250);
        let sizes: Vec<usize> = store.journal().iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(store.len(), 250);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_commit() {
        let store = MemoryStore::new();
        let mut ctx = InMemoryContext::new(store.clone());
        BatchExecutor::new(&mut ctx)
            .run(&accounts(200), Operation::Create, &BatchOptions::new().with_iterations(100))
            .unwrap();
        assert_eq!(store.commit_count(), 2);
    }

    #[test]
    fn test_single_commit_without_iterations() {
        let store = MemoryStore::new();
        let mut ctx = InMemoryContext::new(store.clone());
        BatchExecutor::new(&mut ctx)
            .run(&accounts(30), Operation::Create, &BatchOptions::default())
            .unwrap();
        assert_eq!(store.commit_count(), 1);
        assert_eq!(ctx.stats().commits, 1);
    }

    #[test]
    fn test_without_autocommit_changes_stay_staged() {
        let store = MemoryStore::new();
        let mut ctx = InMemoryContext::new(store.clone());
        let options = BatchOptions::new().with_autocommit(false).with_iterations(10);
        let n = BatchExecutor::new(&mut ctx)
            .run(&accounts(25), Operation::Create, &options)
            .unwrap();
        assert_eq!(n, 25);
        assert!(store.is_empty());
        assert_eq!(ctx.pending_len(), 25);

        ctx.commit().unwrap();
        assert_eq!(store.len(), 25);
    }

    #[test]
    fn test_cleanup_requires_autocommit() {
        let store = MemoryStore::new();
        let mut ctx = InMemoryContext::new(store.clone());
        let options = BatchOptions::new().with_autocommit(false).with_cleanup(true);
        BatchExecutor::new(&mut ctx)
            .run(&accounts(3), Operation::Create, &options)
            .unwrap();
        assert_eq!(ctx.stats().clears, 0);
        assert_eq!(ctx.pending_len(), 3);
        assert!(store.is_empty());
    }

    #[test]
    fn test_single_object_form() {
        let store = MemoryStore::new();
        let mut ctx = InMemoryContext::new(store.clone());
        let one = Account { id: 9, balance: 5 };
        let n = BatchExecutor::new(&mut ctx)
            .run(Objects::One(&one), Operation::Create, &BatchOptions::default())
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.get("Account#9"), Some(one));
    }

    #[test]
    fn test_empty_batch_commits_nothing() {
        let store = MemoryStore::new();
        let mut ctx = InMemoryContext::new(store.clone());
        let none: Vec<Account> = Vec::new();
        let n = BatchExecutor::new(&mut ctx)
            .run(&none, Operation::Create, &BatchOptions::new().with_cleanup(true))
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(store.commit_count(), 0);
        assert_eq!(
            ctx.stats(),
            ContextStats {
                clears: 1,
                ..ContextStats::default()
            }
        );
    }
}

mod delete_contracts {
    use super::*;

    #[test]
    fn test_untracked_objects_are_skipped() {
        let objects = accounts(5);
        let (store, mut ctx) = seeded(&objects[..4]);
        let staged_before = ctx.stats().staged;

        let n = BatchExecutor::new(&mut ctx)
            .run(&objects, Operation::Delete, &BatchOptions::default())
            .unwrap();

        assert_eq!(n, 5);
        assert_eq!(ctx.stats().staged - staged_before, 4);
        assert!(store.is_empty());
    }

    #[test]
    fn test_cleanup_detaches_everything() {
        let objects = accounts(3);
        let (_store, mut ctx) = seeded(&objects);
        BatchExecutor::new(&mut ctx)
            .run(&objects, Operation::Update, &BatchOptions::new().with_cleanup(true))
            .unwrap();
        assert_eq!(ctx.managed_len(), 0);

        // Nothing is managed any more, so a delete skips every object.
        let n = BatchExecutor::new(&mut ctx)
            .run(&objects, Operation::Delete, &BatchOptions::default())
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(ctx.pending_len(), 0);
    }
}

mod lock_contracts {
    use super::*;

    #[test]
    fn test_seventh_conflict_leaves_six_staged() {
        init_tracing();
        let objects = accounts(10);
        let (store, mut ctx) = seeded(&objects);
        store
            .apply(&[(Operation::Update, objects[6].clone())])
            .unwrap();
        let staged_before = ctx.stats().staged;

        let err = BatchExecutor::new(&mut ctx)
            .run(&objects, Operation::Update, &BatchOptions::new().with_version(1))
            .unwrap_err();

        assert!(err.is_lock_conflict());
        assert_eq!(ctx.stats().staged - staged_before, 6);
        assert_eq!(ctx.pending_len(), 6);
        assert_eq!(store.version("Account#1"), Some(1));
    }

    #[test]
    fn test_earlier_chunks_stay_committed() {
        let objects = accounts(10);
        let (store, mut ctx) = seeded(&objects);
        store
            .apply(&[(Operation::Update, objects[6].clone())])
            .unwrap();

        let options = BatchOptions::new().with_version(1).with_iterations(3);
        let result = BatchExecutor::new(&mut ctx).run(&objects, Operation::Update, &options);

        assert!(matches!(result, Err(QuarryError::OptimisticLock { .. })));
        assert_eq!(store.version("Account#1"), Some(2));
        assert_eq!(store.version("Account#6"), Some(2));
        assert_eq!(store.version("Account#7"), Some(2));
        assert_eq!(store.version("Account#8"), Some(1));
    }

    #[test]
    fn test_matching_versions_pass() {
        let objects = accounts(4);
        let (store, mut ctx) = seeded(&objects);
        let n = BatchExecutor::new(&mut ctx)
            .run(&objects, Operation::Delete, &BatchOptions::new().with_version(1))
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(ctx.stats().lock_checks, 4);
        assert!(store.is_empty());
    }

    #[test]
    fn test_null_version_disables_checks() {
        let objects = accounts(2);
        let (_store, mut ctx) = seeded(&objects);
        let options = BatchOptions::new().with_version(quarry::Value::Null);
        BatchExecutor::new(&mut ctx)
            .run(&objects, Operation::Update, &options)
            .unwrap();
        assert_eq!(ctx.stats().lock_checks, 0);
    }

    #[test]
    fn test_lock_check_on_uncommitted_object() {
        let store = MemoryStore::new();
        let mut ctx = InMemoryContext::new(store);
        let fresh = Account { id: 1, balance: 0 };
        ctx.attach(fresh.clone());
        let err = BatchExecutor::new(&mut ctx)
            .run(Objects::One(&fresh), Operation::Update, &BatchOptions::new().with_version(1))
            .unwrap_err();
        assert!(matches!(err, QuarryError::NotTracked(_)));
    }

    #[test]
    fn test_options_from_json() {
        let options: BatchOptions =
            serde_json::from_str(r#"{"iterations": 2, "version": 1, "cleanup": true}"#).unwrap();
        let objects = accounts(5);
        let (store, mut ctx) = seeded(&objects);
        BatchExecutor::new(&mut ctx)
            .run(&objects, Operation::Update, &options)
            .unwrap();
        // One seed commit plus chunks of 2, 2 and 1.
        assert_eq!(store.commit_count(), 4);
        assert_eq!(ctx.managed_len(), 0);
    }
}

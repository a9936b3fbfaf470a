//! CRUD sequence against the reference pool and against broken pools.

mod common;

use poolcheck_contracts::{config::PoolConfig, session::Tally};
use poolcheck_core::CachePool;
use poolcheck_memory::MemoryPool;
use poolcheck_verify::ContractVerifier;

use common::{memory_pool, quiet_session, Fault, FaultyPool};

#[test]
fn memory_pool_passes_the_full_sequence() {
    let (session, sink) = quiet_session("crud-memory");
    let pool = memory_pool();

    ContractVerifier::new(&session).run_crud(&pool, true).unwrap();
    let tally = session.ledger().tally();

    assert_eq!(tally, Tally { failed: 0, passed: 14, skipped: 0 }, "{:#?}", sink.lines());
    assert!(sink.contains("Running CRUD tests on the following backend: Memory"));
    assert!(sink.contains("I/O stats: "));
    assert!(sink.contains("<yellow>Driver info</yellow>"));
    assert_eq!(pool.stats().item_count, Some(0), "batch delete leaves the pool empty");
}

#[test]
fn without_clearing_the_destructive_steps_are_skipped() {
    let (session, sink) = quiet_session("crud-no-clear");
    let pool = memory_pool();

    ContractVerifier::new(&session).run_crud(&pool, false).unwrap();

    assert_eq!(session.ledger().tally(), Tally { failed: 0, passed: 10, skipped: 0 });
    assert!(!sink.contains("Clearing backend before running test..."));
    assert!(!sink.contains("Testing deleting multiple keys at once."));
    assert_eq!(pool.stats().item_count, Some(1), "the appended item stays in the pool");
}

#[test]
fn custom_default_ttl_is_honoured() {
    let (session, _) = quiet_session("crud-ttl");
    let pool = MemoryPool::new(PoolConfig {
        default_ttl: 60,
        ..PoolConfig::default()
    });

    ContractVerifier::new(&session).run_crud(&pool, true).unwrap();
    assert_eq!(session.ledger().tally().failed, 0);
}

#[test]
fn very_long_default_ttl_is_honoured() {
    let (session, sink) = quiet_session("crud-long-ttl");
    let pool = MemoryPool::new(PoolConfig {
        default_ttl: 5_000_000_000,
        ..PoolConfig::default()
    });

    ContractVerifier::new(&session).run_crud(&pool, true).unwrap();

    assert_eq!(session.ledger().tally().failed, 0, "{:#?}", sink.lines());
    assert!(sink.contains("The cache item has the expected default TTL of ~5000000000s."));
}

#[test]
fn wrong_default_ttl_is_a_failure_but_not_fatal() {
    let (session, sink) = quiet_session("crud-short-ttl");
    let pool = FaultyPool::new(Fault::ShortTtl);

    ContractVerifier::new(&session).run_crud(&pool, true).unwrap();

    assert_eq!(session.ledger().tally().failed, 1);
    assert!(sink.contains("The expected TTL of the cache item was ~900s, got "));
    assert!(sink.contains("The pool successfully saved an item."), "sequence continues");
}

#[test]
fn any_tag_pool_fails_the_all_strategy_and_stops() {
    let (session, sink) = quiet_session("crud-any-tag");
    let pool = FaultyPool::new(Fault::AnyTag);

    ContractVerifier::new(&session).run_crud(&pool, true).unwrap();

    assert_eq!(session.ledger().tally(), Tally { failed: 1, passed: 2, skipped: 0 });
    assert!(sink.contains("The pool unexpectedly retrieved the cache item."));
    assert!(!sink.contains("ONE</yellow>"), "sequence must stop at the first tag mismatch");
}

#[test]
fn subset_only_pool_fails_the_only_strategy() {
    let (session, sink) = quiet_session("crud-subset-only");
    let pool = FaultyPool::new(Fault::SubsetOnly);

    ContractVerifier::new(&session).run_crud(&pool, true).unwrap();

    // TTL, save, ALL miss, ALL hit pass; ONLY with the unknown tag must miss.
    assert_eq!(session.ledger().tally(), Tally { failed: 1, passed: 4, skipped: 0 });
    assert!(sink.contains("The pool unexpectedly retrieved the cache item."));
}

#[test]
fn lying_save_is_caught_by_the_tag_lookup() {
    let (session, sink) = quiet_session("crud-lying-save");
    let pool = FaultyPool::new(Fault::LyingSave);

    ContractVerifier::new(&session).run_crud(&pool, true).unwrap();

    let tally = session.ledger().tally();
    assert_eq!(tally.failed, 1);
    assert!(sink.contains("The pool failed to retrieve the cache item."));
}

#[test]
fn dropped_commit_fails_twice_then_stops() {
    let (session, sink) = quiet_session("crud-drops-commit");
    let pool = FaultyPool::new(Fault::DropsCommit);

    ContractVerifier::new(&session).run_crud(&pool, true).unwrap();

    assert_eq!(session.ledger().tally().failed, 2);
    assert!(sink.contains("The pool failed to commit deferred cache item."));
    assert!(sink.contains("The pool failed to retrieve the expected new value."));
    assert!(!sink.contains("The pool successfully deleted the cache item."));
}

#[test]
fn unreachable_backend_ends_the_session_with_a_skip() {
    let (session, sink) = quiet_session("crud-unreachable");
    let pool = FaultyPool::new(Fault::Unreachable);

    let summary = session.run(|s| {
        s.ledger().record_pass("pre-flight");
        ContractVerifier::new(s).run_crud(&pool, true)
    });

    assert_eq!(summary.tally, Tally { failed: 0, passed: 1, skipped: 1 });
    assert_eq!(summary.exit_code, 0);
    assert!(sink.contains("A driver could not be initialized due to network/authentication issue"));
}

#[test]
fn skip_only_run_is_inconclusive() {
    let (session, _) = quiet_session("crud-skip-only");
    let pool = FaultyPool::new(Fault::Unreachable);

    let summary = session.run(|s| ContractVerifier::new(s).run_crud(&pool, true));

    assert_eq!(summary.tally, Tally { failed: 0, passed: 0, skipped: 1 });
    assert_eq!(summary.exit_code, 2);
}

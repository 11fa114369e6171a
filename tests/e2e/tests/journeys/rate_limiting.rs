//! Journey: admission control across windows, restarts and quiet periods

use std::sync::Arc;
use std::time::Duration;

use dreamlog_core::{
    ManualClock, RateLimitConfig, RateLimitRequest, RateLimitState, RateLimitStore,
    RateLimiterHost, Storage,
};
use dreamlog_e2e_tests::TestDatabaseManager;

fn config() -> RateLimitConfig {
    RateLimitConfig {
        default_max_requests: 50,
        default_window_ms: 30_000,
        stale_buffer_ms: 300_000,
        alarm_interval_ms: 60_000,
    }
}

fn host(storage: Arc<Storage>, clock: Arc<ManualClock>) -> RateLimiterHost {
    RateLimiterHost::new(storage, clock, config())
}

#[tokio::test]
async fn test_two_per_second_window() {
    let db = TestDatabaseManager::new_temp();
    let clock = Arc::new(ManualClock::new(0));
    let host = host(db.storage.clone(), clock.clone());
    let request = RateLimitRequest::hit().with_limits(2, 1_000);

    let mut allowed = Vec::new();
    for t in [0, 400, 900] {
        clock.set(t);
        allowed.push(host.evaluate("dreamer", request).await.unwrap().allowed);
    }
    assert_eq!(allowed, vec![true, true, false]);

    clock.set(1_100);
    let decision = host.evaluate("dreamer", request).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.count, 1);
    assert_eq!(decision.reset_at, 2_100);
}

#[tokio::test]
async fn test_nth_hit_counts_n() {
    let db = TestDatabaseManager::new_temp();
    let clock = Arc::new(ManualClock::new(10_000));
    let host = host(db.storage.clone(), clock.clone());
    let request = RateLimitRequest::hit().with_limits(5, 60_000);

    for n in 1..=8u32 {
        clock.advance(10);
        let decision = host.evaluate("counter", request).await.unwrap();
        assert_eq!(decision.count, n);
        assert_eq!(decision.allowed, n <= 5);
        assert_eq!(decision.remaining, 5u32.saturating_sub(n));
    }
}

#[tokio::test]
async fn test_get_is_read_only() {
    let db = TestDatabaseManager::new_temp();
    let clock = Arc::new(ManualClock::new(0));
    let host = host(db.storage.clone(), clock.clone());

    host.evaluate("reader", RateLimitRequest::hit()).await.unwrap();
    let before = db.storage.load("reader").unwrap().unwrap();

    for t in [100, 5_000, 29_000] {
        clock.set(t);
        let decision = host.evaluate("reader", RateLimitRequest::get()).await.unwrap();
        assert_eq!(decision.count, 1);
        assert_eq!(decision.reset_at, before.reset_at);
    }

    // Past the window a read reports an empty window but stores nothing
    clock.set(31_000);
    let decision = host.evaluate("reader", RateLimitRequest::get()).await.unwrap();
    assert_eq!(decision.count, 0);
    assert_eq!(db.storage.load("reader").unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_reset_starts_new_window() {
    let db = TestDatabaseManager::new_temp();
    let clock = Arc::new(ManualClock::new(0));
    let host = host(db.storage.clone(), clock.clone());

    for _ in 0..3 {
        host.evaluate("r", RateLimitRequest::hit()).await.unwrap();
    }
    clock.set(500);
    let decision = host.evaluate("r", RateLimitRequest::reset()).await.unwrap();
    assert_eq!(decision.count, 0);
    assert_eq!(decision.reset_at, 500 + 30_000);
}

#[tokio::test]
async fn test_stale_window_is_reclaimed_on_next_hit() {
    let db = TestDatabaseManager::new_temp();
    let clock = Arc::new(ManualClock::new(0));
    let host = host(db.storage.clone(), clock.clone());

    for _ in 0..4 {
        host.evaluate("sleepy", RateLimitRequest::hit()).await.unwrap();
    }

    clock.set(30_000 + 300_001);
    let read = host.evaluate("sleepy", RateLimitRequest::get()).await.unwrap();
    assert_eq!(read.count, 0);

    let decision = host.evaluate("sleepy", RateLimitRequest::hit()).await.unwrap();
    assert_eq!(decision.count, 1);
    assert_eq!(decision.reset_at, 330_001 + 30_000);
}

#[tokio::test]
async fn test_window_survives_restart() {
    let mut db = TestDatabaseManager::new_temp();
    let clock = Arc::new(ManualClock::new(0));

    let first = host(db.storage.clone(), clock.clone());
    for _ in 0..3 {
        first.evaluate("persistent", RateLimitRequest::hit()).await.unwrap();
    }
    first.shutdown().await;
    drop(first);

    let storage = db.reopen();
    let second = host(storage, clock.clone());
    clock.set(1_000);
    let decision = second.evaluate("persistent", RateLimitRequest::hit()).await.unwrap();
    assert_eq!(decision.count, 4);
}

#[tokio::test(start_paused = true)]
async fn test_quiet_identity_reclaimed_after_restart() {
    let mut db = TestDatabaseManager::new_temp();
    let clock = Arc::new(ManualClock::new(0));

    let first = host(db.storage.clone(), clock.clone());
    first.evaluate("gone-quiet", RateLimitRequest::hit()).await.unwrap();
    first.shutdown().await;
    drop(first);

    let alarms = db.storage.pending_alarms().unwrap();
    assert_eq!(alarms, vec![("gone-quiet".to_string(), 60_000)]);

    // Restart long after the window went stale
    let storage = db.reopen();
    clock.set(400_000);
    let second = host(storage.clone(), clock.clone());
    assert_eq!(second.resume_alarms().await.unwrap(), 1);

    for _ in 0..100 {
        if storage.load("gone-quiet").unwrap().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(storage.load("gone-quiet").unwrap().is_none());

    // The alarm re-armed itself after cleaning up
    let alarms = storage.pending_alarms().unwrap();
    assert_eq!(alarms, vec![("gone-quiet".to_string(), 460_000)]);

    // With its window gone the actor retires
    for _ in 0..100 {
        if second.active_actors().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(second.active_actors().await, 0);

    // A returning user gets a fresh window from a new actor
    let decision = second.evaluate("gone-quiet", RateLimitRequest::hit()).await.unwrap();
    assert_eq!(decision.count, 1);
    second.shutdown().await;
}

#[tokio::test]
async fn test_many_identities_in_parallel() {
    let db = TestDatabaseManager::new_temp();
    let clock = Arc::new(ManualClock::new(0));
    let host = Arc::new(host(db.storage.clone(), clock));
    let request = RateLimitRequest::hit().with_limits(10, 60_000);

    let mut handles = Vec::new();
    for user in 0..8 {
        for _ in 0..5 {
            let host = host.clone();
            handles.push(tokio::spawn(async move {
                host.evaluate(&format!("user-{user}"), request).await.unwrap()
            }));
        }
    }
    for handle in handles {
        assert!(handle.await.unwrap().allowed);
    }

    for user in 0..8 {
        let state: RateLimitState = db.storage.load(&format!("user-{user}")).unwrap().unwrap();
        assert_eq!(state.count, 5);
    }
    assert_eq!(host.active_actors().await, 8);
}

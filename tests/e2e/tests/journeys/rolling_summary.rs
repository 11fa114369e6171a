//! Journey: rolling summary over a growing conversation

use std::sync::Arc;

use dreamlog_core::{ConversationKey, RefreshOutcome, SummaryConfig, SummaryEngine};
use dreamlog_e2e_tests::{ScriptedGenerator, TestDatabaseManager};

fn engine(db: &TestDatabaseManager, generator: &Arc<ScriptedGenerator>) -> SummaryEngine {
    SummaryEngine::with_config(db.storage.clone(), generator.clone(), SummaryConfig::default())
}

#[tokio::test]
async fn test_first_summary_from_five_turns() {
    let db = TestDatabaseManager::new_temp();
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_text("The dreamer walked through a flooded house.");
    let engine = engine(&db, &generator);
    let key = ConversationKey::new("dream", "block");
    db.seed_conversation(&key, 5);

    let outcome = engine.refresh(&key, "A flooded house").await.unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(
        outcome.summary_text(),
        Some("The dreamer walked through a flooded house.")
    );
    assert_eq!(db.cursor(&key), 5);
    let prompt = generator.last_prompt();
    for n in 0..5 {
        assert!(prompt.contains(&format!("turn {n}")), "turn {n} missing");
    }
}

#[tokio::test]
async fn test_below_threshold_makes_no_call() {
    let db = TestDatabaseManager::new_temp();
    let generator = Arc::new(ScriptedGenerator::new());
    let engine = engine(&db, &generator);
    let key = ConversationKey::new("dream", "block");

    db.seed_conversation(&key, 2);
    let first = engine.refresh(&key, "anchor").await.unwrap();
    let text = first.summary_text().map(str::to_string);

    for _ in 0..5 {
        db.seed_conversation(&key, 1);
        let outcome = engine.refresh(&key, "anchor").await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Skipped { .. }));
        assert_eq!(outcome.summary_text().map(str::to_string), text);
    }
    assert_eq!(generator.calls(), 1);

    // Sixth pending turn crosses the threshold
    db.seed_conversation(&key, 1);
    let outcome = engine.refresh(&key, "anchor").await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Compressed { compressed: 6, .. }));
    assert_eq!(generator.calls(), 2);
    assert_eq!(db.cursor(&key), 8);
}

#[tokio::test]
async fn test_failed_compression_is_retried_with_same_turns() {
    let db = TestDatabaseManager::new_temp();
    let generator = Arc::new(ScriptedGenerator::new());
    generator
        .push_text("summary one")
        .push_failure(502)
        .push_text("summary two");
    let engine = engine(&db, &generator);
    let key = ConversationKey::new("dream", "block");

    db.seed_conversation(&key, 3);
    engine.refresh(&key, "anchor").await.unwrap();
    assert_eq!(db.cursor(&key), 3);

    db.seed_conversation(&key, 7);
    let failed = engine.refresh(&key, "anchor").await.unwrap();
    assert!(matches!(failed, RefreshOutcome::Deferred { pending: 7, .. }));
    assert_eq!(failed.summary_text(), Some("summary one"));
    assert_eq!(db.cursor(&key), 3);

    let retried = engine.refresh(&key, "anchor").await.unwrap();
    assert_eq!(retried.summary_text(), Some("summary two"));
    assert_eq!(db.cursor(&key), 10);

    let requests = generator.requests();
    assert_eq!(requests.len(), 3);
    let failed_prompt = &requests[1].messages[1].content;
    let retry_prompt = &requests[2].messages[1].content;
    assert_eq!(failed_prompt, retry_prompt);
    assert!(retry_prompt.contains("turn 3"));
    assert!(retry_prompt.contains("turn 9"));
    assert!(!retry_prompt.contains("turn 2"));
}

#[tokio::test]
async fn test_cursor_never_decreases() {
    let db = TestDatabaseManager::new_temp();
    let generator = Arc::new(ScriptedGenerator::new());
    let engine = engine(&db, &generator);
    let key = ConversationKey::new("dream", "block");

    let mut last = 0;
    for round in 0..20 {
        db.seed_conversation(&key, round % 4);
        generator.set_down(round % 3 == 1);
        engine.refresh(&key, "anchor").await.unwrap();

        let cursor = db.cursor(&key);
        assert!(cursor >= last, "round {round}: {last} -> {cursor}");
        assert!(cursor <= db.message_count(&key));
        last = cursor;
    }
}

#[tokio::test]
async fn test_stale_write_cannot_rewind_cursor() {
    let db = TestDatabaseManager::new_temp();
    let key = ConversationKey::new("dream", "block");
    db.seed_conversation(&key, 12);

    db.storage.upsert_summary(&key, "newer", 12).unwrap();
    let after = db.storage.upsert_summary(&key, "older", 6).unwrap();

    assert_eq!(after.summary_text, "newer");
    assert_eq!(after.last_processed_count, 12);
}

#[tokio::test]
async fn test_concurrent_refreshes_compress_once() {
    let db = TestDatabaseManager::new_temp();
    let generator = Arc::new(ScriptedGenerator::new());
    let engine = Arc::new(engine(&db, &generator));
    let key = ConversationKey::new("dream", "block");
    db.seed_conversation(&key, 9);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            engine.refresh(&key, "anchor").await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(generator.calls(), 1);
    assert_eq!(db.cursor(&key), 9);
}

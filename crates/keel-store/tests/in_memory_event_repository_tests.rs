//! Integration tests for `InMemoryEventRepository`.

use chrono::Utc;
use keel_core::error::DomainError;
use keel_core::identity::Identifier;
use keel_core::repository::{EventRepository, StoredEvent};
use keel_store::InMemoryEventRepository;
use uuid::Uuid;

/// Helper to build a `StoredEvent` with sensible defaults.
fn make_stored_event(aggregate_id: &Identifier, sequence_number: i64) -> StoredEvent {
    StoredEvent {
        event_id: Uuid::new_v4(),
        aggregate_id: aggregate_id.clone(),
        event_type: "TestEvent".to_string(),
        payload: serde_json::json!({"key": "value"}),
        sequence_number,
        position: 0,
        correlation_id: Uuid::new_v4(),
        causation_id: Uuid::new_v4(),
        occurred_at: Utc::now(),
    }
}

fn new_id() -> Identifier {
    Identifier::from(Uuid::new_v4())
}

// --- load_events ---

#[tokio::test]
async fn test_load_events_returns_empty_vec_for_nonexistent_aggregate() {
    let repo = InMemoryEventRepository::new();

    let events = repo.load_events(&new_id()).await.unwrap();

    assert!(events.is_empty());
}

// --- append_events + load_events ---

#[tokio::test]
async fn test_append_and_load_single_event() {
    let repo = InMemoryEventRepository::new();
    let aggregate_id = new_id();
    let event = make_stored_event(&aggregate_id, 1);
    let expected = event.clone();

    repo.append_events(&aggregate_id, 0, &[event]).await.unwrap();

    let loaded = repo.load_events(&aggregate_id).await.unwrap();
    assert_eq!(loaded.len(), 1);
    let e = &loaded[0];
    assert_eq!(e.event_id, expected.event_id);
    assert_eq!(e.aggregate_id, aggregate_id);
    assert_eq!(e.payload, expected.payload);
    assert_eq!(e.sequence_number, 1);
    assert_eq!(e.occurred_at, expected.occurred_at);
    assert_eq!(e.position, 1);
}

// --- ordering ---

#[tokio::test]
async fn test_append_multiple_events_preserves_sequence_order() {
    let repo = InMemoryEventRepository::new();
    let aggregate_id = new_id();
    let events = vec![
        make_stored_event(&aggregate_id, 1),
        make_stored_event(&aggregate_id, 2),
        make_stored_event(&aggregate_id, 3),
    ];

    repo.append_events(&aggregate_id, 0, &events).await.unwrap();

    let loaded = repo.load_events(&aggregate_id).await.unwrap();
    let sequence: Vec<_> = loaded.iter().map(|e| e.sequence_number).collect();
    assert_eq!(sequence, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_load_events_after_returns_tail() {
    let repo = InMemoryEventRepository::new();
    let aggregate_id = new_id();
    let events: Vec<_> = (1..=4)
        .map(|n| make_stored_event(&aggregate_id, n))
        .collect();
    repo.append_events(&aggregate_id, 0, &events).await.unwrap();

    let tail = repo.load_events_after(&aggregate_id, 2).await.unwrap();

    let sequence: Vec<_> = tail.iter().map(|e| e.sequence_number).collect();
    assert_eq!(sequence, vec![3, 4]);
}

// --- aggregate isolation ---

#[tokio::test]
async fn test_aggregate_isolation() {
    let repo = InMemoryEventRepository::new();
    let agg_a = new_id();
    let agg_b = new_id();

    repo.append_events(&agg_a, 0, &[make_stored_event(&agg_a, 1)])
        .await
        .unwrap();
    repo.append_events(&agg_b, 0, &[make_stored_event(&agg_b, 1)])
        .await
        .unwrap();

    let loaded_a = repo.load_events(&agg_a).await.unwrap();
    let loaded_b = repo.load_events(&agg_b).await.unwrap();

    assert_eq!(loaded_a.len(), 1);
    assert_eq!(loaded_b.len(), 1);
    assert_eq!(loaded_a[0].aggregate_id, agg_a);
    assert_eq!(loaded_b[0].aggregate_id, agg_b);
}

// --- global positions ---

#[tokio::test]
async fn test_load_all_after_interleaves_streams_in_append_order() {
    let repo = InMemoryEventRepository::new();
    let agg_a = new_id();
    let agg_b = new_id();
    repo.append_events(&agg_a, 0, &[make_stored_event(&agg_a, 1)])
        .await
        .unwrap();
    repo.append_events(&agg_b, 0, &[make_stored_event(&agg_b, 1)])
        .await
        .unwrap();
    repo.append_events(&agg_a, 1, &[make_stored_event(&agg_a, 2)])
        .await
        .unwrap();

    let all = repo.load_all_after(0, 10).await.unwrap();
    let after_first = repo.load_all_after(1, 1).await.unwrap();

    let positions: Vec<_> = all.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
    assert_eq!(all[1].aggregate_id, agg_b);
    assert_eq!(after_first.len(), 1);
    assert_eq!(after_first[0].position, 2);
    assert!(repo.load_all_after(3, 10).await.unwrap().is_empty());
}

// --- concurrency ---

#[tokio::test]
async fn test_concurrency_conflict_on_duplicate_sequence_number() {
    let repo = InMemoryEventRepository::new();
    let aggregate_id = new_id();

    // First append succeeds.
    repo.append_events(&aggregate_id, 0, &[make_stored_event(&aggregate_id, 1)])
        .await
        .unwrap();

    // Second append with the same expected version should fail.
    let result = repo
        .append_events(&aggregate_id, 0, &[make_stored_event(&aggregate_id, 1)])
        .await;

    match result {
        Err(DomainError::ConcurrencyConflict {
            aggregate_id: conflict_agg_id,
            expected,
            actual,
        }) => {
            assert_eq!(conflict_agg_id, aggregate_id);
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stale_expected_version_with_non_overlapping_sequences() {
    let repo = InMemoryEventRepository::new();
    let aggregate_id = new_id();

    repo.append_events(
        &aggregate_id,
        0,
        &[
            make_stored_event(&aggregate_id, 1),
            make_stored_event(&aggregate_id, 2),
        ],
    )
    .await
    .unwrap();

    // Sequence numbers don't collide, but the version check must still reject.
    let result = repo
        .append_events(
            &aggregate_id,
            0,
            &[
                make_stored_event(&aggregate_id, 3),
                make_stored_event(&aggregate_id, 4),
            ],
        )
        .await;

    assert!(matches!(
        result,
        Err(DomainError::ConcurrencyConflict {
            expected: 0,
            actual: 2,
            ..
        })
    ));
    assert_eq!(repo.load_events(&aggregate_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_sequential_appends_with_correct_expected_version() {
    let repo = InMemoryEventRepository::new();
    let aggregate_id = new_id();

    repo.append_events(
        &aggregate_id,
        0,
        &[
            make_stored_event(&aggregate_id, 1),
            make_stored_event(&aggregate_id, 2),
        ],
    )
    .await
    .unwrap();
    repo.append_events(&aggregate_id, 2, &[make_stored_event(&aggregate_id, 3)])
        .await
        .unwrap();

    let loaded = repo.load_events(&aggregate_id).await.unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[2].sequence_number, 3);
}

#[tokio::test]
async fn test_append_empty_events_is_noop() {
    let repo = InMemoryEventRepository::new();
    let aggregate_id = new_id();

    repo.append_events(&aggregate_id, 7, &[]).await.unwrap();

    assert!(repo.load_events(&aggregate_id).await.unwrap().is_empty());
    assert_eq!(repo.head_position().unwrap(), 0);
}

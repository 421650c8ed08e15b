use std::sync::Arc;

use futures::future::join_all;

use adaptest_core::memory::{MemoryItemBank, MemorySessionStore};
use adaptest_core::{
    CalibratedItem, CatEngine, CatError, ContentArea, EngineConfig, IrtParams, SessionStatus,
    StartRequest,
};

fn engine_with_store(store: Arc<MemorySessionStore>) -> CatEngine {
    let mut items = Vec::new();
    for area in ContentArea::ALL {
        for i in 0..30 {
            let b = -2.5 + 5.0 * i as f64 / 30.0;
            items.push(CalibratedItem::new(
                format!("{}-{i:02}", area.as_str()),
                area,
                IrtParams::new(0.9 + (i % 5) as f64 * 0.2, b, 0.2),
            ));
        }
    }
    CatEngine::new(
        Arc::new(MemoryItemBank::new("flow", items)),
        store,
        EngineConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn full_attempt_covers_every_area() {
    let engine = engine_with_store(Arc::new(MemorySessionStore::new()));
    let started = engine
        .start(StartRequest::new(ContentArea::ALL, 20, 40, "cover"))
        .await
        .unwrap();

    let mut next = started.first_item;
    while let Some(item) = next {
        // Answer easy items correctly, hard ones wrong.
        let outcome = engine
            .submit_response(&started.session_id, &item.id, item.params.b < 0.3)
            .await
            .unwrap();
        next = outcome.next_item;
    }

    let session = engine.session(&started.session_id).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Complete);
    assert!(session.item_count() >= 20 && session.item_count() <= 40);
    for (area, coverage) in session.coverage() {
        assert!(coverage.is_met(), "{area} under-covered: {coverage:?}");
    }
    let mut ids: Vec<_> = session.responses().iter().map(|r| &r.item_id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), session.responses().len());
    assert_eq!(session.history().len(), session.responses().len());
    assert!(session.score().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_progress_independently() {
    let engine = Arc::new(engine_with_store(Arc::new(MemorySessionStore::new())));

    let runs = (0..8).map(|n| {
        let engine = Arc::clone(&engine);
        async move {
            let started = engine
                .start(StartRequest::new(ContentArea::ALL, 10, 15, format!("k{n}")))
                .await
                .unwrap();
            let mut next = started.first_item;
            let mut count = 0;
            while let Some(item) = next {
                let outcome = engine
                    .submit_response(&started.session_id, &item.id, n % 2 == 0)
                    .await
                    .unwrap();
                count = outcome.items_administered;
                next = outcome.next_item;
            }
            count
        }
    });

    let counts = join_all(runs).await;
    assert!(counts.iter().all(|c| (10..=15).contains(c)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_submits_for_one_session_are_serialized() {
    let store = Arc::new(MemorySessionStore::new());
    let engine = Arc::new(engine_with_store(store.clone()));
    let started = engine
        .start(StartRequest::new(ContentArea::ALL, 10, 20, "dup"))
        .await
        .unwrap();
    let item = started.first_item.unwrap();

    let attempts = (0..4).map(|_| {
        let engine = Arc::clone(&engine);
        let id = started.session_id.clone();
        let item_id = item.id.clone();
        async move { engine.submit_response(&id, &item_id, true).await }
    });
    let results = join_all(attempts).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, CatError::UnknownItem { .. })));

    let session = engine.session(&started.session_id).await.unwrap();
    assert_eq!(session.item_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_with_one_key_create_one_session() {
    let store = Arc::new(MemorySessionStore::new());
    let engine = Arc::new(engine_with_store(store.clone()));

    let starts = (0..6).map(|_| {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .start(StartRequest::new(ContentArea::ALL, 5, 10, "same-key"))
                .await
                .unwrap()
        }
    });
    let outcomes = join_all(starts).await;

    let first = &outcomes[0].session_id;
    assert!(outcomes.iter().all(|o| &o.session_id == first));
    assert_eq!(outcomes.iter().filter(|o| !o.resumed).count(), 1);
    assert_eq!(store.len(), 1);
}

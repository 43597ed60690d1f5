//! Concurrency tests: votes that share an item must never lose updates

mod fixtures;

use futures::future::join_all;
use gallery_elo::types::{ItemId, OutcomeReport};
use std::sync::Arc;

use fixtures::{create_test_engine, id, new_item, seeded_engine, total_rating};

/// Walk the reports as a chain of rating transitions for `item`, starting at
/// `start`. Every report must be consumed exactly once for the updates to be
/// serial.
fn assert_serial_chain(item: &ItemId, start: f64, reports: &[OutcomeReport]) -> f64 {
    let mut transitions: Vec<(f64, f64)> = reports
        .iter()
        .map(|report| {
            let change = if &report.winner.item_id == item {
                &report.winner
            } else {
                &report.loser
            };
            (change.old_rating, change.new_rating)
        })
        .collect();

    let mut current = start;
    while !transitions.is_empty() {
        let next = transitions
            .iter()
            .position(|(old, _)| (old - current).abs() < 1e-9)
            .unwrap_or_else(|| panic!("No update started from rating {}", current));
        current = transitions.swap_remove(next).1;
    }
    current
}

#[test]
fn test_hub_item_sees_every_thread_vote() {
    const VOTERS: usize = 16;
    const VOTES_EACH: usize = 25;

    let (engine, _store) = create_test_engine();
    engine.add_item(new_item("hub")).unwrap();
    for i in 0..VOTERS {
        engine.add_item(new_item(&format!("rival-{}", i))).unwrap();
    }

    let reports: Vec<OutcomeReport> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..VOTERS)
            .map(|i| {
                let engine = &engine;
                scope.spawn(move || {
                    let rival = id(&format!("rival-{}", i));
                    (0..VOTES_EACH)
                        .map(|_| engine.record_outcome(&id("hub"), &rival).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    let hub = engine.get_item(&id("hub")).unwrap();
    assert_eq!(hub.comparisons, (VOTERS * VOTES_EACH) as u64);
    assert_eq!(reports.len(), VOTERS * VOTES_EACH);

    let final_rating = assert_serial_chain(&id("hub"), 1000.0, &reports);
    assert!((final_rating - hub.rating).abs() < 1e-9);
    assert!((total_rating(&engine) - 1000.0 * (VOTERS + 1) as f64).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_pair_voted_from_many_tasks() {
    const VOTES: usize = 200;

    let (engine, _store) = seeded_engine(2);
    let engine = Arc::new(engine);

    let tasks = (0..VOTES).map(|i| {
        let engine = engine.clone();
        tokio::task::spawn_blocking(move || {
            let (winner, loser) = if i % 2 == 0 {
                (id("item-0"), id("item-1"))
            } else {
                (id("item-1"), id("item-0"))
            };
            engine.record_outcome(&winner, &loser)
        })
    });

    let reports: Vec<OutcomeReport> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("vote failed"))
        .collect();

    let a = engine.get_item(&id("item-0")).unwrap();
    let b = engine.get_item(&id("item-1")).unwrap();
    assert_eq!(a.comparisons, VOTES as u64);
    assert_eq!(b.comparisons, VOTES as u64);
    assert!((a.rating + b.rating - 2000.0).abs() < 1e-6);

    // Each commit saw the count left by the one before it
    let mut counts: Vec<u64> = reports.iter().map(|r| r.winner.comparisons).collect();
    counts.sort_unstable();
    assert_eq!(counts, (1..=VOTES as u64).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pairs_and_votes_interleave() {
    const VOTES: usize = 400;

    let (engine, _store) = seeded_engine(10);
    let engine = Arc::new(engine);

    let tasks = (0..VOTES).map(|_| {
        let engine = engine.clone();
        tokio::task::spawn_blocking(move || {
            let pair = engine.select_pair()?;
            engine.record_outcome(&pair.first.id, &pair.second.id)
        })
    });

    let results = join_all(tasks).await;
    assert!(results.iter().all(|r| matches!(r, Ok(Ok(_)))));

    let items: Vec<_> = engine
        .leaderboard(&Default::default())
        .unwrap()
        .collect();
    let comparisons: u64 = items.iter().map(|item| item.comparisons).sum();
    assert_eq!(comparisons, 2 * VOTES as u64);
    assert!(items.iter().all(|item| item.rating.is_finite()));
    assert!((total_rating(&engine) - 10_000.0).abs() < 1e-6);
}

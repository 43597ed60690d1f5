//! Rating Simulation CLI Tool
//!
//! Seeds an in-memory gallery with items of hidden strength, then lets many
//! voter threads pick pairs and vote concurrently. The stronger item wins
//! with logistic probability, so a working engine should rank items close
//! to their hidden order.
//!
//! Usage:
//!   cargo run --bin rating-sim -- --help
//!   cargo run --bin rating-sim -- --items 40 --votes 20000 --threads 8
//!   cargo run --bin rating-sim -- --snapshot /tmp/gallery.json

use anyhow::{bail, Context, Result};
use clap::Parser;
use gallery_elo::config::RatingConfig;
use gallery_elo::rating::{EloRatingCalculator, ExtendedEloConfig, InMemoryRatingStore};
use gallery_elo::types::{ItemId, ListQuery, NewItem};
use gallery_elo::{RatingEngine, RatingError};
use rand::Rng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rating-sim")]
#[command(about = "Simulate concurrent pairwise voting against the gallery-elo engine")]
struct Cli {
    /// Number of items in the gallery
    #[arg(short, long, default_value = "30")]
    items: usize,

    /// Total number of votes to cast
    #[arg(short, long, default_value = "10000")]
    votes: usize,

    /// Number of concurrent voter threads
    #[arg(short, long, default_value = "4")]
    threads: usize,

    /// Elo K-factor
    #[arg(short, long, default_value = "32.0")]
    k_factor: f64,

    /// Spread of hidden strengths around the initial rating
    #[arg(long, default_value = "300.0")]
    spread: f64,

    /// Rows of the final leaderboard to print
    #[arg(long, default_value = "10")]
    top: usize,

    /// Write the final store to this snapshot file
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Default)]
struct VoteTally {
    recorded: AtomicU64,
    upsets: AtomicU64,
    failed: AtomicU64,
}

/// Probability that an item of strength `a` beats one of strength `b`
fn win_probability(a: f64, b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((b - a) / 400.0))
}

/// Spearman rank correlation of two orderings of the same ids
fn rank_agreement(expected: &[ItemId], actual: &[ItemId]) -> f64 {
    let n = expected.len();
    if n < 2 {
        return 1.0;
    }

    let position: HashMap<&ItemId, usize> =
        actual.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let sum_sq: f64 = expected
        .iter()
        .enumerate()
        .filter_map(|(i, id)| position.get(id).map(|&j| (i as f64 - j as f64).powi(2)))
        .sum();

    let n = n as f64;
    1.0 - 6.0 * sum_sq / (n * (n * n - 1.0))
}

fn build_engine(cli: &Cli) -> Result<(RatingEngine, Arc<InMemoryRatingStore>)> {
    let rating_config = RatingConfig {
        k_factor: cli.k_factor,
        ..Default::default()
    };
    let calculator = EloRatingCalculator::new(ExtendedEloConfig::from(&rating_config))
        .context("Invalid rating configuration")?;

    let store = Arc::new(match &cli.snapshot {
        Some(path) => InMemoryRatingStore::open(path)?,
        None => InMemoryRatingStore::new(),
    });

    Ok((RatingEngine::new(store.clone(), Arc::new(calculator)), store))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.as_str().into()),
        )
        .with_target(false)
        .init();

    if cli.items < 2 {
        bail!("At least two items are needed to compare");
    }
    if cli.threads == 0 {
        bail!("At least one voter thread is needed");
    }
    if !cli.spread.is_finite() || cli.spread < 0.0 {
        bail!("Strength spread must be a non-negative number");
    }

    let (engine, store) = build_engine(&cli)?;
    if engine.item_count()? > 0 {
        bail!("Snapshot file already holds items, use a fresh path");
    }

    let mut rng = rand::rng();
    let mut strengths: HashMap<ItemId, f64> = HashMap::with_capacity(cli.items);
    for i in 0..cli.items {
        let id = format!("item-{:03}", i);
        let strength = 1000.0 + rng.random_range(-cli.spread..=cli.spread);
        engine.add_item(
            NewItem::new(format!("https://img.example/{}.png", id), format!("hidden {:.0}", strength))
                .with_id(id.clone()),
        )?;
        strengths.insert(id, strength);
    }
    info!("Seeded {} items", cli.items);

    let tally = VoteTally::default();
    let started = Instant::now();

    std::thread::scope(|scope| {
        for worker in 0..cli.threads {
            let share = cli.votes / cli.threads + usize::from(worker < cli.votes % cli.threads);
            let engine = &engine;
            let strengths = &strengths;
            let tally = &tally;

            scope.spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..share {
                    let pair = match engine.select_pair() {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!("Worker {} could not get a pair: {}", worker, e);
                            tally.failed.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    };

                    let first = strengths[&pair.first.id];
                    let second = strengths[&pair.second.id];
                    let first_wins = rng.random::<f64>() < win_probability(first, second);
                    let (winner, loser, winner_strength, loser_strength) = if first_wins {
                        (&pair.first.id, &pair.second.id, first, second)
                    } else {
                        (&pair.second.id, &pair.first.id, second, first)
                    };

                    match engine.record_outcome(winner, loser) {
                        Ok(_) => {
                            tally.recorded.fetch_add(1, Ordering::Relaxed);
                            if winner_strength < loser_strength {
                                tally.upsets.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        Err(RatingError::OutcomeStale { .. }) => {
                            tally.failed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            warn!("Worker {} vote failed: {}", worker, e);
                            tally.failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    });

    let elapsed = started.elapsed();
    let leaderboard: Vec<_> = engine.leaderboard(&ListQuery::default())?.collect();

    let mut hidden_order: Vec<ItemId> = strengths.keys().cloned().collect();
    hidden_order.sort_by(|a, b| strengths[b].total_cmp(&strengths[a]).then_with(|| a.cmp(b)));
    let rated_order: Vec<ItemId> = leaderboard.iter().map(|item| item.id.clone()).collect();

    let total_rating: f64 = leaderboard.iter().map(|item| item.rating).sum();
    let total_comparisons: u64 = leaderboard.iter().map(|item| item.comparisons).sum();
    let recorded = tally.recorded.load(Ordering::Relaxed);

    println!("🏁 Simulation finished in {:.2?}", elapsed);
    println!(
        "   Votes recorded: {} ({} upsets, {} failed)",
        recorded,
        tally.upsets.load(Ordering::Relaxed),
        tally.failed.load(Ordering::Relaxed)
    );
    println!(
        "   Throughput: {:.0} votes/s across {} threads",
        recorded as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        cli.threads
    );
    println!(
        "   Comparisons: {} (expected {})",
        total_comparisons,
        recorded * 2
    );
    println!(
        "   Rating drift: {:+.6}",
        total_rating - 1000.0 * cli.items as f64
    );
    println!(
        "   Rank agreement: {:.3}",
        rank_agreement(&hidden_order, &rated_order)
    );
    println!();
    println!("{:>4}  {:<10} {:>9} {:>9} {:>6}", "#", "item", "rating", "hidden", "votes");
    for (rank, item) in leaderboard.iter().take(cli.top).enumerate() {
        println!(
            "{:>4}  {:<10} {:>9.1} {:>9.1} {:>6}",
            rank + 1,
            item.id,
            item.rating,
            strengths[&item.id],
            item.comparisons
        );
    }

    if cli.snapshot.is_some() {
        let saved = store.save_snapshot()?;
        println!();
        println!("💾 Snapshot written with {} items", saved);
    }

    Ok(())
}

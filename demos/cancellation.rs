//! Cancellation and fault handling
//!
//! Run with: cargo run --example cancellation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sluice::prelude::*;
use tokio_util::sync::CancellationToken;

/// Example 1: Short-circuiting terminals stop infinite sources
async fn short_circuit_example() -> Result<()> {
    println!("=== Short Circuit ===");

    let produced = Arc::new(AtomicU64::new(0));
    let counter = produced.clone();
    let found = Stream::generate(move || counter.fetch_add(1, Ordering::SeqCst))
        .map(|x| x * x)
        .any_match(|x| *x > 1_000)
        .await?;

    println!(
        "Found a square above 1000: {} after producing {} values",
        found,
        produced.load(Ordering::SeqCst)
    );

    println!();
    Ok(())
}

/// Example 2: Shutting down through a parent token
async fn shutdown_example() -> Result<()> {
    println!("=== Shutdown ===");

    let shutdown = CancellationToken::new();
    let ticks = SourceBuilder::new(StreamConfig::default().label("ticks"))
        .cancel_with(&shutdown)
        .from_stream(tokio_stream::StreamExt::map(
            tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(
                Duration::from_millis(10),
            )),
            |_| 1u32,
        ));

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(55)).await;
        trigger.cancel();
    });

    match ticks.count().await {
        Err(Error::Cancelled) => println!("Pipeline cancelled by shutdown"),
        other => println!("Unexpected result: {:?}", other),
    }

    println!();
    Ok(())
}

/// Example 3: A panicking stage is reported, not lost
async fn fault_example() -> Result<()> {
    println!("=== Stage Faults ===");

    let result = SourceBuilder::new(StreamConfig::default().label("parse"))
        .from_vec(vec!["1", "2", "x", "4"])
        .map(|s| s.parse::<i32>().unwrap())
        .collect()
        .await;

    match result {
        Err(Error::StageFault { stage, message }) => {
            println!("Stage '{}' failed: {}", stage, message)
        }
        other => println!("Unexpected result: {:?}", other),
    }

    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    short_circuit_example().await?;
    shutdown_example().await?;
    fault_example().await?;

    println!("All examples completed successfully!");
    Ok(())
}

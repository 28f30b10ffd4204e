//! Basic usage examples for sluice
//!
//! Run with: cargo run --example basic

use sluice::prelude::*;

#[derive(Debug, Clone)]
struct Sale {
    region: &'static str,
    amount: f64,
}

fn sales() -> Vec<Sale> {
    vec![
        Sale { region: "north", amount: 120.0 },
        Sale { region: "south", amount: 80.5 },
        Sale { region: "north", amount: 42.0 },
        Sale { region: "east", amount: 310.25 },
        Sale { region: "south", amount: 15.0 },
    ]
}

/// Example 1: Transform and filter
async fn transform_filter_example() -> Result<()> {
    println!("=== Transform and Filter ===");

    let squares = Stream::iter(1..21)
        .filter(|x| x % 3 == 0)
        .map(|x| x * x)
        .collect()
        .await?;
    println!("Squares of multiples of 3: {:?}", squares);

    println!();
    Ok(())
}

/// Example 2: Infinite source bounded downstream
async fn generate_example() -> Result<()> {
    println!("=== Generate ===");

    let (mut a, mut b) = (0u64, 1u64);
    let fibonacci = Stream::generate(move || {
        let current = a;
        (a, b) = (b, a + b);
        current
    })
    .limit(10)
    .collect()
    .await?;
    println!("Fibonacci: {:?}", fibonacci);

    println!();
    Ok(())
}

/// Example 3: Aggregates over records
async fn aggregate_example() -> Result<()> {
    println!("=== Aggregates ===");

    let total = Stream::from_vec(sales()).sum_by(|s| s.amount).await?;
    let largest = Stream::from_vec(sales()).max_by(|s| s.amount).await?;
    let average = Stream::from_vec(sales()).avg_by(|s| s.amount).await?;
    println!("Total: {:.2}, largest: {:?}, average: {:?}", total, largest, average);

    let by_region = Stream::from_vec(sales()).group_by(|s| s.region).await?;
    for (region, items) in &by_region {
        println!("{}: {} sale(s)", region, items.len());
    }

    println!();
    Ok(())
}

/// Example 4: Sorting and chunking
async fn sort_chunk_example() -> Result<()> {
    println!("=== Sort and Chunk ===");

    let pages = Stream::from_vec(sales())
        .sort_by(|a, b| b.amount.total_cmp(&a.amount))
        .await?
        .map(|s| format!("{}:{}", s.region, s.amount))
        .chunk(2)
        .await?;
    for (i, page) in pages.iter().enumerate() {
        println!("Page {}: {:?}", i + 1, page);
    }

    println!();
    Ok(())
}

/// Example 5: Function-based sink
async fn sink_example() -> Result<()> {
    println!("=== Function Sink ===");

    let sink = sink_from_fn(|item: String| async move {
        println!("Processed: {}", item.to_uppercase());
        Ok(())
    });

    Stream::from_vec(vec!["alpha", "beta", "gamma"])
        .map(String::from)
        .sink(sink)
        .await?;

    println!();
    Ok(())
}

/// Example 6: Buffered links
async fn buffered_example() -> Result<()> {
    println!("=== Buffered Links ===");

    let config = StreamConfig::default().buffer_size(32).label("buffered");
    let count = SourceBuilder::new(config)
        .iter(0..10_000)
        .map(|x: u64| x * 7)
        .filter(|x| x % 2 == 1)
        .count()
        .await?;
    println!("Odd multiples of 7 below 70000: {}", count);

    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    transform_filter_example().await?;
    generate_example().await?;
    aggregate_example().await?;
    sort_chunk_example().await?;
    sink_example().await?;
    buffered_example().await?;

    println!("All examples completed successfully!");
    Ok(())
}

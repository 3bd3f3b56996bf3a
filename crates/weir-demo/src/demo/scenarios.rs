//! The walkthrough: one async function per [`Scenario`].
//!
//! Every scenario prints what it observes to stdout and returns it, so tests
//! can check the same values a reader sees.

use super::config::{DemoConfig, Scenario};
use core::ops::RangeInclusive;
use core::time::Duration;
use futures::{StreamExt, stream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use weir::{
    FailureKind, PoolConfig, PoolReport, Producer, WorkerPool, fan_out, merge, queue, sink, stage,
    transform,
};

/// Runs every scenario selected by `config`, stopping early once
/// `shutdown_token` is cancelled.
pub async fn run(config: DemoConfig, shutdown_token: CancellationToken) -> anyhow::Result<()> {
    println!("=== weir worker pool walkthrough ===");

    for (n, &scenario) in config.scenarios().iter().enumerate() {
        if shutdown_token.is_cancelled() {
            tracing::info!("Skipping remaining scenarios after shutdown signal");
            break;
        }
        println!("\n{}. {}:", n + 1, title(scenario));

        match scenario {
            Scenario::Pool => {
                worker_pool(&config, &shutdown_token).await?;
            }
            Scenario::Pipeline => {
                pipeline(&config, &shutdown_token).await?;
            }
            Scenario::FanIn => {
                fan_out_fan_in(&config, &shutdown_token).await?;
            }
            Scenario::Merge => {
                merge_streams(&config).await;
            }
            Scenario::Failures => {
                failures(&config, &shutdown_token).await?;
            }
            Scenario::Cancel => {
                cancellation(&config, &shutdown_token).await?;
            }
            Scenario::Timeout => {
                receive_timeout(&config).await?;
            }
            Scenario::All => unreachable!("expanded by DemoConfig::scenarios"),
        }
    }

    Ok(())
}

const fn title(scenario: Scenario) -> &'static str {
    match scenario {
        Scenario::All => "All scenarios",
        Scenario::Pool => "Worker pool",
        Scenario::Pipeline => "Pipeline",
        Scenario::FanIn => "Fan-out/Fan-in",
        Scenario::Merge => "Merge",
        Scenario::Failures => "Failing items",
        Scenario::Cancel => "Cancellation",
        Scenario::Timeout => "Receive with timeout",
    }
}

/// Simulated CPU-bound work. Transforms are synchronous, so this blocks the
/// runtime thread the worker is on.
fn simulate_work(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

/// Sends `items` and closes the queue. Stops early once no worker is left to
/// receive.
fn spawn_producer(producer: Producer<u64>, items: RangeInclusive<u64>) -> JoinHandle<()> {
    tokio::spawn(async move {
        for item in items {
            if let Err(e) = producer.send(item).await {
                tracing::debug!("Producer stopping: {e}");
                return;
            }
        }
        producer.close();
    })
}

fn print_workers(report: &PoolReport, unit: &str) {
    for worker in &report.workers {
        println!(
            "     {unit} {} processed {} items",
            worker.worker_id + 1,
            worker.processed
        );
    }
}

/// `num_workers` workers square `1..=num_items`.
pub async fn worker_pool(
    config: &DemoConfig,
    shutdown_token: &CancellationToken,
) -> anyhow::Result<Vec<u64>> {
    let (producer, tasks) = queue::bounded(config.queue_capacity);
    let (results_tx, results) = sink::bounded(config.sink_capacity);

    let delay = config.work_delay;
    let pool = WorkerPool::start(
        &PoolConfig::new(config.num_workers).with_shutdown_token(shutdown_token.child_token()),
        tasks,
        results_tx,
        transform::from_fn(move |n: u64| {
            simulate_work(delay);
            n * n
        }),
    )?;
    let feeder = spawn_producer(producer, 1..=config.num_items);

    let mut squares = Vec::new();
    while let Some(square) = results.recv().await {
        println!("     Received {square}");
        squares.push(square);
    }
    println!("     Result stream closed");

    feeder.await?;
    let report = pool.join().await?;
    print_workers(&report, "Worker");

    Ok(squares)
}

/// Two single-worker stages chained: square, then format. Output keeps the
/// input order.
pub async fn pipeline(
    config: &DemoConfig,
    shutdown_token: &CancellationToken,
) -> anyhow::Result<Vec<String>> {
    let (numbers, tasks) = queue::bounded(config.queue_capacity);
    let delay = config.work_delay;

    let (squarer, squares) = stage(
        tasks,
        config.sink_capacity,
        transform::from_fn(move |n: u64| {
            simulate_work(delay);
            (n, n * n)
        }),
    )?;
    let (formatter, lines) = stage(
        squares.into_queue(),
        config.sink_capacity,
        transform::from_fn(|(n, square): (u64, u64)| format!("{n}^2 = {square}")),
    )?;
    let feeder = spawn_producer(numbers, 1..=config.num_items);

    let mut out = Vec::new();
    loop {
        tokio::select! {
            biased;
            () = shutdown_token.cancelled() => {
                squarer.cancel();
                formatter.cancel();
                break;
            }
            line = lines.recv() => match line {
                Some(line) => {
                    println!("     {line}");
                    out.push(line);
                }
                None => break,
            },
        }
    }

    feeder.await?;
    squarer.join().await?;
    formatter.join().await?;

    Ok(out)
}

/// Three branches share one queue; their outputs are merged back.
pub async fn fan_out_fan_in(
    config: &DemoConfig,
    shutdown_token: &CancellationToken,
) -> anyhow::Result<Vec<u64>> {
    const BRANCHES: usize = 3;

    let (input, tasks) = queue::bounded(config.queue_capacity);
    let delay = config.work_delay;
    let (branches, streams) = fan_out(
        tasks,
        BRANCHES,
        config.sink_capacity,
        transform::from_fn(move |n: u64| {
            simulate_work(delay);
            n * n
        }),
    )?;
    let output = merge(streams, config.sink_capacity);
    let feeder = spawn_producer(input, 1..=config.num_items);

    let mut results = Vec::new();
    loop {
        tokio::select! {
            biased;
            () = shutdown_token.cancelled() => {
                branches.cancel();
                break;
            }
            value = output.recv() => match value {
                Some(value) => {
                    println!("     {value}");
                    results.push(value);
                }
                None => break,
            },
        }
    }

    feeder.await?;
    let report = branches.join().await?;
    print_workers(&report, "Branch");

    Ok(results)
}

/// Streams of 2, 3 and 4 values merged into one.
pub async fn merge_streams(config: &DemoConfig) -> Vec<u64> {
    let sources = [vec![10, 11], vec![20, 21, 22], vec![30, 31, 32, 33]];
    for source in &sources {
        println!("     Source {source:?}");
    }

    let merged = merge(sources.map(stream::iter), config.sink_capacity);
    let values: Vec<u64> = merged
        .inspect(|value| println!("     Merged {value}"))
        .collect()
        .await;
    println!("     Merged stream closed after {} values", values.len());

    values
}

/// Multiples of three fail; every other item still comes through.
///
/// The transform returns errors rather than panicking. A panic would be
/// recorded the same way, but the default panic hook would print it to the
/// console first.
pub async fn failures(
    config: &DemoConfig,
    shutdown_token: &CancellationToken,
) -> anyhow::Result<PoolReport> {
    let (producer, tasks) = queue::bounded(config.queue_capacity);
    let (results_tx, results) = sink::bounded(config.sink_capacity);

    let pool = WorkerPool::start(
        &PoolConfig::new(config.num_workers).with_shutdown_token(shutdown_token.child_token()),
        tasks,
        results_tx,
        |n: u64| {
            if n % 3 == 0 {
                return Err(format!("{n} is divisible by 3"));
            }
            Ok(n * 2)
        },
    )?;
    let feeder = spawn_producer(producer, 1..=config.num_items.max(6));

    while let Some(value) = results.recv().await {
        println!("     Received {value}");
    }

    feeder.await?;
    let report = pool.join().await?;
    println!(
        "     {} delivered, {} skipped",
        report.processed(),
        report.failed()
    );
    for failure in report.failures() {
        println!("     Skipped: {failure}");
    }

    Ok(report)
}

/// A pool is cancelled while most of its work is still queued.
pub async fn cancellation(
    config: &DemoConfig,
    shutdown_token: &CancellationToken,
) -> anyhow::Result<PoolReport> {
    let total = config.num_items * 10;
    let delay = config.work_delay.max(Duration::from_millis(10));

    let (producer, tasks) = queue::bounded(config.queue_capacity);
    let (results_tx, results) = sink::bounded(config.sink_capacity);
    let pool = WorkerPool::start(
        &PoolConfig::new(config.num_workers).with_shutdown_token(shutdown_token.child_token()),
        tasks,
        results_tx,
        transform::from_fn(move |n: u64| {
            simulate_work(delay);
            n
        }),
    )?;
    let feeder = spawn_producer(producer, 1..=total);
    let consumer = tokio::spawn(async move { results.count().await });

    tokio::time::sleep(delay * 2).await;
    println!("     Cancelling while work is still queued");
    let report = pool.shutdown(config.shutdown_timeout).await?;

    let delivered = consumer.await?;
    feeder.await?;

    if report.was_cancelled() {
        println!("     Operation cancelled after {delivered} of {total} items");
    } else {
        println!("     Operation completed ({delivered} items)");
    }

    Ok(report)
}

/// The consumer stops waiting before a slow result arrives, then collects it
/// anyway.
pub async fn receive_timeout(config: &DemoConfig) -> anyhow::Result<bool> {
    let patience = config.work_delay.max(Duration::from_millis(1)) * 2;
    let slow = patience * 2;

    let (producer, tasks) = queue::bounded(1);
    let (slow_stage, results) = stage(
        tasks,
        1,
        transform::from_fn(move |message: &'static str| {
            simulate_work(slow);
            message
        }),
    )?;
    producer.send("Hello").await?;
    producer.close();

    let timed_out = match results.recv_timeout(patience).await {
        Ok(Some(message)) => {
            println!("     {message}");
            false
        }
        Ok(None) => {
            println!("     Stream closed");
            false
        }
        Err(weir::Error::Timeout(after)) => {
            println!("     Timeout after {after:?}!");
            true
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(message) = results.recv().await {
        println!("     Late result: {message}");
    }
    slow_stage.join().await?;

    Ok(timed_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(scenario: Scenario) -> DemoConfig {
        DemoConfig {
            scenario,
            num_workers: 3,
            num_items: 6,
            queue_capacity: 4,
            sink_capacity: 4,
            work_delay: Duration::from_millis(1),
            shutdown_timeout: Duration::from_secs(3),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn worker_pool_squares_every_item() {
        let token = CancellationToken::new();
        let mut squares = worker_pool(&config(Scenario::Pool), &token).await.unwrap();
        squares.sort_unstable();
        assert_eq!(squares, [1, 4, 9, 16, 25, 36]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pipeline_keeps_order() {
        let token = CancellationToken::new();
        let lines = pipeline(&config(Scenario::Pipeline), &token).await.unwrap();
        assert_eq!(
            lines,
            [
                "1^2 = 1", "2^2 = 4", "3^2 = 9", "4^2 = 16", "5^2 = 25", "6^2 = 36"
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fan_in_collects_every_branch() {
        let token = CancellationToken::new();
        let mut values = fan_out_fan_in(&config(Scenario::FanIn), &token)
            .await
            .unwrap();
        values.sort_unstable();
        assert_eq!(values, [1, 4, 9, 16, 25, 36]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn merge_yields_nine_values() {
        let mut values = merge_streams(&config(Scenario::Merge)).await;
        values.sort_unstable();
        assert_eq!(values, [10, 11, 20, 21, 22, 30, 31, 32, 33]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failures_are_reported() {
        let token = CancellationToken::new();
        let report = failures(&config(Scenario::Failures), &token).await.unwrap();
        // 1..=6: 3 and 6 fail.
        assert_eq!(report.failed(), 2);
        assert_eq!(report.processed(), 4);
        assert!(
            report
                .failures()
                .all(|f| matches!(f.kind, FailureKind::Error(_)))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancellation_stops_early() {
        let token = CancellationToken::new();
        let report = cancellation(&config(Scenario::Cancel), &token)
            .await
            .unwrap();
        assert!(report.was_cancelled());
        assert!(report.processed() < 60);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn receive_gives_up_before_slow_result() {
        assert!(receive_timeout(&config(Scenario::Timeout)).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancelled_token_skips_everything() {
        let token = CancellationToken::new();
        token.cancel();
        run(config(Scenario::All), token).await.unwrap();
    }
}

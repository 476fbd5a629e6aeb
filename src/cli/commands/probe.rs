//! Probe command - fire concurrent reads for one key and report the fan-in

use crate::app::App;
use crate::cli::args::ProbeArgs;
use crate::config::Config;
use crate::error::{HerdError, HerdResult};
use crate::store::Customer;
use console::{style, Emoji};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");

/// What a probe run observed
#[derive(Debug, Default)]
pub struct ProbeReport {
    pub successes: usize,
    /// Failure message -> number of callers that saw it
    pub failures: BTreeMap<String, usize>,
    pub store_lookups: u64,
    pub hydrations: u64,
    pub elapsed: Duration,
}

/// Execute the probe command
pub async fn execute(args: ProbeArgs, config: &Config) -> HerdResult<()> {
    let report = run_probe(&args, config).await?;
    print_report(&args, &report);
    Ok(())
}

/// Issue `args.concurrency` simultaneous reads of `args.id` against a fresh stack
pub async fn run_probe(args: &ProbeArgs, config: &Config) -> HerdResult<ProbeReport> {
    if args.concurrency == 0 {
        return Err(HerdError::User("--concurrency must be at least 1".to_string()));
    }

    let mut config = config.clone();
    if let Some(latency_ms) = args.latency_ms {
        config.store.latency_ms = latency_ms;
    }

    let app = App::build(&config).await?;
    if !args.absent {
        app.store
            .insert(args.id.clone(), Customer::new(args.id.clone(), "active"))
            .await;
    }
    // Start cold so every caller misses together.
    app.reader.invalidate(&args.id).await?;

    debug!(
        "Probing {} with {} callers (coalesced: {})",
        args.id, args.concurrency, !args.uncoalesced
    );

    let started = Instant::now();
    let reads = (0..args.concurrency).map(|_| {
        let app = app.clone();
        let id = args.id.clone();
        let uncoalesced = args.uncoalesced;
        tokio::spawn(async move {
            if uncoalesced {
                app.reader.get_uncoalesced(&id).await
            } else {
                app.reader.get(&id).await
            }
        })
    });
    let outcomes = join_all(reads).await;

    let mut report = ProbeReport {
        elapsed: started.elapsed(),
        store_lookups: app.store.lookups(),
        hydrations: app.metrics.hydrations.get(),
        ..ProbeReport::default()
    };

    for outcome in outcomes {
        match outcome {
            Ok(Ok(_)) => report.successes += 1,
            Ok(Err(e)) => *report.failures.entry(e.to_string()).or_default() += 1,
            Err(e) => *report.failures.entry(format!("task failed: {}", e)).or_default() += 1,
        }
    }

    Ok(report)
}

fn print_report(args: &ProbeArgs, report: &ProbeReport) {
    let mode = if args.uncoalesced {
        "uncoalesced"
    } else {
        "coalesced"
    };

    println!(
        "{}",
        style(format!(
            "Probe {} x{} ({})",
            args.id, args.concurrency, mode
        ))
        .bold()
        .cyan()
    );
    println!();

    if report.successes > 0 {
        println!("  {} {} successful reads", CHECK, report.successes);
    }
    for (message, count) in &report.failures {
        println!("  {} {} x{}", CROSS, style(message).red(), count);
    }

    println!();
    println!("  Store lookups: {}", report.store_lookups);
    println!("  Cache writes:  {}", report.hydrations);
    println!("  Elapsed:       {:?}", report.elapsed);
}

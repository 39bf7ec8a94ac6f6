//! CLI for the debugmon event store.
//!
//! Provides commands for inspecting dashboard configs and for driving a live
//! producer/consumer demo against the store and fan-out.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use debugmon::capture::{LogLayer, TeeWriter};
use debugmon::{DashboardConfig, EntryId, Icon, Manager, Monitor, MonitorConfig, MonitorEntry};
use serde::Serialize;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// debugmon: Embedded event store for in-process debugging dashboards.
#[derive(Parser)]
#[command(name = "debugmon", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Validate a dashboard config and list its monitors.
    Info {
        /// Path to the dashboard config (JSON).
        config_path: PathBuf,
    },

    /// Run concurrent producers and consumers against live monitors.
    Demo {
        /// Dashboard config to use instead of the built-in one.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Producer threads per monitor.
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
        producers: u32,

        /// Payloads added by each producer.
        #[arg(long, default_value_t = 25)]
        records: u32,

        /// How consumers receive new entries.
        #[arg(long, default_value = "stream")]
        mode: ConsumeMode,

        /// Delay between `since` polls in poll mode.
        #[arg(long, default_value_t = 50)]
        poll_interval_ms: u64,

        /// Idle time before a keepalive line in stream mode.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        keepalive_secs: u64,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Consumer delivery mode.
#[derive(Clone, Copy, ValueEnum)]
enum ConsumeMode {
    /// Push: an add subscription per monitor.
    Stream,
    /// Pull: repeated `since(cursor)` queries.
    Poll,
}

/// Output format for printed entries.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One human-readable line per entry.
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("dashboard config has no monitors")]
    NoMonitors,

    #[error("producer thread for monitor '{monitor}' panicked")]
    ProducerPanicked { monitor: String },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { config_path } => cmd_info(&config_path),
        Commands::Demo {
            config,
            producers,
            records,
            mode,
            poll_interval_ms,
            keepalive_secs,
            format,
        } => cmd_demo(&DemoOptions {
            config,
            producers,
            records,
            mode,
            poll_interval: Duration::from_millis(poll_interval_ms),
            keepalive: Duration::from_secs(keepalive_secs),
            format,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `debugmon info <config_path>`.
fn cmd_info(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = DashboardConfig::load(config_path)?;
    let manager = Manager::from_config(config)?;

    println!("Dashboard: {}", config_path.display());
    println!("Monitors: {}", manager.len());
    println!();

    for (i, monitor) in manager.monitors().iter().enumerate() {
        let landing = if i == 0 { " (landing page)" } else { "" };
        println!("  Monitor {i}: \"{}\"{landing}", monitor.name());
        println!("    Display name: {}", monitor.display_name());
        println!("    Icon: {}", monitor.icon().as_str());
        println!("    Capacity: {} records", monitor.store().capacity());
        println!(
            "    Subscriber buffer: {} notifications",
            monitor.store().subscriber_buffer()
        );
    }

    Ok(())
}

struct DemoOptions {
    config: Option<PathBuf>,
    producers: u32,
    records: u32,
    mode: ConsumeMode,
    poll_interval: Duration,
    keepalive: Duration,
    format: OutputFormat,
}

/// The dashboard used when `demo` runs without `--config`.
fn default_dashboard() -> DashboardConfig {
    DashboardConfig {
        monitors: vec![
            MonitorConfig::new("requests")
                .with_display_name("Requests")
                .with_icon(Icon::GlobeAlt)
                .with_max_records(100),
            MonitorConfig::new("logs")
                .with_display_name("Logs")
                .with_icon(Icon::DocumentText)
                .with_max_records(100),
            MonitorConfig::new("writer")
                .with_display_name("Writer")
                .with_icon(Icon::CircleStack)
                .with_max_records(100),
        ],
    }
}

/// What a producer thread feeds into its monitor.
#[derive(Clone, Copy)]
enum ProducerKind {
    /// Synthetic HTTP request payloads via [`Monitor::add`].
    Requests,
    /// `tracing` events picked up by the [`LogLayer`].
    Logs,
    /// Raw lines through a [`TeeWriter`].
    Writer,
}

/// Implements `debugmon demo`.
fn cmd_demo(options: &DemoOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &options.config {
        Some(path) => DashboardConfig::load(path)?,
        None => default_dashboard(),
    };
    let manager = Manager::from_config(config)?;
    if manager.is_empty() {
        return Err(DemoError::NoMonitors.into());
    }

    // First document-style monitor receives captured log events.
    let log_monitor = manager
        .monitors()
        .into_iter()
        .find(|m| *m.icon() == Icon::DocumentText);
    init_tracing(log_monitor.clone());

    let plan: Vec<(Arc<Monitor>, ProducerKind)> = manager
        .monitors()
        .into_iter()
        .map(|monitor| {
            let kind = if log_monitor
                .as_ref()
                .is_some_and(|logs| Arc::ptr_eq(logs, &monitor))
            {
                ProducerKind::Logs
            } else if *monitor.icon() == Icon::CircleStack {
                ProducerKind::Writer
            } else {
                ProducerKind::Requests
            };
            (monitor, kind)
        })
        .collect();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let printed = runtime.block_on(run_demo(options, &plan))?;

    print_summary(options.format, &manager, &printed)?;
    Ok(())
}

fn init_tracing(log_monitor: Option<Arc<Monitor>>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let capture = log_monitor.map(|monitor| LogLayer::new(monitor).with_max_level(tracing::Level::DEBUG));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .with(capture)
        .init();
}

/// Runs consumers and producers to completion.
///
/// Returns the number of entries each consumer printed, in plan order.
async fn run_demo(
    options: &DemoOptions,
    plan: &[(Arc<Monitor>, ProducerKind)],
) -> Result<Vec<usize>, Box<dyn std::error::Error>> {
    let (done_tx, done_rx) = watch::channel(false);

    // Consumers attach before any producer starts.
    let consumers: Vec<_> = plan
        .iter()
        .map(|(monitor, _)| {
            let monitor = Arc::clone(monitor);
            let done = done_rx.clone();
            let format = options.format;
            match options.mode {
                ConsumeMode::Stream => {
                    let subscription = monitor.subscribe_add();
                    let keepalive = options.keepalive;
                    tokio::spawn(async move {
                        consume_stream(monitor, subscription, done, keepalive, format).await
                    })
                }
                ConsumeMode::Poll => {
                    let interval = options.poll_interval;
                    tokio::spawn(
                        async move { consume_poll(monitor, done, interval, format).await },
                    )
                }
            }
        })
        .collect();

    tracing::info!(
        monitors = plan.len(),
        producers = options.producers,
        records = options.records,
        "starting demo"
    );

    let producers = options.producers;
    let records = options.records;
    let producer_plan = plan.to_vec();
    tokio::task::spawn_blocking(move || run_producers(&producer_plan, producers, records))
        .await??;

    // send only fails once every consumer is gone.
    let _ = done_tx.send(true);

    let mut printed = Vec::with_capacity(consumers.len());
    for consumer in consumers {
        printed.push(consumer.await??);
    }
    Ok(printed)
}

fn run_producers(
    plan: &[(Arc<Monitor>, ProducerKind)],
    producers: u32,
    records: u32,
) -> Result<(), DemoError> {
    let mut handles = Vec::new();
    for (monitor, kind) in plan {
        for worker in 0..producers {
            let name = monitor.name().to_string();
            let monitor = Arc::clone(monitor);
            let kind = *kind;
            let handle = thread::spawn(move || produce(&monitor, kind, worker, records));
            handles.push((name, handle));
        }
    }

    for (monitor, handle) in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(monitor = %monitor, "producer stopped early: {e}"),
            Err(_) => return Err(DemoError::ProducerPanicked { monitor }),
        }
    }
    Ok(())
}

fn produce(
    monitor: &Arc<Monitor>,
    kind: ProducerKind,
    worker: u32,
    records: u32,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match kind {
        ProducerKind::Requests => {
            for n in 0..records {
                monitor.add(&serde_json::json!({
                    "method": if n % 4 == 0 { "POST" } else { "GET" },
                    "uri": format!("/items/{n}"),
                    "status": if n % 10 == 9 { 500 } else { 200 },
                    "worker": worker,
                }))?;
            }
        }
        ProducerKind::Logs => {
            for n in 0..records {
                tracing::debug!(target: "demo::app", worker, n, "handled job");
            }
        }
        ProducerKind::Writer => {
            let mut tee = TeeWriter::new(std::io::sink(), Arc::clone(monitor));
            for n in 0..records {
                tee.write_all(format!("worker {worker} line {n}\n").as_bytes())?;
            }
            tee.flush()?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct EntryLine<'a> {
    monitor: &'a str,
    #[serde(flatten)]
    entry: &'a MonitorEntry,
}

fn print_entry(format: OutputFormat, monitor: &str, entry: &MonitorEntry) -> serde_json::Result<()> {
    match format {
        OutputFormat::Text => println!("[{monitor}] #{} {}", entry.id(), entry.payload()),
        OutputFormat::Json => println!("{}", serde_json::to_string(&EntryLine { monitor, entry })?),
    }
    Ok(())
}

fn print_keepalive(format: OutputFormat, monitor: &str) {
    match format {
        OutputFormat::Text => println!("[{monitor}] : keepalive"),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "monitor": monitor, "keepalive": true }));
        }
    }
}

/// Push consumer: follows an add subscription until producers finish, then
/// recovers anything the subscription dropped from the store.
async fn consume_stream(
    monitor: Arc<Monitor>,
    mut subscription: debugmon::Subscription<Arc<MonitorEntry>>,
    mut done: watch::Receiver<bool>,
    keepalive: Duration,
    format: OutputFormat,
) -> serde_json::Result<usize> {
    let name = monitor.name();
    let mut seen = HashSet::new();

    // Initial page load.
    for entry in monitor.since(EntryId::ZERO) {
        if seen.insert(entry.id()) {
            print_entry(format, name, &entry)?;
        }
    }

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + keepalive, keepalive);
    loop {
        tokio::select! {
            received = subscription.recv() => match received {
                Some(entry) => {
                    if seen.insert(entry.id()) {
                        print_entry(format, name, &entry)?;
                    }
                    ticker.reset();
                }
                None => break,
            },
            _ = ticker.tick() => print_keepalive(format, name),
            changed = done.changed() => {
                if changed.is_err() || *done.borrow() {
                    break;
                }
            }
        }
    }

    while let Ok(entry) = subscription.try_recv() {
        if seen.insert(entry.id()) {
            print_entry(format, name, &entry)?;
        }
    }
    subscription.close();

    // Notifications dropped on a full queue are still in the store.
    let mut recovered = 0;
    for entry in monitor.since(EntryId::ZERO) {
        if seen.insert(entry.id()) {
            print_entry(format, name, &entry)?;
            recovered += 1;
        }
    }
    if recovered > 0 {
        tracing::info!(monitor = name, recovered, "recovered dropped notifications");
    }

    Ok(seen.len())
}

/// Pull consumer: repeated `since(cursor)` until producers finish and a
/// final query comes back empty.
async fn consume_poll(
    monitor: Arc<Monitor>,
    done: watch::Receiver<bool>,
    interval: Duration,
    format: OutputFormat,
) -> serde_json::Result<usize> {
    let name = monitor.name();
    let mut cursor = EntryId::ZERO;
    let mut printed = 0;

    loop {
        let finished = *done.borrow();
        let batch = monitor.since(cursor);
        for entry in &batch {
            print_entry(format, name, entry)?;
            cursor = entry.id();
        }
        printed += batch.len();

        if finished && batch.is_empty() {
            break;
        }
        tokio::time::sleep(interval).await;
    }

    Ok(printed)
}

#[derive(Serialize)]
struct MonitorSummary<'a> {
    monitor: &'a str,
    printed: usize,
    retained: usize,
    capacity: usize,
    oldest_id: Option<EntryId>,
    newest_id: Option<EntryId>,
}

fn print_summary(
    format: OutputFormat,
    manager: &Manager,
    printed: &[usize],
) -> Result<(), Box<dyn std::error::Error>> {
    if let OutputFormat::Text = format {
        println!();
        println!("Summary:");
    }

    for (monitor, printed) in manager.monitors().iter().zip(printed) {
        let store = monitor.store();
        let summary = MonitorSummary {
            monitor: monitor.name(),
            printed: *printed,
            retained: store.len(),
            capacity: store.capacity(),
            oldest_id: store.oldest_id(),
            newest_id: store.newest_id(),
        };

        match format {
            OutputFormat::Text => {
                let range = match (summary.oldest_id, summary.newest_id) {
                    (Some(oldest), Some(newest)) => format!("ids {oldest}..={newest}"),
                    _ => "empty".to_string(),
                };
                println!(
                    "  {}: printed {}, retained {}/{} ({range})",
                    summary.monitor, summary.printed, summary.retained, summary.capacity
                );
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(&serde_json::json!({ "summary": summary }))?);
            }
        }
    }

    Ok(())
}

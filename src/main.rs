use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use netsoak::config::AppConfig;
use netsoak::endpoint;
use netsoak::probe::LatencyProbe;
use netsoak::session::{SessionParams, TestController};
use netsoak::units::{self, Budget};

#[derive(Parser)]
#[command(
    name = "netsoak",
    about = "Budget-bounded multi-stream network throughput tester",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a throughput test until the traffic budget is consumed
    Run {
        /// Endpoint preset id (see `netsoak endpoints`)
        #[arg(long, conflicts_with = "url")]
        endpoint: Option<String>,

        /// Custom download URL (http/https)
        #[arg(long)]
        url: Option<String>,

        /// Number of parallel download streams (1-16)
        #[arg(long)]
        threads: Option<u32>,

        /// Traffic budget, e.g. 500MB, 1.5GB, 1TB
        #[arg(long)]
        budget: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List the known endpoint presets
    Endpoints {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Measure request latency against an endpoint
    Probe {
        /// Endpoint preset id or custom URL
        target: String,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.logging.level.clone())
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            endpoint,
            url,
            threads,
            budget,
            json,
        } => {
            run_test(&config, endpoint, url, threads, budget, json).await?;
        }
        Commands::Endpoints { json } => {
            list_endpoints(&config, json)?;
        }
        Commands::Probe { target, json } => {
            run_probe(&config, &target, json).await?;
        }
    }

    Ok(())
}

async fn run_test(
    config: &AppConfig,
    endpoint: Option<String>,
    url: Option<String>,
    threads: Option<u32>,
    budget: Option<String>,
    json: bool,
) -> Result<()> {
    let target = endpoint::resolve_target(
        endpoint.as_deref(),
        url.as_deref(),
        &config.endpoints,
        &config.test.endpoint,
    )?;
    let budget: Budget = budget.as_deref().unwrap_or(&config.test.budget).parse()?;
    let params = SessionParams {
        url: target,
        thread_count: threads.unwrap_or(config.test.threads),
        target_bytes: budget.to_bytes(),
    };

    tracing::info!(url = %params.url, threads = params.thread_count, budget = %budget, "Starting throughput test");

    let controller = Arc::new(TestController::new());
    let mut events = controller.events();
    let mut snapshots = controller.snapshots();
    controller.start(params).await?;

    // Ctrl-C requests a stop; the session tears down and still reports its
    // summary.
    {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                controller.stop().await;
            }
        });
    }

    let render = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(record) => println!("{record}"),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                },
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snap = *snapshots.borrow_and_update();
                    let mut stderr = std::io::stderr();
                    let _ = write!(
                        stderr,
                        "\r{:>12}   {:>12}   {:>5.1}%  ",
                        units::format_rate(snap.smoothed_bytes_per_sec),
                        units::format_bytes(snap.total_bytes),
                        snap.progress_pct,
                    );
                    let _ = stderr.flush();
                }
            }
        }
    });

    let summary = controller.join().await;
    render.abort();
    eprintln!();

    match summary {
        Some(summary) if json => println!("{}", serde_json::to_string_pretty(&summary)?),
        Some(summary) => {
            println!("\n=== Throughput Test Summary ===");
            println!("Outcome:    {}", summary.reason);
            println!("Traffic:    {}", units::format_bytes(summary.total_bytes));
            println!("Elapsed:    {:.1}s", summary.elapsed_secs);
            println!(
                "Mean speed: {}",
                units::format_rate(summary.mean_bytes_per_sec)
            );
            println!("===============================\n");
        }
        None => anyhow::bail!("session produced no summary"),
    }

    Ok(())
}

fn list_endpoints(config: &AppConfig, json: bool) -> Result<()> {
    let mut presets = endpoint::builtin_presets();
    presets.extend(config.endpoints.iter().cloned());

    if json {
        println!("{}", serde_json::to_string_pretty(&presets)?);
    } else {
        println!("{:<12} | {:<24} | URL", "ID", "Name");
        println!("{:-<12}-|-{:-<24}-|-{:-<40}", "", "", "");
        for ep in presets {
            println!("{:<12} | {:<24} | {}", ep.id, ep.display_name, ep.url);
        }
    }
    Ok(())
}

async fn run_probe(config: &AppConfig, target: &str, json: bool) -> Result<()> {
    // Accept a preset id first, then fall back to a raw URL.
    let url = match endpoint::find_preset(target, &config.endpoints) {
        Some(ep) => endpoint::parse_custom_url(&ep.url)?,
        None => endpoint::parse_custom_url(target)?,
    };

    tracing::info!(url = %url, "Probing endpoint latency");
    let measurement = LatencyProbe::default().measure(&url).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&measurement)?);
    } else {
        let status = if measurement.success { "ok" } else { "failed" };
        println!(
            "{}: {:.1} ms ({})",
            measurement.target, measurement.elapsed_ms, status
        );
    }
    Ok(())
}

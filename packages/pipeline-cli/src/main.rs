//! `pipeline`: the operator CLI (spec §6) — `enqueue` / `status` / `reconcile`.
//!
//! Clap-derive shape and `tracing-subscriber` env-filter wiring pulled from
//! the corpus's dominant CLI pattern rather than from the teacher (a
//! library crate with no binary of its own).

mod config;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use job_queue::{JobQueue, NewJob, PostgresJobQueue, Queue};
use pipeline_core::job_shapes;
use pipeline_types::{RunId, Stage, Subdomain};
use reconciler::{FsSiteFilesystem, Reconciler, ReconcilerConfig};
use site_store::{PostgresSiteStore, SiteStore};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::PipelineConfig;

/// Distinct process exit codes (spec §6: "fail-fast, no retry loop in the
/// CLI itself"). `0` is success; clap itself exits `2` on a usage error,
/// so the store/queue codes start above that to stay distinguishable.
const EXIT_STORE_UNREACHABLE: i32 = 10;
const EXIT_QUEUE_UNREACHABLE: i32 = 11;
const EXIT_COMMAND_FAILED: i32 = 12;

#[derive(Parser)]
#[command(name = "pipeline")]
#[command(version, about = "Operator CLI for the document pipeline coordination core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enqueue a fresh fetch run for a site.
    Enqueue {
        subdomain: String,
        #[arg(long, value_enum, default_value_t = Priority::Normal)]
        priority: Priority,
    },
    /// Print queue depths, or one site's stage and counters.
    Status {
        #[arg(long)]
        site: Option<String>,
    },
    /// Run one reconciler sweep over stale sites.
    Reconcile {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        threshold_hours: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Priority {
    High,
    Normal,
    Low,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "pipeline_cli=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "failed to load configuration");
            std::process::exit(EXIT_COMMAND_FAILED);
        }
    };

    let site_store: Arc<dyn SiteStore> = match connect_site_store(&config.database_url).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(%err, "site store unreachable");
            std::process::exit(EXIT_STORE_UNREACHABLE);
        }
    };

    let job_queue: Arc<dyn JobQueue> = match connect_job_queue(&config.database_url).await {
        Ok(queue) => queue,
        Err(err) => {
            tracing::error!(%err, "job queue unreachable");
            std::process::exit(EXIT_QUEUE_UNREACHABLE);
        }
    };

    let result = match cli.command {
        Command::Enqueue { subdomain, priority } => cmd_enqueue(site_store, job_queue, subdomain, priority).await,
        Command::Status { site } => cmd_status(site_store, job_queue, site).await,
        Command::Reconcile { dry_run, threshold_hours } => {
            cmd_reconcile(site_store, job_queue, &config, dry_run, threshold_hours).await
        }
    };

    if let Err(err) = result {
        tracing::error!(%err, "command failed");
        std::process::exit(EXIT_COMMAND_FAILED);
    }
}

async fn connect_site_store(database_url: &str) -> Result<Arc<dyn SiteStore>> {
    let pool = PgPoolOptions::new().max_connections(5).connect(database_url).await?;
    Ok(Arc::new(PostgresSiteStore::new(pool)))
}

async fn connect_job_queue(database_url: &str) -> Result<Arc<dyn JobQueue>> {
    let pool = PgPoolOptions::new().max_connections(5).connect(database_url).await?;
    Ok(Arc::new(PostgresJobQueue::new(pool)))
}

async fn cmd_enqueue(site_store: Arc<dyn SiteStore>, job_queue: Arc<dyn JobQueue>, subdomain: String, priority: Priority) -> Result<()> {
    let subdomain = Subdomain::new(subdomain);
    let site = site_store.get(&subdomain).await?;
    let run_id = RunId::new(&subdomain, Utc::now());

    // Only `high` gets special routing (spec §4.2: the `High` queue jumps
    // ahead of the stage queues); `normal`/`low` both ride the ordinary
    // fetch queue, since nothing in the job queue models a distinct
    // low-priority lane.
    let queue = match priority {
        Priority::High => Queue::High,
        Priority::Normal | Priority::Low => Queue::for_stage(Stage::Fetch),
    };

    let job = NewJob::new(queue, job_shapes::FETCH).with_args(serde_json::json!({
        "subdomain": subdomain.as_str(),
        "run_id": run_id.as_str(),
    }));
    let job_id = job_queue.enqueue(job).await?;

    println!("enqueued fetch for {} (site: {}) as job {} run {}", subdomain, site.name, job_id, run_id);
    Ok(())
}

async fn cmd_status(site_store: Arc<dyn SiteStore>, job_queue: Arc<dyn JobQueue>, site: Option<String>) -> Result<()> {
    let depths = job_queue.queue_depths().await?;
    println!("Queue depths (queued, deferred):");
    for queue in Queue::ALL {
        let (queued, deferred) = depths.get(&queue).copied().unwrap_or((0, 0));
        println!("  {queue:<12} {queued:>5} queued  {deferred:>5} deferred");
    }
    println!();

    match site {
        Some(subdomain) => {
            let subdomain = Subdomain::new(subdomain);
            let site = site_store.get(&subdomain).await?;
            println!("{}: stage={} legacy_status={}", site.subdomain, site.pipeline_stage, site.legacy_status().as_str());
            for stage in Stage::ALL {
                let counters = site.counters(stage);
                println!("  {stage:<12} total={:<5} completed={:<5} failed={:<5}", counters.total, counters.completed, counters.failed);
            }
            if let Some(last_error) = &site.last_error {
                println!("  last_error: [{}] {}", last_error.stage, last_error.message);
            }
        }
        None => {
            let oldest = site_store.oldest_updated().await?;
            match oldest {
                Some(site) if site.is_in_flight() => {
                    println!("oldest in-flight site: {} (stage={}, updated_at={})", site.subdomain, site.pipeline_stage, site.updated_at);
                }
                Some(_) | None => println!("no sites currently in flight"),
            }
        }
    }

    Ok(())
}

async fn cmd_reconcile(
    site_store: Arc<dyn SiteStore>,
    job_queue: Arc<dyn JobQueue>,
    config: &PipelineConfig,
    dry_run: bool,
    threshold_hours: Option<u64>,
) -> Result<()> {
    let mut reconciler_config = ReconcilerConfig::default().with_stale_threshold(config.reconcile_threshold);
    if let Some(hours) = threshold_hours {
        reconciler_config = reconciler_config.with_stale_threshold(std::time::Duration::from_secs(hours * 3600));
    }

    let filesystem = Arc::new(FsSiteFilesystem::new(&config.storage_root));
    let reconciler = Reconciler::new(site_store, job_queue, filesystem, reconciler_config);
    let report = reconciler.sweep(dry_run).await?;

    println!("recovered: {}", join_subdomains(&report.recovered));
    println!("requeued:  {}", join_subdomains(&report.requeued));
    println!("stalled:   {}", join_subdomains(&report.stalled));

    Ok(())
}

fn join_subdomains(subdomains: &[Subdomain]) -> String {
    if subdomains.is_empty() {
        return "(none)".to_string();
    }
    subdomains.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
}

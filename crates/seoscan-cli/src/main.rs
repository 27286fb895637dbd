use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use seoscan_client::{HtmlLinkExtractor, ReqwestFetcher, SeoAnalyzer};
use seoscan_core::crawl::{PageProcessor, ProcessorConfig};
use seoscan_core::job::{RetryPolicy, WorkerConfig};
use seoscan_core::models::{DuplicateGroup, Observation};
use seoscan_core::rate_limit::{RateLimitConfig, RateLimiter};
use seoscan_core::scan::{DEFAULT_MAX_ATTEMPTS, ScanService};
use seoscan_core::worker::{TracingWorkerReporter, WorkerPool};
use seoscan_db::{CrawlJobRepository, Database, DatabaseConfig, FrontierRepository};

#[derive(Parser)]
#[command(name = "seoscan", version, about = "Breadth-first SEO crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new scan from a root URL
    Scan {
        /// Root URL; only links on the same host are followed
        url: String,

        /// Attempts per page before it is marked failed
        #[arg(long, env = "SEOSCAN_JOB_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
        attempts: u32,
    },

    /// Process crawl jobs until interrupted
    Worker(WorkerArgs),

    /// Show page counts for a scan (completes it if nothing is left)
    Status {
        scan_id: Uuid,

        /// Print JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List recent scans
    List {
        /// Number of scans to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Print JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show SEO observations of a scan, grouped by page, and duplicated metadata
    Report {
        scan_id: Uuid,

        /// Print JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args)]
struct WorkerArgs {
    /// Worker identifier (defaults to a random one)
    #[arg(long, env = "SEOSCAN_WORKER_ID")]
    worker_id: Option<String>,

    /// Maximum number of pages processed at the same time
    #[arg(short, long, env = "SEOSCAN_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Attempts for jobs this worker enqueues and retries
    #[arg(long, env = "SEOSCAN_JOB_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    attempts: u32,

    /// Base delay of the exponential retry backoff
    #[arg(long, env = "SEOSCAN_BACKOFF_MS", default_value_t = 1000)]
    backoff_ms: u64,

    /// Jobs admitted per rate limit window (0 disables the limit)
    #[arg(long, env = "SEOSCAN_RATE_LIMIT_MAX", default_value_t = 1000)]
    rate_limit_max: u32,

    /// Rate limit window length
    #[arg(long, env = "SEOSCAN_RATE_LIMIT_WINDOW_MS", default_value_t = 5000)]
    rate_limit_window_ms: u64,

    /// HTTP timeout per page fetch
    #[arg(long, env = "SEOSCAN_FETCH_TIMEOUT_SECS", default_value_t = 10)]
    fetch_timeout_secs: u64,

    /// Running jobs locked longer than this are considered abandoned
    #[arg(long, env = "SEOSCAN_LEASE_TIMEOUT_SECS", default_value_t = 300)]
    lease_timeout_secs: u64,

    /// How often this worker looks for abandoned jobs
    #[arg(long, env = "SEOSCAN_REAP_INTERVAL_SECS", default_value_t = 60)]
    reap_interval_secs: u64,

    /// Request every image and report broken ones
    #[arg(long, env = "SEOSCAN_CHECK_IMAGES", default_value_t = false)]
    check_images: bool,

    /// Request every same-host link and report broken ones on the linking page
    #[arg(long, env = "SEOSCAN_CHECK_LINKS", default_value_t = false)]
    check_links: bool,

    /// Stop once the queue is empty instead of waiting for new scans
    #[arg(long, default_value_t = false)]
    exit_when_idle: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("seoscan=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let stores = Stores::connect().await?;

    let result = match cli.command {
        Commands::Scan { url, attempts } => cmd_scan(&stores, &url, attempts).await,
        Commands::Worker(args) => cmd_worker(&stores, args).await,
        Commands::Status { scan_id, json } => cmd_status(&stores, scan_id, json).await,
        Commands::List { limit, json } => cmd_list(&stores, limit, json).await,
        Commands::Report { scan_id, json } => cmd_report(&stores, scan_id, json).await,
    };

    stores.close().await;
    result
}

/// Frontier and queue connections; the queue may live in its own database.
struct Stores {
    frontier_db: Database,
    queue_db: Database,
}

impl Stores {
    async fn connect() -> Result<Self> {
        let frontier_config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
        let queue_config = DatabaseConfig::queue_from_env().map_err(|e| anyhow::anyhow!(e))?;

        let frontier_db = connect_db(&frontier_config).await?;
        let queue_db = if queue_config.same_database(&frontier_config) {
            frontier_db.clone()
        } else {
            connect_db(&queue_config).await?
        };

        Ok(Self {
            frontier_db,
            queue_db,
        })
    }

    fn frontier(&self) -> FrontierRepository {
        self.frontier_db.frontier_repo()
    }

    fn queue(&self) -> CrawlJobRepository {
        self.queue_db.job_repo()
    }

    fn scans(&self) -> ScanService<FrontierRepository, CrawlJobRepository> {
        ScanService::new(self.frontier(), self.queue())
    }

    async fn close(&self) {
        self.queue_db.close().await;
        self.frontier_db.close().await;
    }
}

async fn connect_db(config: &DatabaseConfig) -> Result<Database> {
    let db = Database::connect(config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

async fn cmd_scan(stores: &Stores, url: &str, attempts: u32) -> Result<()> {
    let scan = stores
        .scans()
        .with_max_attempts(attempts)
        .start(url)
        .await
        .with_context(|| format!("Failed to start scan of {url}"))?;

    println!("{}", scan.id);
    Ok(())
}

async fn cmd_worker(stores: &Stores, args: WorkerArgs) -> Result<()> {
    let queue = stores.queue();

    let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(args.fetch_timeout_secs))
        .context("Failed to create HTTP client")?
        // The operator chooses what to crawl, including intranet sites.
        .allow_private_urls();

    let processor = PageProcessor::new(
        stores.frontier(),
        queue.clone(),
        fetcher,
        HtmlLinkExtractor::new(),
        SeoAnalyzer::new(),
        ProcessorConfig {
            max_attempts: args.attempts,
            check_images: args.check_images,
            check_links: args.check_links,
            ..ProcessorConfig::default()
        },
    );

    let mut config = WorkerConfig::default()
        .with_concurrency(args.concurrency)
        .with_retry_policy(RetryPolicy::new(
            args.attempts,
            Duration::from_millis(args.backoff_ms),
        ))
        .with_lease_timeout(Duration::from_secs(args.lease_timeout_secs))
        .with_reap_interval(Duration::from_secs(args.reap_interval_secs))
        .exit_when_idle(args.exit_when_idle);
    if let Some(id) = args.worker_id {
        config = config.with_worker_id(id);
    }

    let limiter = RateLimiter::new(RateLimitConfig::new(
        args.rate_limit_max,
        Duration::from_millis(args.rate_limit_window_ms),
    ));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight pages");
            on_signal.cancel();
        }
    });

    WorkerPool::new(queue, processor, limiter, config)
        .run(cancel, &TracingWorkerReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}

async fn cmd_status(stores: &Stores, scan_id: Uuid, json: bool) -> Result<()> {
    let report = stores
        .scans()
        .status(scan_id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let scan = &report.scan;
    let counts = &report.counts;
    println!("Scan {} ({})", scan.id, scan.start_url);
    println!("  status:     {}", scan.status);
    println!(
        "  started:    {}",
        scan.start_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(end) = scan.end_time {
        println!("  finished:   {}", end.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!(
        "  pages:      {} total, {} pending, {} processing, {} completed, {} failed",
        counts.total, counts.pending, counts.processing, counts.completed, counts.failed
    );
    if report.completed_now {
        println!("  (marked completed just now)");
    }

    Ok(())
}

async fn cmd_list(stores: &Stores, limit: usize, json: bool) -> Result<()> {
    let scans = stores
        .scans()
        .list(limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scans)?);
        return Ok(());
    }

    if scans.is_empty() {
        println!("No scans found");
        return Ok(());
    }

    for scan in &scans {
        println!(
            "{}  {:<9}  {}  {}",
            scan.id,
            scan.status.as_str(),
            scan.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            scan.start_url
        );
    }

    Ok(())
}

async fn cmd_report(stores: &Stores, scan_id: Uuid, json: bool) -> Result<()> {
    let findings = stores
        .scans()
        .findings(scan_id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
        return Ok(());
    }

    if findings.observations.is_empty() && findings.duplicates.is_empty() {
        println!("No observations for scan {scan_id}");
        return Ok(());
    }

    for (url, group) in group_by_page(&findings.observations) {
        println!("{url}");
        for observation in group {
            println!("  [{}] {}", observation.kind, observation.message);
        }
    }

    if !findings.duplicates.is_empty() {
        println!("\nDuplicated metadata");
        for group in &findings.duplicates {
            println!("{}", duplicate_heading(group));
            for url in &group.urls {
                println!("  {url}");
            }
        }
    }

    println!(
        "\nTotal: {} observations, {} duplicate groups",
        findings.observations.len(),
        findings.duplicates.len()
    );

    Ok(())
}

fn duplicate_heading(group: &DuplicateGroup) -> String {
    format!(
        "[{}] \"{}\" on {} pages",
        group.kind,
        group.value,
        group.urls.len()
    )
}

/// Observations arrive sorted by URL; split them into per-page runs.
fn group_by_page(observations: &[Observation]) -> Vec<(&str, &[Observation])> {
    observations
        .chunk_by(|a, b| a.url == b.url)
        .map(|group| (group[0].url.as_str(), group))
        .collect()
}

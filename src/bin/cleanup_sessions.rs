//! # cleanup-sessions
//!
//! Evicts sessions idle past the cleanup cutoff and announces them offline.
//!
//! ```bash
//! cleanup-sessions --dry-run              # list what would go
//! cleanup-sessions --minutes 60 --force   # evict without prompting
//! ```

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use presence_seaorm_store::migration::{Migrator, MigratorTrait};
use presence_seaorm_store::{
    ActiveSessionStore, Broadcaster, CleanupSweeper, FanOut, LogBroadcaster, PresenceConfig,
    SweepOptions, SweepReport,
};
use sea_orm::{ConnectOptions, Database};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Remove inactive presence sessions
#[derive(Parser, Debug)]
#[command(name = "cleanup-sessions")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Idle minutes after which a session is evicted
    #[arg(long, env = "PRESENCE_CLEANUP_CUTOFF_MINUTES", default_value_t = 30)]
    minutes: u32,

    /// List the sessions that would be evicted without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    force: bool,

    /// Do not publish user.offline events
    #[arg(long)]
    no_events: bool,

    /// Rows deleted per statement
    #[arg(long, env = "PRESENCE_SWEEP_BATCH_SIZE")]
    batch_size: Option<u64>,

    /// Database connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Redis connection string for offline events
    #[cfg(feature = "redis")]
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Apply pending migrations before sweeping
    #[arg(long)]
    migrate: bool,

    /// Log level (debug, info, warn, error)
    #[arg(short = 'L', long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PresenceConfig::from_env()?.with_cleanup_cutoff_minutes(cli.minutes);
    let config = match cli.batch_size {
        Some(size) => config.with_sweep_batch_size(size),
        None => config,
    };
    config.validate()?;

    let mut options = ConnectOptions::new(cli.database_url.clone());
    options.max_connections(2).sqlx_logging(false);
    let conn = Database::connect(options).await?;

    if cli.migrate {
        Migrator::up(&conn, None).await?;
        info!("Migrations applied");
    }

    let fan_out = FanOut::new(broadcaster(&cli).await?).with_config(config.broadcast.clone());
    let sweeper = CleanupSweeper::new(ActiveSessionStore::new(conn), fan_out);

    let options = SweepOptions::from_config(&config).emit_offline(config.emit_offline_events && !cli.no_events);

    let preview = sweeper.run(&options.clone().dry_run(true)).await?;
    print_candidates(&preview);

    if cli.dry_run || preview.considered == 0 {
        return Ok(());
    }

    if !cli.force && !confirm(preview.considered)? {
        println!("Aborted; nothing deleted.");
        return Ok(());
    }

    let report = sweeper.run(&options).await?;
    print_summary(&report);

    Ok(())
}

#[cfg(feature = "redis")]
async fn broadcaster(cli: &Cli) -> Result<Arc<dyn Broadcaster>, Box<dyn std::error::Error>> {
    match &cli.redis_url {
        Some(url) => Ok(Arc::new(
            presence_seaorm_store::broadcast::RedisBroadcaster::connect(url).await?,
        )),
        None => Ok(Arc::new(LogBroadcaster)),
    }
}

#[cfg(not(feature = "redis"))]
async fn broadcaster(_cli: &Cli) -> Result<Arc<dyn Broadcaster>, Box<dyn std::error::Error>> {
    Ok(Arc::new(LogBroadcaster))
}

fn print_candidates(report: &SweepReport) {
    if report.considered == 0 {
        println!("No sessions idle for more than {} minutes.", report.cutoff_minutes);
        return;
    }

    println!(
        "{} session(s) idle for more than {} minutes:",
        report.considered, report.cutoff_minutes
    );
    println!(
        "{:<40} {:<10} {:<16} {:<14} {:>6}",
        "SESSION", "USER", "IP", "COUNTRY", "IDLE"
    );
    for session in &report.sessions {
        println!(
            "{:<40} {:<10} {:<16} {:<14} {:>5}m",
            truncate(&session.session_id, 40),
            session.user_id.map_or_else(|| "guest".to_string(), |id| id.to_string()),
            truncate(&session.ip_address, 16),
            truncate(session.country.as_deref().unwrap_or("-"), 14),
            session.idle_minutes,
        );
    }
    println!(
        "Authenticated: {}  Guests: {}",
        report.authenticated, report.guests
    );
    if !report.top_countries.is_empty() {
        let countries: Vec<String> = report
            .top_countries
            .iter()
            .map(|(country, count)| format!("{country} ({count})"))
            .collect();
        println!("Top countries: {}", countries.join(", "));
    }
}

fn print_summary(report: &SweepReport) {
    println!(
        "Deleted {} of {} candidate session(s); {} offline event(s) published.",
        report.deleted, report.considered, report.offline_events
    );
    if let Some(after) = report.after {
        println!(
            "Now active: {} ({} authenticated, {} guests); sessions today: {}",
            after.active_count, after.authenticated_count, after.guest_count, after.sessions_today
        );
    }
}

fn confirm(count: usize) -> io::Result<bool> {
    print!("Delete {count} session(s)? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let kept: String = value.chars().take(width.saturating_sub(1)).collect();
        format!("{kept}~")
    }
}

//! capacity-sync - reconcile WRMD patients into the local capacity store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use capacity_core::audit::AuditLog;
use capacity_core::ledger::CapacityLedger;
use capacity_core::report::capacity_report;
use capacity_core::{Database, Reconciler, Resolver};
use capacity_wrmd::{SyncConfig, WrmdSession};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for capacity-sync
#[derive(Parser, Debug)]
#[command(name = "capacity-sync")]
#[command(about = "Wildlife patient capacity reconciliation against WRMD")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, default_value = "capacity-sync.toml", env = "CAPACITY_SYNC_CONFIG")]
    config: PathBuf,

    /// SQLite database (overrides [database] path)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// WRMD sign-in email (overrides WRMD_EMAIL and the config file)
    #[arg(long)]
    email: Option<String>,

    /// WRMD password (overrides WRMD_PASSWORD and the config file)
    #[arg(long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile the configured admission years
    Run {
        /// Year to reconcile; repeatable. Overrides [reconcile] years
        #[arg(short, long)]
        year: Vec<u16>,
    },
    /// Create species and zeroed counters for the taxonomy
    Seed,
    /// Zero every counter and clear in-care, other and audit records
    Reset,
    /// Capacity availability per species and age stage
    Report {
        #[arg(long)]
        json: bool,
    },
    /// Last run outcome and clamp statistics
    Status,
    /// Recent audit entries, newest first
    Audit {
        #[arg(short, long, default_value = "20")]
        limit: usize,
        #[arg(short, long, default_value = "0")]
        offset: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capacity_core=info,capacity_wrmd=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = SyncConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    config.apply_env(|key| std::env::var(key).ok());
    config.apply_overrides(args.database, args.email, args.password);

    let db = Database::open(&config.database.path)
        .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
    info!(path = %config.database.path.display(), "Database opened");

    match args.command {
        Command::Run { year } => {
            let credentials = config.credentials().context("WRMD credentials")?;
            let years = if year.is_empty() {
                config.reconcile.years_or_current()
            } else {
                year
            };

            let resolver = Resolver::default();
            CapacityLedger::new(&db).seed_taxonomy(resolver.normalizer())?;

            let mut session = WrmdSession::new(&config.wrmd, config.retry.policy())
                .context("Failed to build WRMD session")?;
            let report = Reconciler::new(&db, &resolver)
                .run_and_record(&mut session, &credentials, &years)
                .context("Reconciliation failed")?;

            for y in &report.years {
                println!(
                    "{}: {} pages, +{} -{} promoted {} quarantined {} unchanged {}",
                    y.year, y.pages, y.added, y.removed, y.promoted, y.quarantined, y.unchanged
                );
                for case_id in &y.missing {
                    println!("  missing: {}", case_id);
                }
                if !y.skipped_pages.is_empty() {
                    println!("  skipped pages: {:?}", y.skipped_pages);
                }
            }
        }
        Command::Seed => {
            let resolver = Resolver::default();
            let created = CapacityLedger::new(&db).seed_taxonomy(resolver.normalizer())?;
            println!("Seeded {} species", created);
        }
        Command::Reset => {
            let summary = CapacityLedger::new(&db).reset_capacity()?;
            println!(
                "Zeroed {} counters, cleared {} in care, {} other, {} audit entries",
                summary.counters_zeroed,
                summary.in_care_cleared,
                summary.other_cleared,
                summary.audit_cleared
            );
        }
        Command::Report { json } => {
            let rows = capacity_report(&db)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in &rows {
                    let fmt_opt = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
                    println!(
                        "{:<28} {:<9} in care {:>3}  capacity {:>3}  available {:>3}{}",
                        row.species,
                        row.age_stage.as_str(),
                        row.number_in_care,
                        fmt_opt(row.capacity),
                        fmt_opt(row.available),
                        if row.shared { "  (shared)" } else { "" }
                    );
                }
            }
        }
        Command::Status => {
            match db.get_run_status()? {
                Some(status) => {
                    println!("Last run: {} at {}", status.status.as_str(), status.timestamp);
                    if let Some(error) = status.error {
                        println!("Error: {}", error);
                    }
                }
                None => println!("No run recorded"),
            }
            let stats = CapacityLedger::new(&db).stats()?;
            println!("Clamp events: {}", stats.clamp_events);
            if let Some(at) = stats.last_clamp_at {
                println!("Last clamp: {}", at);
            }
        }
        Command::Audit { limit, offset } => {
            for entry in AuditLog::new(&db).list(limit, offset)? {
                println!(
                    "{} {:<6} {:<5} {:<8} p{:<3} {} / {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.action.as_str(),
                    if entry.success { "ok" } else { "fail" },
                    entry.case_id,
                    entry.page_number,
                    entry.species,
                    entry.age_stage
                );
            }
        }
    }

    Ok(())
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "sw")]
#[command(about = "StoreWatch CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Load store_status.csv / menu_hours.csv / timezones.csv into Postgres
    Ingest {
        /// Directory holding the CSV files
        #[arg(long)]
        data_dir: PathBuf,

        /// Truncate the source tables first (same transaction)
        #[arg(long, default_value_t = false)]
        replace: bool,
    },

    /// Run one report job and print its id and output path
    Report {
        /// Layered config paths in merge order (built-in defaults if omitted)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Report as-of instant (RFC 3339). Defaults to the configured policy.
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,

        /// Read CSV files from this directory instead of Postgres
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Override report.output_dir
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Give up waiting after this many seconds (the job is abandoned)
        #[arg(long, default_value_t = 3600)]
        timeout_secs: u64,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = sw_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = sw_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_store_status_table={}",
                        s.ok, s.has_store_status_table
                    );
                }
                DbCmd::Migrate => {
                    sw_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::Ingest { data_dir, replace } => {
            commands::ingest::run_ingest(&data_dir, replace).await?;
        }

        Commands::Report {
            config_paths,
            as_of,
            data_dir,
            output_dir,
            timeout_secs,
        } => {
            commands::report::run_report(commands::report::ReportArgs {
                config_paths,
                as_of,
                data_dir,
                output_dir,
                timeout: std::time::Duration::from_secs(timeout_secs),
            })
            .await?;
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = sw_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable `key=value` lines.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

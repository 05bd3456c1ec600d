//! # sproutctl
//!
//! Command-line access to the tray service against PostgreSQL. Every command prints
//! its result as JSON on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sprout_core::auth::{Actor, Role, RoleBasedPolicy};
use sprout_core::config::ConfigManager;
use sprout_core::database::{DatabaseConnection, DatabaseMigrations};
use sprout_core::logging::{init_structured_logging_with, log_error};
use sprout_core::query_builder::{SortDirection, SortField};
use sprout_core::models::QualityGrade;
use sprout_core::services::{CreateBatchRequest, ListRequest, TrayService, TrayUpdate, ViewMode};
use sprout_core::state_machine::{Stage, TrayStatus};
use sprout_core::store::PgTrayStore;
use std::process;
use std::sync::Arc;
use tracing::warn;

#[derive(Parser)]
#[command(name = "sproutctl")]
#[command(about = "Manage microgreen trays and batches")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Acting user id
    #[arg(long, default_value_t = 0)]
    actor_id: i64,

    /// Acting user name
    #[arg(long, default_value = "sproutctl")]
    actor_name: String,

    /// Acting role (viewer, grower, manager)
    #[arg(long, default_value = "viewer")]
    role: Role,

    /// Configuration directory (default: config)
    #[arg(short, long)]
    config_dir: Option<std::path::PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plant a new batch, one tray per label
    CreateBatch {
        /// Comma-separated tray labels, e.g. A1,A2,A3
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<String>,
        #[arg(long)]
        location: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Advance one tray to its next stage
    AdvanceOne { tray_id: i64 },

    /// Advance several trays by id
    AdvanceMany {
        #[arg(value_delimiter = ',', required = true)]
        tray_ids: Vec<i64>,
    },

    /// Advance every active tray in the given batches
    AdvanceBatches {
        #[arg(value_delimiter = ',', required = true)]
        batch_codes: Vec<String>,
    },

    /// Soft-delete several trays by id
    DeleteMany {
        #[arg(value_delimiter = ',', required = true)]
        tray_ids: Vec<i64>,
    },

    /// Soft-delete every tray in the given batches
    DeleteBatches {
        #[arg(value_delimiter = ',', required = true)]
        batch_codes: Vec<String>,
    },

    /// List batches or trays
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<TrayStatus>,
        #[arg(long)]
        stage: Option<Stage>,
        #[arg(long)]
        sort_by: Option<SortField>,
        #[arg(long)]
        sort_direction: Option<SortDirection>,
        #[arg(long, default_value = "batches")]
        view: ViewMode,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Show the code the next batch would receive
    NextBatchCode,

    /// Show one tray with its stage info and batch siblings
    TrayDetail { tray_id: i64 },

    /// Mark a tray failed
    FailTray {
        tray_id: i64,
        #[arg(long)]
        reason: String,
    },

    /// Cancel a tray
    CancelTray { tray_id: i64 },

    /// Edit a tray's location, notes or harvest data
    UpdateTray {
        tray_id: i64,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        failure_reason: Option<String>,
        #[arg(long)]
        weight_grams: Option<f64>,
        #[arg(long)]
        yield_percentage: Option<f64>,
        /// A, B, C, D or F
        #[arg(long)]
        grade: Option<QualityGrade>,
    },

    /// Soft-delete one tray
    DeleteOne { tray_id: i64 },

    /// Show counts of active trays by stage
    Statistics,

    /// Apply pending schema migrations
    Migrate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        log_error("sproutctl", "run", &format!("{err:#}"), None);
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let manager =
        ConfigManager::load_or_environment(cli.config_dir.clone()).context("loading configuration")?;
    let config = manager.config().clone();
    init_structured_logging_with(&config.logging);
    if !manager.is_file_backed() {
        warn!(
            config_directory = %manager.config_directory().display(),
            "No configuration files found; using defaults and environment overrides"
        );
    }

    let connection = DatabaseConnection::new(&config.database)
        .await
        .context("connecting to the database")?;

    if matches!(cli.command, Commands::Migrate) {
        DatabaseMigrations::run_all(connection.pool()).await?;
        return print_json(
            &serde_json::json!({ "applied": DatabaseMigrations::embedded_versions() }),
            cli.pretty,
        );
    }

    let store = Arc::new(PgTrayStore::new(connection.pool().clone()));
    let service = TrayService::new(store, Arc::new(RoleBasedPolicy), config);
    let actor = Actor::new(cli.actor_id, cli.actor_name.clone(), cli.role);
    let pretty = cli.pretty;

    match cli.command {
        Commands::CreateBatch {
            labels,
            location,
            notes,
        } => {
            let request = CreateBatchRequest {
                tray_labels: labels,
                location_prefix: location,
                notes,
            };
            print_json(&service.create_batch(&actor, &request).await?, pretty)
        }
        Commands::AdvanceOne { tray_id } => {
            print_json(&service.advance_one(&actor, tray_id).await?, pretty)
        }
        Commands::AdvanceMany { tray_ids } => {
            print_json(&service.advance_many(&actor, &tray_ids).await?, pretty)
        }
        Commands::AdvanceBatches { batch_codes } => {
            print_json(&service.advance_batches(&actor, &batch_codes).await?, pretty)
        }
        Commands::DeleteMany { tray_ids } => {
            print_json(&service.delete_many(&actor, &tray_ids).await?, pretty)
        }
        Commands::DeleteBatches { batch_codes } => {
            print_json(&service.delete_batches(&actor, &batch_codes).await?, pretty)
        }
        Commands::List {
            search,
            status,
            stage,
            sort_by,
            sort_direction,
            view,
            page,
            per_page,
        } => {
            let request = ListRequest {
                search,
                status,
                stage,
                sort_by,
                sort_direction,
                view_mode: view,
                page,
                per_page,
            };
            print_json(&service.list(&actor, &request).await?, pretty)
        }
        Commands::NextBatchCode => {
            let code = service.next_batch_code(&actor).await?;
            print_json(&serde_json::json!({ "batchCode": code }), pretty)
        }
        Commands::TrayDetail { tray_id } => {
            print_json(&service.tray_detail(&actor, tray_id).await?, pretty)
        }
        Commands::FailTray { tray_id, reason } => {
            print_json(&service.fail_tray(&actor, tray_id, &reason).await?, pretty)
        }
        Commands::CancelTray { tray_id } => {
            print_json(&service.cancel_tray(&actor, tray_id).await?, pretty)
        }
        Commands::UpdateTray {
            tray_id,
            location,
            notes,
            failure_reason,
            weight_grams,
            yield_percentage,
            grade,
        } => {
            let update = TrayUpdate {
                location,
                notes,
                failure_reason,
                harvested_weight_grams: weight_grams,
                yield_percentage,
                quality_grade: grade,
            };
            print_json(&service.update_tray(&actor, tray_id, &update).await?, pretty)
        }
        Commands::DeleteOne { tray_id } => {
            print_json(&service.delete_one(&actor, tray_id).await?, pretty)
        }
        Commands::Statistics => print_json(&service.statistics(&actor).await?, pretty),
        Commands::Migrate => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use env_logger::Env;
use featuregate::app_config;
use featuregate::db::{create_schema, get_db_pool, init_db};
use featuregate::features::operator::features_by_type;
use featuregate::jobs::{BatchDisabler, BatchEnablerByCount, BatchEnablerByPercentage, BatchJob};
use featuregate::notify::LogPublisher;
use featuregate::Store;
use sea_orm::DatabaseConnection;

/// Feature gating worker: schema setup, batch rollouts and rollbacks
#[derive(Parser, Debug)]
#[command(name = "featuregate")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create tables and indexes if they do not exist
    InitSchema,

    /// Enable a feature type for a number of eligible TLOs
    EnableCount {
        #[arg(long)]
        feature_type_id: i32,
        /// Whole number of TLOs
        #[arg(long)]
        count: String,
    },

    /// Enable a feature type for a percentage of eligible TLOs
    EnablePercentage {
        #[arg(long)]
        feature_type_id: i32,
        /// Whole number from 0 to 100
        #[arg(long)]
        percentage: String,
    },

    /// Disable a feature type for the TLOs matching a criteria
    Disable {
        #[arg(long)]
        feature_type_id: i32,
        /// on, pre_enabled, on_or_pre_enabled or prelive_or_live
        #[arg(long)]
        criteria: String,
    },

    /// Print a TLO's features by type as JSON
    Show {
        #[arg(long)]
        tlo_id: i32,
    },
}

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();
    init_our_mods();

    let cli = Cli::parse();
    init_db(&app_config::database())
        .await
        .context("Failed to connect to database")?;

    run(cli.command, get_db_pool()).await
}

/// Initialize third party crates we rely on but don't have control over.
fn init_lib_mods() {
    // A missing .env is fine; the environment may already be set.
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Initialize all local mods.
fn init_our_mods() {
    app_config::init();
}

async fn run(command: Command, db: &DatabaseConnection) -> anyhow::Result<()> {
    let publisher = LogPublisher;

    match command {
        Command::InitSchema => {
            create_schema(db).await?;
        }
        Command::EnableCount {
            feature_type_id,
            count,
        } => {
            let mut job = BatchEnablerByCount::new(db, feature_type_id, &count).await?;
            let saved = job.save(db, &publisher).await?;
            report(saved, &job)?;
        }
        Command::EnablePercentage {
            feature_type_id,
            percentage,
        } => {
            let mut job = BatchEnablerByPercentage::new(db, feature_type_id, &percentage).await?;
            let saved = job.save(db, &publisher).await?;
            report(saved, &job)?;
        }
        Command::Disable {
            feature_type_id,
            criteria,
        } => {
            let mut job = BatchDisabler::new(db, feature_type_id, &criteria).await?;
            let saved = job.save(db, &publisher).await?;
            report(saved, &job)?;
        }
        Command::Show { tlo_id } => {
            let store = Store::new(db.clone());
            let tlo = store.find_tlo(tlo_id).await?;
            let unsafe_names = app_config::features().unsafe_names;
            let entries = features_by_type(db, &tlo, &unsafe_names).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}

fn report<J: BatchJob>(saved: bool, job: &J) -> anyhow::Result<()> {
    if saved {
        return Ok(());
    }
    for (field, errors) in job.errors().field_errors() {
        for error in errors {
            match &error.message {
                Some(message) => eprintln!("{}: {}", field, message),
                None => eprintln!("{}: {}", field, error.code),
            }
        }
    }
    bail!(
        "{} job for '{}' was rejected",
        job.queue(),
        job.feature_type().name
    )
}

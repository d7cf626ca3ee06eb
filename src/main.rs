//! couchtato command-line entry point.
//!
//! Usage:
//!   couchtato iterate --url <db-url> [options]
//!   couchtato tasks

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use couchtato::config::{Command, IterateArgs, Settings};
use couchtato::database::Database;
use couchtato::logging;
use couchtato::runner::Runner;
use couchtato::store::CouchStore;
use couchtato::task::builtin;
use couchtato::util::Util;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let settings = Settings::parse();

    match settings.command {
        Command::Iterate(args) => iterate(args).await,
        Command::Tasks => {
            for (name, description) in builtin::CATALOG {
                println!("{name:<16} {description}");
            }
            Ok(())
        }
    }
}

async fn iterate(args: IterateArgs) -> anyhow::Result<()> {
    logging::init(&args.log_config()).context("failed to initialise logging")?;

    let config = args.run_config()?;
    let store = CouchStore::new(&args.url, args.timeout())?;
    tracing::info!(database = store.database_name(), "Connected");

    let database = Arc::new(Database::from_store(store));
    let mut tasks = builtin::select(&args.tasks)?;
    let mut util = Util::new().with_driver(Arc::clone(&database));
    let runner = Runner::new(database, config);

    let outcome = runner.run(&mut tasks, &mut util).await;

    // Stats are reported even after a failure; they cover the work done so far.
    for (key, value) in util.stat() {
        println!("{key}: {value}");
    }
    if let Some(path) = &args.audit_file {
        write_audit(path, util.audit_items())?;
    }

    let summary = outcome?;
    println!(
        "Processed {} documents in {} pages ({} written, {} failed) in {:.1}s",
        summary.documents,
        summary.pages,
        summary.written,
        summary.failed,
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}

fn write_audit(path: &Path, records: &[serde_json::Value]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write audit file {}", path.display()))?;
    tracing::info!(path = %path.display(), records = records.len(), "Audit written");
    Ok(())
}

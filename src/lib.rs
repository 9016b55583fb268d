//! Agency operating system: ingests SaaS work artifacts, reconciles them
//! into a local relational store, evaluates data-quality gates, scores
//! risk/health, and publishes a periodic JSON snapshot for a UI to consume.
//!
//! The binary entrypoint (`src/main.rs`) is a thin `clap` CLI over the
//! surface exposed here: `Config::from_env`, `db::Store::open`,
//! `orchestrator::Orchestrator`, and `http::serve`.

pub mod collectors;
pub mod config;
pub mod db;
pub mod error;
pub mod gates;
pub mod http;
pub mod moves;
pub mod normalizer;
pub mod orchestrator;
pub mod resolution;
pub mod scoring;
pub mod snapshot;
pub mod types;

use std::sync::Arc;
use tokio::sync::Mutex;

use config::Config;
use db::Store;
use error::AppError;
use orchestrator::Orchestrator;

/// Opens the store at `config.db_path` and constructs the orchestrator.
/// Shared by every CLI subcommand so `migrate`/`cycle`/`serve` all see the
/// same schema-migration and wiring path.
pub fn bootstrap(config: Arc<Config>) -> Result<Orchestrator, AppError> {
    let store = Store::open(&config.db_path).map_err(AppError::Store)?;
    Ok(Orchestrator::new(Arc::new(Mutex::new(store)), config))
}

/// Runs the HTTP server and the cycle loop concurrently until either exits
/// (normally only on signal/error). Used by `agencyos serve`.
pub async fn serve(config: Arc<Config>) -> Result<(), AppError> {
    let orchestrator = bootstrap(config.clone())?;

    let http_config = config.clone();
    let http = async {
        http::serve(http_config, &orchestrator)
            .await
            .map_err(AppError::from)
    };
    let loop_fut = async {
        orchestrator.run_forever().await;
        Ok(())
    };

    tokio::select! {
        res = http => res,
        res = loop_fut => res,
    }
}

/// Runs exactly one orchestrator cycle and returns whether it succeeded.
/// Used by `agencyos cycle` (cron-driven deployments, integration tests).
pub async fn run_one_cycle(config: Arc<Config>) -> Result<bool, AppError> {
    let orchestrator = bootstrap(config)?;
    let outcome = orchestrator.run_cycle().await;
    Ok(outcome.success)
}

//! CLI entrypoint. Three subcommands share one bootstrap path:
//! `serve` runs the HTTP API and the cycle loop until signaled, `migrate`
//! applies pending schema migrations and exits, `cycle` runs exactly one
//! orchestrator cycle and exits with the cycle's success as its status code.

use agencyos::config::Config;
use agencyos::db::Store;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agencyos", about = "Single-operator agency operating system")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API and the periodic collect/normalize/gate/moves loop.
    Serve {
        #[arg(long, env = "AGENCYOS_PORT")]
        port: Option<u16>,
        #[arg(long, env = "AGENCYOS_DATA_DIR")]
        data_dir: Option<String>,
    },
    /// Apply pending schema migrations and exit.
    Migrate,
    /// Run exactly one orchestrator cycle and exit.
    Cycle,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();
}

fn load_config(port: Option<u16>, data_dir: Option<String>) -> Result<Config, String> {
    if let Some(dir) = data_dir {
        std::env::set_var("AGENCYOS_DATA_DIR", dir);
    }
    if let Some(port) = port {
        std::env::set_var("AGENCYOS_PORT", port.to_string());
    }
    Config::from_env()
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve { port, data_dir } => run_serve(port, data_dir).await,
        Command::Migrate => run_migrate(),
        Command::Cycle => run_cycle().await,
    };

    match result {
        Ok(code) => code,
        Err(message) => {
            tracing::error!(error = %message, "agencyos exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run_serve(port: Option<u16>, data_dir: Option<String>) -> Result<ExitCode, String> {
    let config = Arc::new(load_config(port, data_dir)?);
    agencyos::serve(config).await.map_err(|e| e.to_string())?;
    Ok(ExitCode::SUCCESS)
}

fn run_migrate() -> Result<ExitCode, String> {
    let config = Config::from_env()?;
    Store::open(&config.db_path).map_err(|e| e.to_string())?;
    tracing::info!(db_path = %config.db_path.display(), "schema up to date");
    Ok(ExitCode::SUCCESS)
}

async fn run_cycle() -> Result<ExitCode, String> {
    let config = Arc::new(Config::from_env()?);
    let success = agencyos::run_one_cycle(config).await.map_err(|e| e.to_string())?;
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

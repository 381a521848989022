mod api;
mod config;
mod error;
mod source;
mod types;
mod wheel;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::source::{check_roster, GoogleSheetSource};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    // `--check`: read the sheet once, log the roster and exit.
    if std::env::args().skip(1).any(|arg| arg == "--check") {
        if let Err(e) = check(cfg).await {
            error!("Roster check failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn check(cfg: Config) -> Result<()> {
    let source = GoogleSheetSource::new(cfg.sheet)?;
    check_roster(&source).await?;
    Ok(())
}

async fn run(cfg: Config) -> Result<()> {
    let sheet = &cfg.sheet;
    match &sheet.spreadsheet_id {
        Some(id) => info!("Roster source: spreadsheet {id}, worksheet '{}'", sheet.worksheet_name),
        None => info!(
            "Roster source: spreadsheet '{}', worksheet '{}'",
            sheet.spreadsheet_name, sheet.worksheet_name
        ),
    }
    info!("Service account key: {}", sheet.credentials_file);

    // Nothing is fetched at startup; every request reads the sheet afresh.
    let source = GoogleSheetSource::new(cfg.sheet.clone())?;
    let app = router(ApiState::new(source, &cfg.static_dir));

    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr} (static files from {})", cfg.static_dir);

    axum::serve(listener, app).await?;

    Ok(())
}

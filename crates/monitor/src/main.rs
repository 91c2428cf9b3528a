//! Driver Drowsiness Monitor - Main Entry Point

use anyhow::Context;
use clap::Parser;
use monitor::cli::{Cli, Command};
use monitor::presenter::ConsolePresenter;
use monitor::{history, init_logging, LiveSession, MonitorConfig, SessionComponents};
use storage::Database;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = MonitorConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&config.logging);

    info!("=== Driver Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let db = Database::open(&config.storage.database_path)
        .await
        .with_context(|| format!("opening {}", config.storage.database_path.display()))?;

    match cli.command_or_live() {
        Command::Live => run_live(&config, db.clone()).await?,
        Command::History { id, json } => {
            print!("{}", history::show(&db, id, json).await?);
            if json {
                println!();
            }
        }
        Command::Clear { yes } => {
            let confirmed =
                yes || history::confirm_clear(std::io::stdin().lock(), std::io::stdout())?;
            if history::clear(&db, confirmed).await.context("clearing history")? {
                println!("History cleared.");
            } else {
                println!("Nothing deleted.");
            }
        }
    }

    db.close().await;
    Ok(())
}

async fn run_live(config: &MonitorConfig, db: Database) -> anyhow::Result<()> {
    let components = SessionComponents::from_config(config, db).context("initializing perception")?;

    let (event_tx, event_rx) = mpsc::channel(64);
    let presenter = tokio::spawn(ConsolePresenter::new().run(event_rx));

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping session");
                stop_tx.send(true).ok();
            }
            Err(e) => {
                warn!("Cannot listen for Ctrl-C: {}", e);
                // Keep the sender alive so the session only ends with the camera
                std::future::pending::<()>().await;
            }
        }
    });

    let mut session = LiveSession::new(components, event_tx).with_mirror(config.camera.mirror);
    let report = session.run(stop_rx).await.context("running session")?;
    drop(session);

    presenter.await.ok();
    info!(
        "Session {} finished: {:.2} km, {} microsleep, {} drowsy, {} yawn",
        report.session_id,
        report.distance_km,
        report.counters.microsleep,
        report.counters.drowsy,
        report.counters.yawn
    );
    Ok(())
}

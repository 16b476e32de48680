use anyhow::Result;
use respawn::catalog::{load_catalog, EntityCatalog};
use respawn::clock::SystemClock;
use respawn::config;
use respawn::console::{action_line, reservation_line, run_command, Command, Outcome, HELP};
use respawn::reservation::ReservationStatus;
use respawn::tracker::InstanceTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "respawn=info".into()),
        )
        .init();

    info!("Respawn tracker starting...");

    let config = config::load_from_env()?;

    let catalog = match &config.catalog.path {
        Some(path) => load_catalog(path)?,
        None => EntityCatalog::builtin(),
    };
    info!(entities = catalog.len(), "Catalog loaded");

    let mut tracker = InstanceTracker::open(&config, catalog, Arc::new(SystemClock))?;
    let log_limit = config.display.log_limit;

    println!("{}", HELP);
    print_command(&mut tracker, Command::Board, log_limit);

    let mut tick = interval(Duration::from_millis(config.display.tick_interval_ms.max(1)));
    let mut sync = interval(Duration::from_secs(config.display.log_refresh_seconds.max(1)));
    // First ticks fire immediately; the tracker was just opened
    tick.tick().await;
    sync.tick().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match tracker.refresh() {
                    Ok(spawned) => {
                        for entity_id in spawned {
                            if let Some(entity) = tracker.catalog().get(&entity_id) {
                                info!(entity_id = %entity.id, name = %entity.name, "Spawned");
                            }
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to refresh state"),
                }
                match tracker.reservation_status() {
                    Ok(status @ ReservationStatus::Expired) => {
                        println!("{}", reservation_line(&status));
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Failed to update reservation"),
                }
            }
            _ = sync.tick() => {
                if let Err(e) = tracker.reload() {
                    error!(error = %e, "Failed to reload instance document");
                }
                match tracker.unseen_actions(log_limit) {
                    Ok(records) => {
                        let zone = *tracker.catalog().zone();
                        for record in &records {
                            println!("{}", action_line(record, &zone));
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to read action log"),
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match line.parse::<Command>() {
                            Ok(command) => {
                                if !print_command(&mut tracker, command, log_limit) {
                                    break;
                                }
                            }
                            Err(e) => println!("{}", e),
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!(instance = %tracker.instance_id(), "Respawn tracker stopped");
    Ok(())
}

/// Run a command and print its output. Returns false on quit.
fn print_command(tracker: &mut InstanceTracker, command: Command, log_limit: usize) -> bool {
    match run_command(tracker, command, log_limit) {
        Ok(Outcome::Continue(text)) => {
            println!("{}", text.trim_end());
            true
        }
        Ok(Outcome::Quit) => false,
        Err(e) => {
            warn!(error = %e, "Command failed");
            println!("error: {:#}", e);
            true
        }
    }
}

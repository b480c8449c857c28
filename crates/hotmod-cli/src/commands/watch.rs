//! `hotmod watch` command implementation
//!
//! Hot-imports a module and calls it on an interval, so edits to the file
//! show up in the output without restarting.

use super::{build_importer, evaluate, parse_args};
use crate::error::CliError;
use colored::Colorize;
use hotmod_engine::ReloadEvent;
use hotmod_kernel::HotImportConfig;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Execute the `hotmod watch` command
pub async fn run(
    config: HotImportConfig,
    file: &Path,
    interval_ms: u64,
    times: Option<u64>,
    args: &[String],
) -> Result<(), CliError> {
    let importer = build_importer(config.with_watch(true));
    let mut events = importer.subscribe();
    let handle = importer.hot_import(file).await?;
    let args = parse_args(args);

    eprintln!(
        "{} {} ({})",
        "Watching".green().bold(),
        handle.path().display(),
        handle.kind()
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    let mut calls = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => report(event),
            _ = ticker.tick() => {
                match evaluate(&handle, args.clone()) {
                    Ok(value) => println!("{}", value),
                    Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
                }
                calls += 1;
                if times.is_some_and(|limit| calls >= limit) {
                    break;
                }
            }
        }
    }

    importer.shutdown();
    Ok(())
}

fn report(event: Result<ReloadEvent, broadcast::error::RecvError>) {
    match event {
        Ok(ReloadEvent::Committed {
            path,
            version,
            duration,
        }) => eprintln!(
            "{} {} (version {}, {:?})",
            "Reloaded".green().bold(),
            path.display(),
            version,
            duration
        ),
        Ok(ReloadEvent::RolledBack { path, error, .. }) => eprintln!(
            "{} {}: {}",
            "Reload failed, keeping previous version of".yellow().bold(),
            path.display(),
            error
        ),
        Ok(_) => {}
        Err(broadcast::error::RecvError::Lagged(n)) => {
            tracing::debug!("Missed {} reload events", n)
        }
        Err(broadcast::error::RecvError::Closed) => {}
    }
}

//! Headless auto-splitter host.
//!
//! Loads the config, runs one component with the built-in manifest parser
//! until Ctrl-C, then disposes it and saves the component settings.
//!
//! Usage: `autosplit-host [config.toml] [script]`. The script argument
//! overrides the path stored in the config. Logs go to stderr; set
//! `RUST_LOG` to change the filter.

use anyhow::Context;
use autosplit::script::ManifestParser;
use autosplit::{AutosplitConfig, ComponentFactory};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("autosplit=info")),
        )
        .init();

    let mut args = std::env::args_os().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(AutosplitConfig::default_config_path);
    let script_path = args.next().map(PathBuf::from);

    let mut config = AutosplitConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;

    let factory = ComponentFactory;
    tracing::info!(
        name = ComponentFactory::NAME,
        version = factory.version(),
        category = %ComponentFactory::CATEGORY,
        config = %config_path.display(),
        "autosplit-host starting"
    );

    let component = match &script_path {
        Some(path) => factory.create_with_script((), ManifestParser, &config, path)?,
        None => factory.create((), ManifestParser, &config)?,
    };
    let mut changes = component.subscribe();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                tracing::info!("interrupt received; shutting down");
                break;
            }
            change = changes.recv() => match change {
                Ok(change) => {
                    tracing::info!(
                        path = ?change.path,
                        state = %change.state,
                        refresh_rate = ?change.refresh_rate,
                        interval_ms = component.interval().as_millis() as u64,
                        "script changed"
                    );
                    if let Some(variables) = component.variables().await {
                        tracing::debug!(?variables, "script variables");
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "missed script-changed notifications"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    let stats = component.tick_stats();
    config.component = component.settings().snapshot();
    tokio::task::spawn_blocking(move || component.dispose())
        .await
        .context("component disposal panicked")?;

    config
        .save_to_file(&config_path)
        .with_context(|| format!("failed to save config {}", config_path.display()))?;

    tracing::info!(
        dispatched = stats.dispatched,
        dropped = stats.dropped,
        "autosplit-host shut down cleanly"
    );
    Ok(())
}

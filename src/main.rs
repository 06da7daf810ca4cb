use bpmnsync::{SyncConfig, run_gui, statics};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn load_config() -> anyhow::Result<SyncConfig> {
    match std::env::var_os(statics::ENV_CONFIG_PATH) {
        Some(path) => SyncConfig::load_path(&PathBuf::from(path)),
        None => Ok(SyncConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bpmnsync=info")),
        )
        .init();

    let config = load_config()?;
    tracing::info!(
        debounce_ms = config.debounce_ms,
        tracked = config.tracked_kinds.len(),
        "starting"
    );

    run_gui(config).map_err(|e| anyhow::anyhow!("GUI error: {e}"))
}

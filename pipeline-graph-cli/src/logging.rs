// Logging setup
// Installs a stderr tracing subscriber filtered by RUST_LOG, --log-level or config

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use tracing_subscriber::filter::EnvFilter;

use pipeline_graph::GraphConfig;

const DEFAULT_LEVEL: &str = "warn";

/// Filter precedence: RUST_LOG, then `--log-level`, then the config file
pub fn init(cli_level: Option<&str>, config: &GraphConfig) -> Result<()> {
    let fallback = cli_level
        .or(config.log_level.as_deref())
        .unwrap_or(DEFAULT_LEVEL);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .wrap_err("failed to configure log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| eyre!("failed to install logger: {}", e))
}

mod logging;

pub use logging::init_logging;

use dnsmux_domain::{CliOverrides, Config};
use tracing::info;

pub fn load_config(path: Option<&str>, overrides: CliOverrides) -> anyhow::Result<Config> {
    let config = Config::load(path, overrides)?;
    config.validate()?;
    info!(
        listeners = ?config.server.listeners,
        handlers = config.handlers.len(),
        "Configuration loaded"
    );
    Ok(config)
}

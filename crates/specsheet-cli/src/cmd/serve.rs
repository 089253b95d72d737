use anyhow::Context;
use specsheet_core::config::{Config, WarnLevel};
use specsheet_server::state::AppState;
use std::path::Path;
use tracing::{error, info, warn};

pub fn run(
    config_path: Option<&Path>,
    port: Option<u16>,
    bind: Option<String>,
    open: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load_with_env(config_path).context("failed to load config")?;
    if let Some(p) = port {
        config.server.port = p;
    }
    if let Some(b) = bind {
        config.server.bind = b;
    }

    for w in config.validate() {
        match w.level {
            WarnLevel::Error => error!("{}", w.message),
            WarnLevel::Warning => warn!("{}", w.message),
        }
    }

    let bind = config.server.bind.clone();
    let port = config.server.port;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let state = AppState::from_config(config)?;
        let listener = tokio::net::TcpListener::bind((bind.as_str(), port))
            .await
            .with_context(|| format!("cannot bind {bind}:{port}"))?;
        info!(address = %listener.local_addr()?, "bound");
        specsheet_server::serve_on(state, listener, open).await
    })
}

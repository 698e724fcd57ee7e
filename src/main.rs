//! Swarm renderer viewer
//!
//! Usage: `swarm [config.toml]`. Without an argument the built-in defaults
//! are used.

use anyhow::Context;
use swarm_renderer::RendererConfig;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => RendererConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.to_string_lossy()))?,
        None => RendererConfig::default(),
    };

    swarm_renderer::app::run(config).map_err(|e| {
        log::error!("[main] {:#}", e);
        e
    })
}

//! `ovo` server process entry point: CLI parsing, logging, config load,
//! and the bootstrap/serve/shutdown lifecycle.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use ovo_server::config::ServerConf;
use ovo_server::network::{NetworkConfig, NetworkModule};
use ovo_server::storage::cleaner::DEFAULT_PERIOD;
use ovo_server::ServerState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Distributed in-memory key-value store with TTL expiration and
/// peer-to-peer hash-range replication.
#[derive(Parser, Debug)]
#[command(name = "ovo-server", version, about)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, env = "OVO_CONFIG", default_value = "ovo.json")]
    config: String,

    /// Enables verbose (debug-level) logging, overriding `RUST_LOG`.
    #[arg(long, env = "OVO_DEBUG")]
    debug: bool,

    /// Address the Prometheus metrics exporter listens on.
    #[arg(long, env = "OVO_METRICS_ADDR", default_value = "0.0.0.0:9898")]
    metrics_addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = install_metrics_exporter(&cli.metrics_addr) {
        error!(error = %err, "failed to install prometheus exporter, continuing without metrics");
    }

    let conf = ServerConf::load(&cli.config)?;
    let debug = conf.debug || cli.debug;
    if debug {
        info!("debug mode enabled");
    }

    let host = if conf.http_bind_all { "0.0.0.0".to_string() } else { conf.server_node.node.api_host.clone() };
    let network_config = NetworkConfig { host, port: conf.server_node.node.port, ..NetworkConfig::default() };

    let state = ServerState::bootstrap(conf, &cli.config, DEFAULT_PERIOD).await;

    let mut module = NetworkModule::new(network_config.clone());
    let port = module.start().await?;
    info!(port, "ovo server listening");

    let shutdown_ctl = module.shutdown_controller();
    let app_state = state.app_state(network_config, Arc::clone(&shutdown_ctl));

    let shutdown_signal = {
        let shutdown_ctl = Arc::clone(&shutdown_ctl);
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, draining in-flight requests");
            shutdown_ctl.trigger_shutdown();
        }
    };

    module.serve(app_state, shutdown_signal).await?;
    state.shutdown().await;
    Ok(())
}

/// `tracing-subscriber` with an env-filter, defaulting to `info` unless
/// `--debug`/`OVO_DEBUG` or `RUST_LOG` says otherwise.
fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Installs the Prometheus recorder and its built-in HTTP listener, serving
/// `ovo_commands_applied_total`, `ovo_outbound_queue_depth`, and
/// `ovo_peer_failures_total` at `/metrics`.
fn install_metrics_exporter(addr: &str) -> anyhow::Result<()> {
    let socket_addr: std::net::SocketAddr = addr.parse()?;
    PrometheusBuilder::new().with_http_listener(socket_addr).install()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["ovo-server"]);
        assert_eq!(cli.config, "ovo.json");
        assert!(!cli.debug);
        assert_eq!(cli.metrics_addr, "0.0.0.0:9898");
    }

    #[test]
    fn cli_parses_overrides() {
        let cli = Cli::parse_from(["ovo-server", "--config", "/etc/ovo.json", "--debug"]);
        assert_eq!(cli.config, "/etc/ovo.json");
        assert!(cli.debug);
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}

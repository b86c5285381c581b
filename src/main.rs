//! Mirror reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ axum catch-all ──▶ RequestDirector ──▶ upstream (reqwest, no redirects)
//!                                                         │
//!   Client ◀── gateway error ◀── ResponseTransform ◀──────┘
//!                 (502/504)        ├─ 3xx + Location → RedirectResolver → BodyRewriter → 200
//!                                  ├─ non-HTML       → pass through
//!                                  └─ HTML           → BodyRewriter
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use mirror_proxy::http::{HttpServer, Proxy};
use mirror_proxy::lifecycle::{signals, startup, Shutdown};
use mirror_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "mirror-proxy")]
#[command(about = "Reverse proxy that serves an upstream site under a mirror domain", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults are used when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address (e.g. 0.0.0.0:3430).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match startup::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mirror-proxy: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: mirror_proxy::ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        rules = config.rewrite.rules.len(),
        "mirror-proxy starting"
    );

    let proxy = Proxy::from_config(&config)?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = startup::bind_listener(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    let server = HttpServer::new(config, proxy);
    server.run(listener, server_shutdown).await?;
    Ok(())
}

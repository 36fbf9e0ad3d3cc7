// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use cert_manager_webhook_transip::{
    cli::Args,
    constants::{DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    server::{self, load_tls_config, WebhookState},
    solver::{Solver, TransipSolver},
    zone::{recursive_nameservers, SoaZoneResolver},
};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("transip-webhook")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

fn init_logging() {
    // Respects RUST_LOG if set, otherwise defaults to INFO level.
    // RUST_LOG_FORMAT=json switches to JSON lines.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    let log_format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(args: Args) -> Result<()> {
    init_logging();

    info!(group = %args.group_name, "Starting cert-manager TransIP webhook");
    debug!("Logging initialized with file and line number tracking");

    let nameservers = recursive_nameservers(&args.dns01_recursive_nameservers)
        .context("Invalid --dns01-recursive-nameservers")?;
    let zone_resolver = Arc::new(SoaZoneResolver::new(nameservers));
    debug!(
        nameservers = ?zone_resolver.nameservers(),
        "Using recursive nameservers for zone discovery"
    );

    let solvers: Vec<Arc<dyn Solver>> = vec![Arc::new(TransipSolver::new(
        &args.transip_api_url,
        zone_resolver,
    )?)];

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    debug!("Initializing Kubernetes client configuration");
    let kube_config = kube::Config::infer()
        .await
        .context("Failed to load Kubernetes client configuration")?;

    futures::future::try_join_all(solvers.iter().map(|solver| {
        let kube_config = kube_config.clone();
        let shutdown = shutdown_rx.clone();
        async move {
            solver
                .initialize(kube_config, shutdown)
                .await
                .with_context(|| format!("Failed to initialize solver '{}'", solver.name()))
        }
    }))
    .await?;

    let tls = match args.tls_files() {
        Some((cert, key)) => Some(load_tls_config(cert, key)?),
        None => None,
    };

    let state = WebhookState::new(&args.group_name, solvers);
    server::run(args.listen_addr(), state, tls, shutdown_rx).await
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

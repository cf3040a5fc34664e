//! InvoicePay HTTP server

use std::net::IpAddr;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use invoicepay::{AppConfig, AppServices};

/// InvoicePay HTTP server
#[derive(Parser, Debug)]
#[command(name = "invoicepay")]
#[command(author = "InvoicePay Team <team@invoicepay.app>")]
#[command(version)]
#[command(about = "Invoicing backend with Stripe checkout links and webhook reconciliation")]
struct Args {
    /// Port to listen on (overrides INVOICEPAY_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides INVOICEPAY_HOST)
    #[arg(short = 'H', long)]
    host: Option<IpAddr>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let app = AppServices::from_config(&config)?.router();

    let listener = tokio::net::TcpListener::bind((config.host, config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;

    tracing::info!(
        "{} v{} listening on {}",
        invoicepay::NAME,
        invoicepay::VERSION,
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

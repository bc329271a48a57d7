//! Dash cam finder
//!
//! CLI and REST API for extracting, normalizing and comparing dash cam
//! specifications.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dashcam_finder::catalog::{load_catalog, normalized_products};
use dashcam_finder::cli::{self, Cli, Commands};
use dashcam_finder::config::AppConfig;
use dashcam_finder::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashcam_finder=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            catalog,
        } => run_server(host, port, catalog).await,
        Commands::Process { input, output } => cli::run_process(input, output).await,
        Commands::Merge {
            current,
            incoming,
            output,
        } => cli::run_merge(current, incoming, output).await,
        Commands::Filter {
            catalog,
            marketplace,
            brand,
            search,
            min_price,
            max_price,
            min_rating,
            specs,
            sort,
            format,
        } => {
            cli::run_filter(
                catalog,
                marketplace,
                brand,
                search,
                min_price,
                max_price,
                min_rating,
                specs,
                sort,
                format,
            )
            .await
        }
    }
}

/// Run the API server.
async fn run_server(
    host: Option<String>,
    port: Option<u16>,
    catalog: Option<PathBuf>,
) -> anyhow::Result<()> {
    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }
    let catalog = catalog.unwrap_or_else(|| PathBuf::from(&config.data.products_file));

    tracing::info!("Configuration loaded");
    tracing::info!("Catalog path: {}", catalog.display());

    let products = normalized_products(load_catalog(&catalog)?);
    tracing::info!("Serving {} products", products.len());

    let state = Arc::new(AppState { products });
    let app = routes::router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

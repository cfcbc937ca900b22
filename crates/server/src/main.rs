use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vodhub_core::{
    load_config, validate_config, Config, KeywordKind, RetentionSweeper, SearchService, Site,
    SqliteItemStore, SqliteKeywordStore, SqliteSiteRegistry, VodApiAdapter,
};
use vodhub_server::api::create_router;
use vodhub_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("VODHUB_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Stores share one database file
    let sites = Arc::new(
        SqliteSiteRegistry::new(&config.database.path).context("Failed to create site registry")?,
    );
    let keywords = Arc::new(
        SqliteKeywordStore::new(&config.database.path).context("Failed to create keyword store")?,
    );
    let items = Arc::new(
        SqliteItemStore::new(&config.database.path).context("Failed to create item store")?,
    );

    seed_from_config(&config, &sites, &keywords)?;

    let adapter =
        Arc::new(VodApiAdapter::from_config(&config.search).context("Failed to create adapter")?);

    let search = Arc::new(SearchService::new(
        &config.search,
        sites,
        keywords,
        adapter,
        items.clone(),
    ));

    search.refresh_queue().start().await;

    let sweeper = RetentionSweeper::new(items.clone(), &config.retention);
    sweeper.start().await;

    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&search), items));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    sweeper.stop().await;
    search.refresh_queue().stop().await;

    Ok(())
}

/// Upsert configured sites and insert configured filter keywords.
fn seed_from_config(
    config: &Config,
    sites: &SqliteSiteRegistry,
    keywords: &SqliteKeywordStore,
) -> Result<()> {
    for seed in &config.sites {
        sites
            .upsert_site(&Site::from(seed))
            .with_context(|| format!("Failed to seed site {}", seed.key))?;
    }
    if !config.sites.is_empty() {
        info!("Seeded {} sites from config", config.sites.len());
    }

    let lists = [
        (KeywordKind::Category, &config.filters.category),
        (KeywordKind::Copyright, &config.filters.copyright),
    ];
    for (kind, list) in lists {
        let mut added = 0;
        for keyword in list {
            if keywords
                .add_keyword(kind, keyword)
                .with_context(|| format!("Failed to seed {} keyword {:?}", kind, keyword))?
            {
                added += 1;
            }
        }
        if added > 0 {
            info!("Seeded {} {} keywords", added, kind);
        }
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

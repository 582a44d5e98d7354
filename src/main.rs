use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;

use quanta_stream::binance::rest::BinanceRestClient;
use quanta_stream::binance::ws::BinanceWsConnector;
use quanta_stream::config::{Config, FeedMode};
use quanta_stream::feed::{FeedHub, FeedSource};
use quanta_stream::server::{router, ServerState};
use quanta_stream::session::{SessionBridge, SessionSettings};

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        config
            .logging
            .level
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn choose_source(config: &Config, rest: &BinanceRestClient) -> FeedSource {
    let live = FeedSource::Live(Arc::new(BinanceWsConnector));
    let synthetic = FeedSource::Synthetic(config.synthetic.clone());
    match config.feed.mode {
        FeedMode::Live => live,
        FeedMode::Synthetic => synthetic,
        FeedMode::Auto => match rest.ping().await {
            Ok(endpoint) => {
                tracing::info!(endpoint = %endpoint, "Binance reachable, using live feed");
                live
            }
            Err(e) => {
                tracing::warn!(error = %e, "Binance unreachable, using synthetic feed");
                synthetic
            }
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config);

    tracing::info!(
        symbol = %config.feed.symbol,
        bind = %config.server.bind_addr,
        mode = ?config.feed.mode,
        "Starting quanta-stream"
    );

    let rest = BinanceRestClient::new(&config.history).context("failed to build REST client")?;
    let source = choose_source(&config, &rest).await;
    let hub = Arc::new(FeedHub::new(config.feed.clone(), source));
    // The default instrument starts eagerly and stays up between sessions.
    hub.pin(&config.feed.symbol)
        .context("failed to start default feed")?;

    let bridge = Arc::new(SessionBridge::new(
        Arc::clone(&hub),
        Arc::new(rest),
        SessionSettings::from_config(&config),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = router(ServerState {
        bridge,
        shutdown: shutdown_rx,
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            tracing::info!("Ctrl+C received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("server error")?;

    hub.close_all();
    tracing::info!("Shutdown complete");
    Ok(())
}

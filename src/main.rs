use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};

use whale_trader::bot::{CommandGateway, RateLimiter};
use whale_trader::chain::{JsonRpcChainClient, WhaleAlert, WhaleWatcher};
use whale_trader::config::AppConfig;
use whale_trader::engine::{
    ArbitrageStrategy,
    MarketMakerStrategy,
    RebalanceStrategy,
    RetryConfig,
    StrategyEngine,
    SwapApiClient,
    TradeExecutor,
};
use whale_trader::market::{HttpPriceFeed, MarketDataSource};
use whale_trader::state::TradingState;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    // Missing or malformed configuration is fatal before anything spawns.
    let config = AppConfig::load_from_env()?;
    debug!(
        "chat transport credentials loaded ({} bytes)",
        config.bot_token.len()
    );

    let state = Arc::new(TradingState::new());
    for (asset, quantity) in &config.initial_balances {
        state.adjust_portfolio(asset, *quantity).await?;
    }

    let primary: Arc<dyn MarketDataSource> = Arc::new(HttpPriceFeed::new(
        config.price_api_url.clone(),
        config.price_cache_ttl,
    ));
    let secondary: Arc<dyn MarketDataSource> = Arc::new(HttpPriceFeed::new(
        config.secondary_price_api_url.clone(),
        config.price_cache_ttl,
    ));
    let chain = Arc::new(JsonRpcChainClient::new(config.rpc_endpoint.clone()));
    let submitter = Arc::new(SwapApiClient::new(
        config.swap_api_url.clone(),
        config.wallet_address.clone(),
        config.signing_key,
        SUBMIT_TIMEOUT,
    ));

    let executor = Arc::new(TradeExecutor::new(
        Arc::clone(&state),
        submitter,
        RetryConfig::default(),
    ));

    // Scoring models are injected capabilities; none are wired in this build.
    let (alert_tx, mut alert_rx) = mpsc::channel::<WhaleAlert>(256);
    let watcher = Arc::new(WhaleWatcher::new(
        config.watcher.clone(),
        chain,
        Arc::clone(&primary),
        None,
        None,
        alert_tx,
    ));

    let engine = StrategyEngine::new(
        ArbitrageStrategy::new(
            config.arbitrage.clone(),
            Arc::clone(&primary),
            secondary,
            Arc::clone(&executor),
        ),
        MarketMakerStrategy::new(
            config.market_maker.clone(),
            Arc::clone(&primary),
            Arc::clone(&state),
            Arc::clone(&executor),
        ),
        RebalanceStrategy::new(
            config.rebalance.clone(),
            Arc::clone(&primary),
            Arc::clone(&state),
            Arc::clone(&executor),
        ),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    info!("Starting whale trading bot");
    let mut handles = engine.spawn(shutdown_rx.clone());
    {
        let watcher = Arc::clone(&watcher);
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move { watcher.run(shutdown).await }));
    }

    // The chat transport is an external collaborator; alerts are drained to
    // the log here and commands are read from the local console.
    {
        let mut shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return;
                        }
                    }
                    alert = alert_rx.recv() => {
                        let Some(alert) = alert else { return };
                        info!(
                            "🚨 whale alert: {} moved ${} of {}",
                            alert.wallet.address, alert.usd_value, alert.token
                        );
                    }
                }
            }
        }));
    }

    let gateway = CommandGateway::new(
        RateLimiter::new(config.rate_limit.clone()),
        Arc::clone(&executor),
        Arc::clone(&watcher),
        Arc::clone(&primary),
        config.operator.clone(),
    );
    let console_identity = config
        .operator
        .clone()
        .unwrap_or_else(|| "console".to_string());
    {
        let mut shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return;
                        }
                    }
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(line)) => {
                                let mut parts = line.split_whitespace();
                                let Some(name) = parts.next() else { continue };
                                let args: Vec<&str> = parts.collect();
                                let reply = gateway.dispatch(&console_identity, name, &args).await;
                                println!("{reply}");
                            }
                            Ok(None) => return,
                            Err(e) => {
                                warn!("Console read failed: {e}");
                                return;
                            }
                        }
                    }
                }
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping loops");
    shutdown_tx.send(true)?;
    for result in join_all(handles).await {
        if let Err(e) = result {
            error!("Task ended abnormally: {e}");
        }
    }
    info!("All loops stopped");
    Ok(())
}

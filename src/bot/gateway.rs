use std::sync::Arc;

use log::info;
use rust_decimal::Decimal;
use thiserror::Error;

use super::rate_limiter::RateLimiter;
use crate::chain::WhaleWatcher;
use crate::engine::{TradeExecutor, TradeIntent};
use crate::market::MarketDataSource;
use crate::state::OrderSide;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Help,
    Trade { asset: String, amount: Decimal },
    Whales,
    Notify,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    pub fn parse(name: &str, args: &[&str]) -> Result<Self, CommandError> {
        match name.trim_start_matches('/') {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "help" => Ok(Command::Help),
            "whales" => Ok(Command::Whales),
            "notify" => Ok(Command::Notify),
            "trade" => match args {
                [asset, amount] => {
                    let amount: Decimal = amount
                        .parse()
                        .map_err(|_| CommandError::Usage("/trade <asset> <amount>"))?;
                    if amount <= Decimal::ZERO {
                        return Err(CommandError::Usage("/trade <asset> <amount>"));
                    }
                    Ok(Command::Trade {
                        asset: asset.to_string(),
                        amount,
                    })
                }
                _ => Err(CommandError::Usage("/trade <asset> <amount>")),
            },
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

const HELP_TEXT: &str = "🤖 Available commands:\n\
    /start - Enable trading\n\
    /stop - Disable trading\n\
    /trade <asset> <amount> - Buy an asset\n\
    /whales - List detected whales\n\
    /notify - Toggle whale notifications\n\
    /help - Show this help message";

/// Routes operator commands to the engine and watcher after the rate-limit
/// gate. No business logic lives here; every reply is a formatted result of
/// a single query or mutation.
pub struct CommandGateway {
    limiter: RateLimiter,
    executor: Arc<TradeExecutor>,
    watcher: Arc<WhaleWatcher>,
    market: Arc<dyn MarketDataSource>,
    operator: Option<String>,
}

impl CommandGateway {
    pub fn new(
        limiter: RateLimiter,
        executor: Arc<TradeExecutor>,
        watcher: Arc<WhaleWatcher>,
        market: Arc<dyn MarketDataSource>,
        operator: Option<String>,
    ) -> Self {
        Self {
            limiter,
            executor,
            watcher,
            market,
            operator,
        }
    }

    /// Parse-and-handle entry point for the transport layer. The rate limit
    /// is charged before parsing, so malformed input is metered too.
    pub async fn dispatch(&self, identity: &str, name: &str, args: &[&str]) -> String {
        if !self.limiter.allow(identity).await {
            return rate_limited();
        }
        match Command::parse(name, args) {
            Ok(command) => self.execute(identity, command).await,
            Err(e) => format!("❓ {e}"),
        }
    }

    pub async fn handle(&self, identity: &str, command: Command) -> String {
        if !self.limiter.allow(identity).await {
            return rate_limited();
        }
        self.execute(identity, command).await
    }

    async fn execute(&self, identity: &str, command: Command) -> String {
        match command {
            Command::Start => {
                if !self.authorized(identity) {
                    return unauthorized();
                }
                self.executor.set_trading_enabled(true);
                info!("trading enabled by {identity}");
                "🚀 Trading enabled! Use /help to see available commands.".to_string()
            }
            Command::Stop => {
                if !self.authorized(identity) {
                    return unauthorized();
                }
                self.executor.set_trading_enabled(false);
                info!("trading disabled by {identity}");
                "⏹️ Trading disabled. Use /start to resume.".to_string()
            }
            Command::Help => HELP_TEXT.to_string(),
            Command::Trade { asset, amount } => {
                if !self.authorized(identity) {
                    return unauthorized();
                }
                let price = match self.market.price(&asset).await {
                    Ok(price) => price,
                    Err(e) => return format!("❌ No price available for {asset}: {e}"),
                };
                match self
                    .executor
                    .execute_trade(TradeIntent {
                        asset: asset.clone(),
                        amount,
                        side: OrderSide::Buy,
                        price,
                    })
                    .await
                {
                    Ok(tx_id) => format!("✅ Bought {amount} {asset}: {tx_id}"),
                    Err(e) => format!("❌ Failed to execute trade: {e}"),
                }
            }
            Command::Whales => {
                let whales = self.watcher.known_whales().await;
                if whales.is_empty() {
                    "No whales detected yet.".to_string()
                } else {
                    let addresses: Vec<String> =
                        whales.into_iter().map(|w| w.address).collect();
                    format!("🐋 Monitored whales:\n{}", addresses.join("\n"))
                }
            }
            Command::Notify => {
                if !self.authorized(identity) {
                    return unauthorized();
                }
                let enabled = self.watcher.toggle_notifications();
                let status = if enabled { "enabled" } else { "disabled" };
                format!("🔔 Notifications {status}.")
            }
        }
    }

    fn authorized(&self, identity: &str) -> bool {
        self.operator
            .as_deref()
            .map_or(true, |operator| operator == identity)
    }
}

fn unauthorized() -> String {
    "⛔ You are not authorized to do that.".to_string()
}

fn rate_limited() -> String {
    "🚫 Rate limit exceeded. Please try again later.".to_string()
}

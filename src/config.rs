use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use zeroize::Zeroize;

use crate::bot::RateLimiterConfig;
use crate::chain::WatcherConfig;
use crate::engine::{ArbitrageConfig, MarketMakerConfig, RebalanceConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: String, reason: String },

    #[error("target allocation weights sum to {sum}, expected 1.0 ± {epsilon}")]
    BadAllocation { sum: Decimal, epsilon: Decimal },
}

/// Private key reference, wiped from memory on drop and kept out of Debug
/// output.
pub struct SigningKey(String);

impl SigningKey {
    pub fn new(raw: String) -> Self {
        Self(raw)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Drop for SigningKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(***)")
    }
}

#[derive(Debug)]
pub struct AppConfig {
    pub bot_token: String,
    pub rpc_endpoint: String,
    pub price_api_url: String,
    pub secondary_price_api_url: String,
    pub swap_api_url: String,
    pub wallet_address: String,
    pub signing_key: SigningKey,
    pub operator: Option<String>,
    pub price_cache_ttl: Duration,
    pub initial_balances: HashMap<String, Decimal>,
    pub watcher: WatcherConfig,
    pub arbitrage: ArbitrageConfig,
    pub market_maker: MarketMakerConfig,
    pub rebalance: RebalanceConfig,
    pub rate_limit: RateLimiterConfig,
}

impl AppConfig {
    pub fn load_from_env() -> Result<Self, ConfigError> {
        Self::load_with(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup. Missing
    /// required variables and malformed values are startup-fatal.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let targets = parse_allocation(&optional(
            &lookup,
            "TARGET_ALLOCATION",
            "ETH:0.6,USDC:0.4",
        ))?;

        Ok(Self {
            bot_token: required(&lookup, "TELEGRAM_BOT_TOKEN")?,
            rpc_endpoint: required(&lookup, "RPC_ENDPOINT")?,
            price_api_url: required(&lookup, "PRICE_API_URL")?,
            secondary_price_api_url: required(&lookup, "SECONDARY_PRICE_API_URL")?,
            swap_api_url: required(&lookup, "SWAP_API_URL")?,
            wallet_address: required(&lookup, "WALLET_ADDRESS")?,
            signing_key: SigningKey::new(required(&lookup, "PRIVATE_KEY")?),
            operator: lookup("OPERATOR_ID"),
            price_cache_ttl: secs(&lookup, "PRICE_CACHE_TTL_SECS", 30)?,
            initial_balances: parse_balances(&optional(&lookup, "INITIAL_BALANCES", ""))?,
            watcher: WatcherConfig {
                poll_interval: secs(&lookup, "POLL_INTERVAL_SECS", 10)?,
                whale_threshold: decimal(&lookup, "WHALE_THRESHOLD", "100000")?,
                native_decimals: int(&lookup, "NATIVE_DECIMALS", 18)?,
            },
            arbitrage: ArbitrageConfig {
                asset: optional(&lookup, "ARBITRAGE_ASSET", "ETH"),
                threshold: decimal(&lookup, "ARBITRAGE_THRESHOLD", "0.01")?,
                trade_size: decimal(&lookup, "ARBITRAGE_TRADE_SIZE", "0.1")?,
                interval: secs(&lookup, "ARBITRAGE_INTERVAL_SECS", 15)?,
            },
            market_maker: MarketMakerConfig {
                pair: optional(&lookup, "MARKET_MAKER_PAIR", "ETH/USD"),
                asset: optional(&lookup, "MARKET_MAKER_ASSET", "ETH"),
                spread_target: decimal(&lookup, "SPREAD_TARGET", "0.02")?,
                order_size: decimal(&lookup, "MARKET_MAKER_ORDER_SIZE", "0.1")?,
                interval: secs(&lookup, "MARKET_MAKER_INTERVAL_SECS", 20)?,
            },
            rebalance: RebalanceConfig {
                targets,
                band: decimal(&lookup, "REBALANCE_BAND", "0.05")?,
                interval: secs(&lookup, "REBALANCE_INTERVAL_SECS", 300)?,
            },
            rate_limit: RateLimiterConfig {
                max_requests: int(&lookup, "RATE_LIMIT", 5)?,
                window: secs(&lookup, "RATE_LIMIT_WINDOW_SECS", 60)?,
            },
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name).unwrap_or_else(|| default.to_string())
}

fn decimal(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    optional(lookup, name, default)
        .parse()
        .map_err(|e: rust_decimal::Error| ConfigError::InvalidVar {
            var: name.to_string(),
            reason: e.to_string(),
        })
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match lookup(name) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .parse()
            .map(Duration::from_secs)
            .map_err(|e: std::num::ParseIntError| ConfigError::InvalidVar {
                var: name.to_string(),
                reason: e.to_string(),
            }),
    }
}

fn int<T: std::str::FromStr<Err = std::num::ParseIntError> + From<u8>>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u8,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(T::from(default)),
        Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::InvalidVar {
                var: name.to_string(),
                reason: e.to_string(),
            }
        }),
    }
}

fn parse_pairs(raw: &str, var: &str) -> Result<HashMap<String, Decimal>, ConfigError> {
    let mut map = HashMap::new();
    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let (asset, value) = entry.split_once(':').ok_or_else(|| ConfigError::InvalidVar {
            var: var.to_string(),
            reason: format!("expected ASSET:NUMBER, got {entry:?}"),
        })?;
        let value: Decimal = value.trim().parse().map_err(|e: rust_decimal::Error| {
            ConfigError::InvalidVar {
                var: var.to_string(),
                reason: e.to_string(),
            }
        })?;
        if value < Decimal::ZERO {
            return Err(ConfigError::InvalidVar {
                var: var.to_string(),
                reason: format!("negative value for {}", asset.trim()),
            });
        }
        map.insert(asset.trim().to_string(), value);
    }
    Ok(map)
}

fn parse_balances(raw: &str) -> Result<HashMap<String, Decimal>, ConfigError> {
    parse_pairs(raw, "INITIAL_BALANCES")
}

/// Parse "ETH:0.6,USDC:0.4" and require the weights to sum to 1.0 within
/// epsilon; anything else is a fatal startup error, never a runtime one.
fn parse_allocation(raw: &str) -> Result<HashMap<String, Decimal>, ConfigError> {
    let epsilon = Decimal::new(1, 4);
    let targets = parse_pairs(raw, "TARGET_ALLOCATION")?;
    if targets.is_empty() {
        return Err(ConfigError::InvalidVar {
            var: "TARGET_ALLOCATION".to_string(),
            reason: "no allocation entries".to_string(),
        });
    }
    let sum: Decimal = targets.values().copied().sum();
    if (sum - Decimal::ONE).abs() > epsilon {
        return Err(ConfigError::BadAllocation { sum, epsilon });
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "token"),
            ("RPC_ENDPOINT", "http://rpc.example"),
            ("PRICE_API_URL", "http://prices.example"),
            ("SECONDARY_PRICE_API_URL", "http://prices2.example"),
            ("SWAP_API_URL", "http://swap.example"),
            ("WALLET_ADDRESS", "0xwallet"),
            ("PRIVATE_KEY", "0xsecret"),
        ])
    }

    fn load(vars: HashMap<&'static str, &'static str>) -> Result<AppConfig, ConfigError> {
        AppConfig::load_with(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_fill_everything_but_the_required_vars() {
        let config = load(base_vars()).unwrap();
        assert_eq!(config.watcher.whale_threshold, Decimal::new(100_000, 0));
        assert_eq!(config.market_maker.spread_target, Decimal::new(2, 2));
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rebalance.targets.len(), 2);
    }

    #[test]
    fn missing_required_var_is_fatal() {
        let mut vars = base_vars();
        vars.remove("RPC_ENDPOINT");
        let err = load(vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(name) if name == "RPC_ENDPOINT"));
    }

    #[test]
    fn allocation_weights_must_sum_to_one() {
        let mut vars = base_vars();
        vars.insert("TARGET_ALLOCATION", "ETH:0.7,USDC:0.4");
        let err = load(vars).unwrap_err();
        assert!(matches!(err, ConfigError::BadAllocation { .. }));
    }

    #[test]
    fn allocation_within_epsilon_is_accepted() {
        let mut vars = base_vars();
        vars.insert("TARGET_ALLOCATION", "ETH:0.33,USDC:0.33,SOL:0.34");
        assert!(load(vars).is_ok());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut vars = base_vars();
        vars.insert("TARGET_ALLOCATION", "ETH:1.5,USDC:-0.5");
        let err = load(vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { .. }));
    }

    #[test]
    fn malformed_threshold_is_rejected() {
        let mut vars = base_vars();
        vars.insert("WHALE_THRESHOLD", "lots");
        let err = load(vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { var, .. } if var == "WHALE_THRESHOLD"));
    }

    #[test]
    fn initial_balances_parse() {
        let mut vars = base_vars();
        vars.insert("INITIAL_BALANCES", "ETH:2.5,USDC:5000");
        let config = load(vars).unwrap();
        assert_eq!(config.initial_balances["ETH"], Decimal::new(25, 1));
        assert_eq!(config.initial_balances["USDC"], Decimal::new(5000, 0));
    }

    #[test]
    fn signing_key_debug_is_redacted() {
        let key = SigningKey::new("super-secret".to_string());
        assert_eq!(format!("{key:?}"), "SigningKey(***)");
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch, RwLock};

use super::types::{ChainClient, ChainError, ObservedTransaction, WhaleAlert, WhaleWallet};
use crate::market::{MarketDataError, MarketDataSource};
use crate::model::{PriceModel, ScamClassifier};

#[derive(Clone, Debug)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    /// USD value a single transfer must reach for the sender to count as a whale.
    pub whale_threshold: Decimal,
    /// Scale of the chain's native unit (18 for wei).
    pub native_decimals: u32,
}

/// Polls the chain on a fixed interval, values each transfer in USD, and
/// reports every threshold-crossing sender exactly once for the process
/// lifetime. A failed poll is logged and retried on the next tick.
pub struct WhaleWatcher {
    config: WatcherConfig,
    chain: Arc<dyn ChainClient>,
    market: Arc<dyn MarketDataSource>,
    classifier: Option<Arc<dyn ScamClassifier>>,
    price_model: Option<Arc<dyn PriceModel>>,
    known_whales: RwLock<HashMap<String, DateTime<Utc>>>,
    notifications_enabled: AtomicBool,
    alerts: mpsc::Sender<WhaleAlert>,
}

impl WhaleWatcher {
    pub fn new(
        config: WatcherConfig,
        chain: Arc<dyn ChainClient>,
        market: Arc<dyn MarketDataSource>,
        classifier: Option<Arc<dyn ScamClassifier>>,
        price_model: Option<Arc<dyn PriceModel>>,
        alerts: mpsc::Sender<WhaleAlert>,
    ) -> Self {
        Self {
            config,
            chain,
            market,
            classifier,
            price_model,
            known_whales: RwLock::new(HashMap::new()),
            notifications_enabled: AtomicBool::new(true),
            alerts,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        info!(
            "whale watcher started (threshold ${}, every {:?})",
            self.config.whale_threshold, self.config.poll_interval
        );
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("whale watcher shutting down");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.scan_once().await {
                        error!("block scan failed, retrying next tick: {e}");
                    }
                }
            }
        }
    }

    pub(crate) async fn scan_once(&self) -> Result<(), ChainError> {
        let transactions = self.chain.poll_next_block().await?;
        for tx in transactions {
            self.classify_transaction(tx).await;
        }
        Ok(())
    }

    async fn classify_transaction(&self, tx: ObservedTransaction) {
        let Some(units) = native_to_units(tx.amount, self.config.native_decimals) else {
            warn!("transfer amount {} overflows valuation range, skipped", tx.amount);
            return;
        };

        // A missing price must neither suppress a real whale nor fabricate
        // one, so the transaction is skipped outright.
        let price = match self.market.price(&tx.token).await {
            Ok(price) => price,
            Err(MarketDataError::NoData(token)) => {
                debug!("no price for {token}, transaction skipped");
                return;
            }
            Err(e) => {
                warn!("price lookup failed for {}: {e}", tx.token);
                return;
            }
        };

        let Some(usd_value) = units.checked_mul(price) else {
            warn!(
                "USD valuation of {} transfer from {} overflows, skipped",
                tx.token, tx.sender
            );
            return;
        };
        if usd_value < self.config.whale_threshold {
            return;
        }

        let first_seen = Utc::now();
        let newly_detected = {
            let mut whales = self.known_whales.write().await;
            if whales.contains_key(&tx.sender) {
                false
            } else {
                whales.insert(tx.sender.clone(), first_seen);
                true
            }
        };
        if !newly_detected {
            return;
        }

        info!("🚨 new whale detected: {} (${usd_value})", tx.sender);
        self.emit_alert(tx, usd_value, first_seen).await;
    }

    async fn emit_alert(
        &self,
        tx: ObservedTransaction,
        usd_value: Decimal,
        first_seen: DateTime<Utc>,
    ) {
        if !self.notifications_enabled.load(Ordering::Relaxed) {
            return;
        }

        let scam_verdict = match &self.classifier {
            Some(classifier) => match classifier.classify(&tx.token).await {
                Ok(verdict) => Some(verdict),
                Err(e) => {
                    debug!("scam classifier skipped: {e}");
                    None
                }
            },
            None => None,
        };
        let predicted_price = match &self.price_model {
            Some(model) => match model.predict(&tx.token).await {
                Ok(price) => Some(price),
                Err(e) => {
                    debug!("price model skipped: {e}");
                    None
                }
            },
            None => None,
        };

        let alert = WhaleAlert {
            wallet: WhaleWallet {
                address: tx.sender,
                first_seen,
            },
            token: tx.token,
            usd_value,
            scam_verdict,
            predicted_price,
        };
        if let Err(e) = self.alerts.send(alert).await {
            warn!("notification sink closed, alert dropped: {e}");
        }
    }

    pub async fn known_whales(&self) -> Vec<WhaleWallet> {
        let whales = self.known_whales.read().await;
        let mut wallets: Vec<WhaleWallet> = whales
            .iter()
            .map(|(address, first_seen)| WhaleWallet {
                address: address.clone(),
                first_seen: *first_seen,
            })
            .collect();
        wallets.sort_by_key(|w| w.first_seen);
        wallets
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled.load(Ordering::Relaxed)
    }

    /// Flip the notification switch, returning the new value.
    pub fn toggle_notifications(&self) -> bool {
        !self.notifications_enabled.fetch_xor(true, Ordering::Relaxed)
    }
}

fn native_to_units(amount: u128, decimals: u32) -> Option<Decimal> {
    if amount > i128::MAX as u128 {
        return None;
    }
    Decimal::try_from_i128_with_scale(amount as i128, decimals).ok()
}

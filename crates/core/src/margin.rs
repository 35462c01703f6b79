//! Margin-call monitor.
//!
//! Scans every tracked loan on a fixed interval. Loans whose current margin
//! has fallen below 90% of the maintenance margin get a margin-call mail,
//! at most once per borrower per cooldown window. Missing indexed data,
//! provider errors and send failures only skip the loan for this pass.

use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::position::{Position, PositionMap};
use crate::throttle::NotificationThrottle;
use watcher_api::{MarginCallMailer, MarginCallNotice, MarginCallParams};
use watcher_chain::units::{wei_to_decimal, WEI_PER_UNIT};
use watcher_chain::{PriceFeed, TradeEventSource};

/// Base asset of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseAsset {
    Btc,
    Usd,
}

impl BaseAsset {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Btc => "Btc",
            Self::Usd => "Usd",
        }
    }
}

/// Fraction of price movement a position at `leverage` can absorb.
///
/// `1 - (1 + buffer) * (leverage - 1) / leverage`
pub fn max_price_movement(leverage: f64, buffer: f64) -> f64 {
    1.0 - ((1.0 + buffer) * (leverage - 1.0) / leverage)
}

/// Approximate liquidation price around `reference_price`.
///
/// A heuristic, not the protocol's exact liquidation math.
pub fn liquidation_price(asset: BaseAsset, leverage: f64, reference_price: f64, buffer: f64) -> f64 {
    let movement = max_price_movement(leverage, buffer);
    match asset {
        BaseAsset::Btc => (1.0 - movement) * reference_price,
        BaseAsset::Usd => (1.0 + movement) * reference_price,
    }
}

/// Margin-call settings.
#[derive(Debug, Clone)]
pub struct MarginCallConfig {
    /// Trigger when current < maintenance * ratio_bps / 10000
    pub ratio_bps: u32,
    /// Minimum interval between two mails to one borrower
    pub cooldown: Duration,
    /// Sleep between scan passes
    pub scan_interval: Duration,
    /// First block searched for trade events
    pub trade_event_start_block: u64,
    /// Loans in this token are labelled "Btc"
    pub btc_token: Address,
    /// Quote token for the reference price
    pub usd_token: Address,
    /// Safety buffer on top of the maintenance margin
    pub maintenance_buffer: f64,
}

impl Default for MarginCallConfig {
    fn default() -> Self {
        Self {
            ratio_bps: 9000,
            cooldown: Duration::from_secs(3 * 60 * 60),
            scan_interval: Duration::from_secs(300),
            trade_event_start_block: 1_205_639,
            btc_token: Address::ZERO,
            usd_token: Address::ZERO,
            maintenance_buffer: 0.15,
        }
    }
}

/// What happened to one candidate loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginCallOutcome {
    Sent,
    Throttled,
    /// No trade event (or no borrower) indexed yet
    NotIndexed,
    /// A provider or the mail service failed
    Failed,
}

/// Counters for one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub scanned: usize,
    pub candidates: usize,
    pub sent: usize,
    pub throttled: usize,
    pub not_indexed: usize,
    pub failed: usize,
}

impl ScanSummary {
    fn record(&mut self, outcome: MarginCallOutcome) {
        match outcome {
            MarginCallOutcome::Sent => self.sent += 1,
            MarginCallOutcome::Throttled => self.throttled += 1,
            MarginCallOutcome::NotIndexed => self.not_indexed += 1,
            MarginCallOutcome::Failed => self.failed += 1,
        }
    }
}

/// Scans open loans and mails margin calls.
pub struct MarginCallMonitor {
    events: Arc<dyn TradeEventSource>,
    prices: Arc<dyn PriceFeed>,
    mailer: Arc<dyn MarginCallMailer>,
    throttle: Arc<NotificationThrottle>,
    config: MarginCallConfig,
}

impl MarginCallMonitor {
    pub fn new(
        events: Arc<dyn TradeEventSource>,
        prices: Arc<dyn PriceFeed>,
        mailer: Arc<dyn MarginCallMailer>,
        throttle: Arc<NotificationThrottle>,
        config: MarginCallConfig,
    ) -> Self {
        Self {
            events,
            prices,
            mailer,
            throttle,
            config,
        }
    }

    pub fn config(&self) -> &MarginCallConfig {
        &self.config
    }

    /// Scan until `shutdown` is cancelled.
    ///
    /// `positions` is called at the start of every pass so rebinding the
    /// collection takes effect on the next pass.
    pub async fn run<F>(&self, positions: F, shutdown: CancellationToken)
    where
        F: Fn() -> Arc<PositionMap>,
    {
        info!(
            interval_secs = self.config.scan_interval.as_secs(),
            cooldown_secs = self.config.cooldown.as_secs(),
            "Margin-call monitor started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let summary = self.scan_once(&positions()).await;
            if summary.candidates > 0 {
                info!(
                    scanned = summary.scanned,
                    candidates = summary.candidates,
                    sent = summary.sent,
                    throttled = summary.throttled,
                    not_indexed = summary.not_indexed,
                    failed = summary.failed,
                    "Margin-call pass finished"
                );
            }
            self.throttle.prune_expired(self.config.cooldown);

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.config.scan_interval) => {}
            }
        }

        info!("Margin-call monitor stopped");
    }

    /// One pass over all positions.
    pub async fn scan_once(&self, positions: &PositionMap) -> ScanSummary {
        // Snapshot first: no map guard may be held across an await.
        let candidates: Vec<Position> = positions
            .iter()
            .filter(|entry| entry.value().is_margin_call(self.config.ratio_bps))
            .map(|entry| entry.value().clone())
            .collect();

        let mut summary = ScanSummary {
            scanned: positions.len(),
            candidates: candidates.len(),
            ..Default::default()
        };

        for position in &candidates {
            let outcome = self.process(position).await;
            summary.record(outcome);
        }
        summary
    }

    /// Asset label for a loan token.
    pub fn asset_of(&self, loan_token: Address) -> BaseAsset {
        if loan_token == self.config.btc_token {
            BaseAsset::Btc
        } else {
            BaseAsset::Usd
        }
    }

    #[instrument(skip(self, position), fields(loan_id = %position.loan_id))]
    async fn process(&self, position: &Position) -> MarginCallOutcome {
        let event = match self
            .events
            .find_trade_event(position.loan_id, self.config.trade_event_start_block, None)
            .await
        {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("No trade event indexed yet");
                return MarginCallOutcome::NotIndexed;
            }
            Err(e) => {
                warn!(error = %e, "Failed to look up trade event");
                return MarginCallOutcome::Failed;
            }
        };

        let Some(user) = event.user else {
            debug!("Trade event has no borrower");
            return MarginCallOutcome::NotIndexed;
        };

        let leverage = wei_to_decimal(event.entry_leverage);
        if !(leverage > 0.0) {
            warn!(leverage = leverage, "Trade event has no usable leverage");
            return MarginCallOutcome::Failed;
        }

        let asset = self.asset_of(position.loan_token);
        let reference_price = match self
            .prices
            .reference_price(self.config.btc_token, self.config.usd_token, WEI_PER_UNIT)
            .await
        {
            Ok(price) => price,
            Err(e) => {
                warn!(error = %e, "Failed to get reference price");
                return MarginCallOutcome::Failed;
            }
        };
        let liq_price = liquidation_price(asset, leverage, reference_price, self.config.maintenance_buffer);

        let key = user.to_string().to_lowercase();
        if !self.throttle.try_notify(&key, self.config.cooldown) {
            return MarginCallOutcome::Throttled;
        }

        let notice = MarginCallNotice {
            user: user.to_string(),
            params: MarginCallParams {
                asset: asset.label().to_string(),
                liquidation_price: liq_price,
                tx_hash: event.tx_hash.map(|h| h.to_string()).unwrap_or_default(),
                leverage,
                principal: position.principal.to_string(),
                position_size: event.position_size.to_string(),
                current_margin: wei_to_decimal(position.current_margin),
                maintenance_margin: wei_to_decimal(position.maintenance_margin),
            },
        };

        match self.mailer.send_margin_call(&notice).await {
            Ok(()) => {
                info!(user = %user, asset = asset.label(), liquidation_price = liq_price, "Margin call sent");
                MarginCallOutcome::Sent
            }
            Err(e) => {
                error!(user = %user, error = %e, "Error on sending margin call");
                MarginCallOutcome::Failed
            }
        }
    }
}

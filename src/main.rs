//! Lending protocol watcher
//!
//! Keeps an eye on the liquidation infrastructure of a lending protocol:
//! - Periodic health checks of nodes and operator wallet balances
//! - Low-balance alerts to the internal Telegram channel
//! - Margin-call mails to borrowers close to liquidation

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use watcher_api::{ChatAlerter, MailServiceClient, TelegramClient};
use watcher_chain::{NodeClient, PriceFeedContract, PublicRpcClient, TradeEventReader};
use watcher_core::{
    load_from_env, HealthMonitor, MarginCallMonitor, MonitorFacade, NotificationThrottle,
    PositionMap, ResolvedConfig, WalletQueueManager,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,watcher_core=debug,watcher_chain=debug")),
        )
        .init();

    let config = load_from_env()?;
    config.log_config();
    let resolved = config.resolve()?;

    info!(network = %resolved.network, "Starting watcher");

    let facade = build_facade(&resolved);

    // Filled by the position tracker; the watcher only reads them.
    let positions = Arc::new(PositionMap::new());
    let liquidations = Arc::new(PositionMap::new());

    facade.start(positions, liquidations);
    facade.start_margin_calls();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    facade.shutdown().await;

    Ok(())
}

fn build_facade(config: &ResolvedConfig) -> MonitorFacade {
    let node = Arc::new(NodeClient::new(&config.private_node_url).with_timeout(config.private_node_timeout));
    let public_node = Arc::new(
        PublicRpcClient::new(&config.public_node_url).with_timeout(config.public_node_timeout),
    );

    let alerter = config
        .telegram_bot_token
        .as_ref()
        .map(|token| {
            Arc::new(TelegramClient::new(token).with_timeout(config.telegram_timeout)) as Arc<dyn ChatAlerter>
        });

    // One throttle for both monitors; keys never collide.
    let throttle = Arc::new(NotificationThrottle::new());

    let health = HealthMonitor::new(
        node.clone(),
        public_node,
        node,
        alerter,
        throttle.clone(),
        config.monitored_wallets(),
        config.health.clone(),
    );

    let margin = MarginCallMonitor::new(
        Arc::new(
            TradeEventReader::new(&config.private_node_url, config.protocol)
                .with_timeout(config.private_node_timeout),
        ),
        Arc::new(
            PriceFeedContract::new(&config.private_node_url, config.price_feed)
                .with_timeout(config.private_node_timeout),
        ),
        Arc::new(
            MailServiceClient::new(&config.mail_server_host, &config.mail_api_key)
                .with_timeout(config.mail_timeout),
        ),
        throttle,
        config.margin.clone(),
    );

    let wallet_queue = WalletQueueManager::with_capacity(config.wallets.iter().copied(), config.max_concurrent);

    MonitorFacade::new(Arc::new(health), Arc::new(margin), Arc::new(wallet_queue))
}

//! Orchestration surface of the watcher.
//!
//! [`MonitorFacade`] binds the monitors to the live position collections,
//! owns the health timer and the margin-call task, and answers on-demand
//! status queries.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::health::HealthMonitor;
use crate::margin::MarginCallMonitor;
use crate::position::{Position, PositionMap};
use crate::signals::HealthSignals;
use crate::wallet_queue::WalletQueueManager;

/// Collections owned by the position tracker.
#[derive(Clone, Default)]
struct Bindings {
    positions: Arc<PositionMap>,
    liquidations: Arc<PositionMap>,
}

pub struct MonitorFacade {
    health: Arc<HealthMonitor>,
    margin: Arc<MarginCallMonitor>,
    wallet_queue: Arc<WalletQueueManager>,
    bindings: Arc<RwLock<Bindings>>,
    health_task: Mutex<Option<JoinHandle<()>>>,
    margin_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl MonitorFacade {
    pub fn new(
        health: Arc<HealthMonitor>,
        margin: Arc<MarginCallMonitor>,
        wallet_queue: Arc<WalletQueueManager>,
    ) -> Self {
        Self {
            health,
            margin,
            wallet_queue,
            bindings: Arc::new(RwLock::new(Bindings::default())),
            health_task: Mutex::new(None),
            margin_task: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Bind the live collections and arm the health timer.
    ///
    /// Calling again rebinds the collections; the timer is never armed
    /// twice, and never after [`shutdown`](Self::shutdown). Returns whether
    /// the timer is running afterwards.
    pub fn start(&self, positions: Arc<PositionMap>, liquidations: Arc<PositionMap>) -> bool {
        *self.bindings.write() = Bindings {
            positions,
            liquidations,
        };

        if self.shutdown.is_cancelled() {
            warn!("Monitor already shut down, health timer not armed");
            return false;
        }

        let mut task = self.health_task.lock();
        if task.is_some() {
            warn!("Monitor already started, collections rebound");
            return true;
        }
        if !self.health.alerts_enabled() {
            info!("No chat bot token configured, health timer not armed");
            return false;
        }

        let health = self.health.clone();
        let bindings = self.bindings.clone();
        let shutdown = self.shutdown.clone();
        let period = health.config().interval;

        *task = Some(tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = timer.tick() => {
                        let (positions, liquidations) = {
                            let bound = bindings.read();
                            (bound.positions.len(), bound.liquidations.len())
                        };
                        let alerts = health.check_system(positions, liquidations).await;
                        debug!(alerts, "Health check finished");
                    }
                }
            }
            info!("Health timer stopped");
        }));

        info!(interval_secs = period.as_secs(), "Health timer armed");
        true
    }

    /// Spawn the margin-call loop. Returns false if it is already running
    /// or the monitor has been shut down.
    pub fn start_margin_calls(&self) -> bool {
        if self.shutdown.is_cancelled() {
            warn!("Monitor already shut down, margin-call monitor not started");
            return false;
        }

        let mut task = self.margin_task.lock();
        if task.is_some() {
            warn!("Margin-call monitor already running");
            return false;
        }

        let margin = self.margin.clone();
        let bindings = self.bindings.clone();
        let shutdown = self.shutdown.clone();
        *task = Some(tokio::spawn(async move {
            margin
                .run(move || bindings.read().positions.clone(), shutdown)
                .await;
        }));
        true
    }

    /// Fresh on-demand snapshot, independent of the timer.
    pub async fn get_signals(&self) -> HealthSignals {
        let (positions, liquidations) = (self.open_positions_count(), self.open_liquidations_count());
        self.health.gather(positions, liquidations).await
    }

    pub fn open_positions_count(&self) -> usize {
        self.bindings.read().positions.len()
    }

    pub fn open_liquidations_count(&self) -> usize {
        self.bindings.read().liquidations.len()
    }

    /// Snapshot of the open positions.
    pub fn open_positions(&self) -> Vec<Position> {
        snapshot(&self.bindings.read().positions)
    }

    /// Snapshot of the positions being liquidated.
    pub fn open_liquidations(&self) -> Vec<Position> {
        snapshot(&self.bindings.read().liquidations)
    }

    pub fn wallet_queue(&self) -> &Arc<WalletQueueManager> {
        &self.wallet_queue
    }

    pub fn is_health_armed(&self) -> bool {
        self.health_task.lock().is_some()
    }

    /// Cancel both background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handles = [self.health_task.lock().take(), self.margin_task.lock().take()];
        for handle in handles.into_iter().flatten() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Monitor task ended abnormally");
            }
        }
        info!("Monitor stopped");
    }
}

fn snapshot(map: &PositionMap) -> Vec<Position> {
    map.iter().map(|entry| entry.value().clone()).collect()
}

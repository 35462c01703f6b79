//! Per-wallet queues of in-flight operations.
//!
//! The node accepts only a handful of pending transactions per sender, so
//! each operator wallet carries a bounded queue of the loan ids it is
//! currently working on. Wallets are scanned in configuration order.
//!
//! On-chain funds are not checked here; callers needing funds-aware
//! selection must layer it on top.

use alloy::primitives::Address;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::position::{LoanId, Wallet, WalletRole};

/// Maximum in-flight operations per wallet.
pub const MAX_CONCURRENT: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("no {role} wallet {address} is configured")]
    UnknownWallet { role: WalletRole, address: Address },
}

#[derive(Debug)]
struct WalletSlot {
    wallet: Wallet,
    in_flight: Vec<LoanId>,
}

/// Bounded in-flight queues for every configured wallet.
#[derive(Debug)]
pub struct WalletQueueManager {
    capacity: usize,
    queues: Mutex<HashMap<WalletRole, Vec<WalletSlot>>>,
}

impl WalletQueueManager {
    /// Create queues for `wallets` with the default capacity.
    pub fn new(wallets: impl IntoIterator<Item = Wallet>) -> Self {
        Self::with_capacity(wallets, MAX_CONCURRENT)
    }

    /// Create queues with a custom per-wallet capacity.
    pub fn with_capacity(wallets: impl IntoIterator<Item = Wallet>, capacity: usize) -> Self {
        let mut queues: HashMap<WalletRole, Vec<WalletSlot>> = HashMap::new();

        for wallet in wallets {
            let slots = queues.entry(wallet.role).or_default();
            if slots.iter().any(|s| s.wallet.address == wallet.address) {
                warn!(role = %wallet.role, address = %wallet.address, "Duplicate wallet ignored");
                continue;
            }
            slots.push(WalletSlot {
                wallet,
                in_flight: Vec::new(),
            });
        }

        Self {
            capacity,
            queues: Mutex::new(queues),
        }
    }

    /// Per-wallet capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// First wallet of `role` with a free slot, in configuration order.
    pub fn select_wallet(&self, role: WalletRole) -> Option<Wallet> {
        let queues = self.queues.lock();
        queues
            .get(&role)?
            .iter()
            .find(|slot| slot.in_flight.len() < self.capacity)
            .map(|slot| slot.wallet)
    }

    /// Append `op` to a wallet's queue.
    ///
    /// No capacity check: the wallet must have come from [`select_wallet`].
    /// Prefer [`reserve`] when several tasks compete for wallets.
    ///
    /// [`select_wallet`]: Self::select_wallet
    /// [`reserve`]: Self::reserve
    pub fn enqueue(&self, role: WalletRole, address: Address, op: LoanId) -> Result<(), QueueError> {
        let mut queues = self.queues.lock();
        let slot = find_slot(&mut queues, role, address)?;
        slot.in_flight.push(op);
        debug!(role = %role, wallet = %address, op = %op, depth = slot.in_flight.len(), "Enqueued");
        Ok(())
    }

    /// Remove the first occurrence of `op` from a wallet's queue.
    ///
    /// Returns `false` (and changes nothing) if it was not queued.
    pub fn dequeue(&self, role: WalletRole, address: Address, op: LoanId) -> bool {
        let mut queues = self.queues.lock();
        let Ok(slot) = find_slot(&mut queues, role, address) else {
            debug!(role = %role, wallet = %address, "Dequeue from unknown wallet ignored");
            return false;
        };

        match slot.in_flight.iter().position(|queued| *queued == op) {
            Some(index) => {
                slot.in_flight.remove(index);
                debug!(role = %role, wallet = %address, op = %op, depth = slot.in_flight.len(), "Dequeued");
                true
            }
            None => false,
        }
    }

    /// Select a wallet and claim a slot for `op` in one step.
    pub fn reserve(&self, role: WalletRole, op: LoanId) -> Option<Wallet> {
        let mut queues = self.queues.lock();
        let slot = queues
            .get_mut(&role)?
            .iter_mut()
            .find(|slot| slot.in_flight.len() < self.capacity)?;
        slot.in_flight.push(op);
        debug!(role = %role, wallet = %slot.wallet.address, op = %op, depth = slot.in_flight.len(), "Reserved slot");
        Some(slot.wallet)
    }

    /// Current queue depth of a wallet, `None` if unknown.
    pub fn queue_len(&self, role: WalletRole, address: Address) -> Option<usize> {
        let queues = self.queues.lock();
        queues
            .get(&role)?
            .iter()
            .find(|slot| slot.wallet.address == address)
            .map(|slot| slot.in_flight.len())
    }

    /// Operations currently queued on a wallet, oldest first.
    pub fn in_flight(&self, role: WalletRole, address: Address) -> Vec<LoanId> {
        let queues = self.queues.lock();
        queues
            .get(&role)
            .and_then(|slots| slots.iter().find(|slot| slot.wallet.address == address))
            .map(|slot| slot.in_flight.clone())
            .unwrap_or_default()
    }

    /// Configured wallets of a role, in order.
    pub fn wallets(&self, role: WalletRole) -> Vec<Wallet> {
        let queues = self.queues.lock();
        queues
            .get(&role)
            .map(|slots| slots.iter().map(|slot| slot.wallet).collect())
            .unwrap_or_default()
    }
}

fn find_slot(
    queues: &mut HashMap<WalletRole, Vec<WalletSlot>>,
    role: WalletRole,
    address: Address,
) -> Result<&mut WalletSlot, QueueError> {
    queues
        .get_mut(&role)
        .and_then(|slots| slots.iter_mut().find(|slot| slot.wallet.address == address))
        .ok_or(QueueError::UnknownWallet { role, address })
}

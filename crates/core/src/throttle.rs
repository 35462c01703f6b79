//! Per-key notification cooldowns.
//!
//! A key admitted at time `t` is blocked until `t + cooldown`. The check and
//! the update happen under the same map-shard lock, so two racing callers
//! for one key can never both be admitted inside a window.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Last-notified timestamps keyed by recipient.
#[derive(Debug, Default)]
pub struct NotificationThrottle {
    last_sent: DashMap<String, Instant>,
}

impl NotificationThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `key` if it has not been admitted within `cooldown`.
    ///
    /// On admission the current time is recorded and `true` is returned;
    /// the caller must then send the notification.
    pub fn try_notify(&self, key: &str, cooldown: Duration) -> bool {
        self.try_notify_at(key, cooldown, Instant::now())
    }

    /// [`try_notify`](Self::try_notify) against an explicit clock reading.
    pub fn try_notify_at(&self, key: &str, cooldown: Duration, now: Instant) -> bool {
        match self.last_sent.entry(key.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
            Entry::Occupied(mut entry) => {
                let last = *entry.get();
                if now.saturating_duration_since(last) >= cooldown {
                    // never move a key backwards in time
                    entry.insert(now.max(last));
                    true
                } else {
                    debug!(key = key, remaining_secs = (cooldown - now.saturating_duration_since(last)).as_secs(), "Notification throttled");
                    false
                }
            }
        }
    }

    /// When `key` was last admitted.
    pub fn last_sent(&self, key: &str) -> Option<Instant> {
        self.last_sent.get(key).map(|at| *at)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.last_sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_sent.is_empty()
    }

    /// Drop keys whose last admission is older than `max_cooldown`.
    ///
    /// `max_cooldown` must be at least the longest cooldown any caller uses,
    /// otherwise a pruned key could be admitted early.
    pub fn prune_expired(&self, max_cooldown: Duration) -> usize {
        self.prune_expired_at(max_cooldown, Instant::now())
    }

    pub fn prune_expired_at(&self, max_cooldown: Duration, now: Instant) -> usize {
        let before = self.last_sent.len();
        self.last_sent
            .retain(|_, at| now.saturating_duration_since(*at) < max_cooldown);
        before.saturating_sub(self.last_sent.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const COOLDOWN: Duration = Duration::from_secs(3 * 60 * 60);

    #[test]
    fn test_admits_once_per_window() {
        let throttle = NotificationThrottle::new();
        let t0 = Instant::now();

        assert!(throttle.try_notify_at("0xabc", COOLDOWN, t0));
        for minutes in [0u64, 1, 60, 179] {
            let at = t0 + Duration::from_secs(minutes * 60);
            assert!(!throttle.try_notify_at("0xabc", COOLDOWN, at));
        }
        assert_eq!(throttle.last_sent("0xabc"), Some(t0));

        // boundary is inclusive: now >= last + cooldown
        assert!(throttle.try_notify_at("0xabc", COOLDOWN, t0 + COOLDOWN));
        assert!(!throttle.try_notify_at("0xabc", COOLDOWN, t0 + COOLDOWN + Duration::from_secs(1)));
    }

    #[test]
    fn test_keys_are_independent() {
        let throttle = NotificationThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.try_notify_at("a", COOLDOWN, t0));
        assert!(throttle.try_notify_at("b", COOLDOWN, t0));
        assert!(!throttle.try_notify_at("a", COOLDOWN, t0));
        assert_eq!(throttle.len(), 2);
    }

    #[test]
    fn test_zero_cooldown_always_admits() {
        let throttle = NotificationThrottle::new();
        assert!(throttle.try_notify("k", Duration::ZERO));
        assert!(throttle.try_notify("k", Duration::ZERO));
    }

    #[test]
    fn test_stale_reading_does_not_rewind() {
        let throttle = NotificationThrottle::new();
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(10);
        assert!(throttle.try_notify_at("k", Duration::ZERO, later));
        assert!(throttle.try_notify_at("k", Duration::ZERO, t0));
        assert_eq!(throttle.last_sent("k"), Some(later));
    }

    #[test]
    fn test_concurrent_same_key_admits_once() {
        let throttle = Arc::new(NotificationThrottle::new());
        let admitted = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for _ in 0..16 {
                let throttle = Arc::clone(&throttle);
                let admitted = Arc::clone(&admitted);
                scope.spawn(move || {
                    for _ in 0..100 {
                        if throttle.try_notify("0xuser", COOLDOWN) {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prune_expired() {
        let throttle = NotificationThrottle::new();
        let t0 = Instant::now();
        throttle.try_notify_at("old", COOLDOWN, t0);
        throttle.try_notify_at("new", COOLDOWN, t0 + COOLDOWN);

        let removed = throttle.prune_expired_at(COOLDOWN, t0 + COOLDOWN + Duration::from_secs(1));
        assert_eq!(removed, 1);
        assert!(throttle.last_sent("old").is_none());
        assert!(throttle.last_sent("new").is_some());
    }
}

//! Ephemeral per-user display state for the current weight split.
//!
//! Every judgment change takes a sequence token from [`WeightDisplay::begin`]
//! before resolving. A resolved vector is applied only if its token is newer
//! than the last one applied, so a slow response for an old slider position
//! can never overwrite a newer result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::weights::WeightVector;

/// Opaque, monotonically increasing request token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct WeightDisplay {
    issued: AtomicU64,
    inner: Mutex<Shown>,
}

#[derive(Debug)]
struct Shown {
    applied: u64,
    weights: WeightVector,
}

impl Default for WeightDisplay {
    fn default() -> Self {
        Self::new(WeightVector::EQUAL_SPLIT)
    }
}

impl WeightDisplay {
    pub fn new(initial: WeightVector) -> Self {
        Self {
            issued: AtomicU64::new(0),
            inner: Mutex::new(Shown {
                applied: 0,
                weights: initial,
            }),
        }
    }

    /// Reserve a token for a new resolve.
    pub fn begin(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Apply `weights` if `ticket` is newer than what is shown. Returns whether it was applied.
    pub fn apply(&self, ticket: Ticket, weights: WeightVector) -> bool {
        let mut shown = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if ticket.0 <= shown.applied {
            debug!(ticket = ticket.0, applied = shown.applied, "dropping stale weights");
            metrics::counter!("econutri_stale_responses_dropped_total").increment(1);
            return false;
        }
        shown.applied = ticket.0;
        shown.weights = weights;
        true
    }

    /// Retire `ticket` without changing what is shown, so no older response
    /// can land after it. Returns whether the ticket was the newest seen.
    pub fn keep(&self, ticket: Ticket) -> bool {
        let mut shown = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if ticket.0 <= shown.applied {
            return false;
        }
        shown.applied = ticket.0;
        true
    }

    pub fn current(&self) -> WeightVector {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).weights
    }

    /// True when no resolve newer than the shown one is outstanding.
    pub fn is_settled(&self) -> bool {
        let applied = self.inner.lock().unwrap_or_else(|p| p.into_inner()).applied;
        applied == self.issued.load(Ordering::SeqCst)
    }
}

/// One [`WeightDisplay`] per user, created on first use.
#[derive(Debug, Default)]
pub struct DisplayRegistry {
    displays: Mutex<HashMap<u64, Arc<WeightDisplay>>>,
}

impl DisplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing display for `user_id`, or a new one seeded with `initial`.
    pub fn get_or_insert(&self, user_id: u64, initial: WeightVector) -> Arc<WeightDisplay> {
        let mut map = self.displays.lock().unwrap_or_else(|p| p.into_inner());
        map.entry(user_id)
            .or_insert_with(|| Arc::new(WeightDisplay::new(initial)))
            .clone()
    }

    pub fn get(&self, user_id: u64) -> Option<Arc<WeightDisplay>> {
        self.displays
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&user_id)
            .cloned()
    }

    pub fn remove(&self, user_id: u64) -> Option<Arc<WeightDisplay>> {
        self.displays
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judgment::PairwiseJudgment;
    use crate::weights::derive_weights;

    fn w(a: i64, b: i64, c: i64) -> WeightVector {
        derive_weights(&PairwiseJudgment::clamped(a, b, c))
    }

    #[test]
    fn in_order_responses_apply() {
        let d = WeightDisplay::default();
        let t1 = d.begin();
        assert!(d.apply(t1, w(1, 0, 0)));
        let t2 = d.begin();
        assert!(d.apply(t2, w(2, 0, 0)));
        assert_eq!(d.current(), w(2, 0, 0));
        assert!(d.is_settled());
    }

    #[test]
    fn late_response_for_old_judgment_is_dropped() {
        let d = WeightDisplay::default();
        let old = d.begin();
        let new = d.begin();
        assert!(d.apply(new, w(5, 0, 0)));
        assert!(!d.apply(old, w(-5, 0, 0)));
        assert_eq!(d.current(), w(5, 0, 0));
    }

    #[test]
    fn earlier_response_shows_until_newer_arrives() {
        let d = WeightDisplay::default();
        let t1 = d.begin();
        let t2 = d.begin();
        assert!(d.apply(t1, w(1, 1, 0)));
        assert!(!d.is_settled());
        assert!(d.apply(t2, w(7, 7, 0)));
        assert!(d.is_settled());
        assert_eq!(d.current(), w(7, 7, 0));
    }

    #[test]
    fn keep_holds_weights_and_blocks_older_responses() {
        let d = WeightDisplay::new(w(7, 7, 0));
        let old = d.begin();
        let failed = d.begin();
        assert!(d.keep(failed));
        assert_eq!(d.current(), w(7, 7, 0));
        assert!(!d.apply(old, w(-7, 0, 0)));
        assert_eq!(d.current(), w(7, 7, 0));
        assert!(d.is_settled());
    }

    #[test]
    fn concurrent_apply_keeps_the_newest() {
        let d = Arc::new(WeightDisplay::default());
        let tickets: Vec<Ticket> = (0..64).map(|_| d.begin()).collect();
        let last = *tickets.last().unwrap();

        let handles: Vec<_> = tickets
            .into_iter()
            .rev()
            .map(|t| {
                let d = Arc::clone(&d);
                std::thread::spawn(move || {
                    let weights = if t == last {
                        w(0, 0, 7)
                    } else {
                        w(0, 0, -7)
                    };
                    d.apply(t, weights);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(d.current(), w(0, 0, 7));
        assert!(d.is_settled());
    }

    #[test]
    fn registry_reuses_per_user_display() {
        let reg = DisplayRegistry::new();
        let a = reg.get_or_insert(1, WeightVector::EQUAL_SPLIT);
        let t = a.begin();
        a.apply(t, w(3, 0, 0));
        let again = reg.get_or_insert(1, w(-7, -7, -7));
        assert_eq!(again.current(), w(3, 0, 0));
        assert!(reg.get(2).is_none());
    }

    #[test]
    fn registry_remove_forgets_the_user() {
        let reg = DisplayRegistry::new();
        reg.get_or_insert(1, w(3, 0, 0));
        reg.get_or_insert(2, w(0, 3, 0));
        assert!(reg.remove(1).is_some());
        assert!(reg.remove(1).is_none());
        assert!(reg.get(1).is_none());
        assert!(reg.get(2).is_some());
        let fresh = reg.get_or_insert(1, WeightVector::EQUAL_SPLIT);
        assert_eq!(fresh.current(), WeightVector::EQUAL_SPLIT);
    }
}

//! Startup hold counter.
//!
//! Capability watchers that push work mid-startup raise a hold to pause
//! start-level advancement, and release it when done. The count lives in a
//! `watch` channel so waiters never miss a release that lands between a check
//! and the wait.

use std::sync::Arc;

use tokio::sync::watch;

/// Counts outstanding reasons to pause start-level advancement.
///
/// Cloned handles share one counter. Raising returns a guard; dropping the
/// guard releases the hold.
#[derive(Clone)]
pub struct StartupHold {
    count: Arc<watch::Sender<usize>>,
}

impl StartupHold {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            count: Arc::new(tx),
        }
    }

    /// Raises the hold until the returned guard is dropped.
    pub fn acquire(&self) -> HoldGuard {
        self.count.send_modify(|count| *count += 1);
        HoldGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn is_clear(&self) -> bool {
        *self.count.borrow() == 0
    }

    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolves once no holds are outstanding. Resolves immediately when the
    /// count is already zero.
    pub async fn cleared(&self) {
        let mut rx = self.count.subscribe();
        loop {
            if *rx.borrow_and_update() == 0 {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for StartupHold {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases one hold on drop.
pub struct HoldGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for HoldGuard {
    fn drop(&mut self) {
        self.count
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

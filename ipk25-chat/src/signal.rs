//! Cross-task coordination primitives.
//!
//! - [`Signal`] — resettable binary flag.  `set` is idempotent, `wait` returns
//!   once the flag is set (immediately if it already is), `reset` clears it.
//!   Any number of tasks may wait at once.
//! - [`Confirmations`] — per-id CONFIRM bookkeeping for the UDP sender.  A
//!   waiter is released only by the CONFIRM for its own id.

use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::{watch, Notify};

#[derive(Debug)]
pub struct Signal {
    flag: watch::Sender<bool>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self { flag }
    }

    pub fn set(&self) {
        self.flag.send_replace(true);
    }

    pub fn reset(&self) {
        self.flag.send_replace(false);
    }

    pub fn is_set(&self) -> bool {
        *self.flag.borrow()
    }

    /// Suspend until the flag is set.
    pub async fn wait(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|set| *set).await;
    }
}

#[derive(Debug, Default)]
pub struct Confirmations {
    acked: Mutex<HashSet<u16>>,
    notify: Notify,
}

impl Confirmations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a CONFIRM for `id` and wake every waiter.
    pub fn acknowledge(&self, id: u16) {
        self.lock().insert(id);
        self.notify.notify_waiters();
    }

    /// Forget a stale CONFIRM for `id` before the id is put on the wire.
    pub fn clear(&self, id: u16) {
        self.lock().remove(&id);
    }

    /// Suspend until `id` has been confirmed, consuming the confirmation.
    pub async fn wait_for(&self, id: u16) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so an acknowledge() in between is not lost.
            notified.as_mut().enable();
            if self.lock().remove(&id) {
                return;
            }
            notified.await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<u16>> {
        // Plain ids: a poisoned lock holds nothing half-updated.
        self.acked.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn wait_returns_immediately_when_set() {
        let signal = Signal::new();
        signal.set();
        signal.set();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("already-set signal must not block");
    }

    #[tokio::test]
    async fn reset_blocks_until_next_set() {
        let signal = Arc::new(Signal::new());
        signal.set();
        signal.reset();
        assert!(!signal.is_set());
        assert!(tokio::time::timeout(Duration::from_millis(50), signal.wait())
            .await
            .is_err());

        let setter = Arc::clone(&signal);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            setter.set();
        });
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("set from another task must wake the waiter");
    }

    #[tokio::test]
    async fn multiple_waiters_are_released_together() {
        let signal = Arc::new(Signal::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let s = Arc::clone(&signal);
                tokio::spawn(async move { s.wait().await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.set();
        for w in waiters {
            tokio::time::timeout(Duration::from_secs(1), w)
                .await
                .expect("waiter released")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn confirmation_for_other_id_does_not_release() {
        let confirmations = Arc::new(Confirmations::new());
        let c = Arc::clone(&confirmations);
        let waiter = tokio::spawn(async move { c.wait_for(5).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        confirmations.acknowledge(4);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        confirmations.acknowledge(5);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("matching confirm releases the waiter")
            .unwrap();
    }

    #[tokio::test]
    async fn confirmation_before_wait_is_not_lost() {
        let confirmations = Confirmations::new();
        confirmations.acknowledge(9);
        tokio::time::timeout(Duration::from_millis(100), confirmations.wait_for(9))
            .await
            .expect("early confirm is remembered");
    }

    #[tokio::test]
    async fn cleared_confirmation_does_not_release() {
        let confirmations = Confirmations::new();
        confirmations.acknowledge(2);
        confirmations.clear(2);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), confirmations.wait_for(2))
                .await
                .is_err()
        );
    }
}

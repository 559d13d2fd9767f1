//! Wake primitive bridging signal delivery and the blocking scheduler loop.
//!
//! A `set()` that arrives while nobody is waiting stays pending until the
//! waiter calls `reset()`, so a signal landing between the flag check and
//! the next `wait_with_timeout` is never lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Why `wait_with_timeout` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// `set()` was called since the last `reset()`.
    Woken,
    /// The timeout elapsed with no wake pending.
    TimedOut,
    /// The host process disappeared.
    HostGone,
}

#[derive(Debug, Default)]
pub struct Latch {
    pending: AtomicBool,
    notify: Notify,
    host_gone: CancellationToken,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a wake as pending and wake the waiter, if any. Idempotent.
    ///
    /// Only touches an atomic flag and the notifier; no locks are held by the
    /// caller, so this is safe to call from signal-delivery tasks.
    pub fn set(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    /// Clear the pending wake. The waiter must call this right after waking
    /// and before it inspects any signal flags.
    pub fn reset(&self) {
        self.pending.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Fire the host-death condition. Every current and future wait returns
    /// [`WakeReason::HostGone`].
    pub fn host_gone(&self) {
        self.host_gone.cancel();
    }

    /// Token cancelled when the host disappears; handed to the host watcher.
    pub fn host_gone_token(&self) -> CancellationToken {
        self.host_gone.clone()
    }

    /// Block until a wake is pending, `timeout` elapses, or the host dies.
    ///
    /// Host death takes priority over a pending wake.
    pub async fn wait_with_timeout(&self, timeout: Duration) -> WakeReason {
        // None: too far out to represent, wait without a deadline
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.host_gone.is_cancelled() {
                return WakeReason::HostGone;
            }

            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent set() either
            // is seen here or wakes the registered future.
            notified.as_mut().enable();
            if self.is_set() {
                return WakeReason::Woken;
            }

            tokio::select! {
                biased;
                _ = self.host_gone.cancelled() => return WakeReason::HostGone,
                _ = &mut notified => {
                    if self.is_set() {
                        return WakeReason::Woken;
                    }
                    // stale permit from a wake that was already consumed
                }
                _ = deadline_elapsed(deadline) => return WakeReason::TimedOut,
            }
        }
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn times_out_without_set() {
        let latch = Latch::new();
        let start = Instant::now();
        let reason = latch.wait_with_timeout(Duration::from_secs(5)).await;
        assert_eq!(reason, WakeReason::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_set_returns_immediately() {
        let latch = Latch::new();
        latch.set();
        let start = Instant::now();
        let reason = latch.wait_with_timeout(Duration::from_secs(60)).await;
        assert_eq!(reason, WakeReason::Woken);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn set_while_waiting_wakes_before_timeout() {
        let latch = Arc::new(Latch::new());
        let setter = Arc::clone(&latch);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            setter.set();
        });

        let start = Instant::now();
        let reason = latch.wait_with_timeout(Duration::from_secs(60)).await;
        assert_eq!(reason, WakeReason::Woken);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn set_between_reset_and_wait_is_not_lost() {
        let latch = Latch::new();
        assert_eq!(
            latch.wait_with_timeout(Duration::from_secs(1)).await,
            WakeReason::TimedOut
        );
        latch.reset();
        latch.set();

        let start = Instant::now();
        let reason = latch.wait_with_timeout(Duration::from_secs(60)).await;
        assert_eq!(reason, WakeReason::Woken);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_consumed_wake() {
        let latch = Latch::new();
        latch.set();
        latch.set();
        assert_eq!(
            latch.wait_with_timeout(Duration::from_secs(60)).await,
            WakeReason::Woken
        );
        latch.reset();

        let start = Instant::now();
        let reason = latch.wait_with_timeout(Duration::from_secs(3)).await;
        assert_eq!(reason, WakeReason::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_still_wakes() {
        let latch = Arc::new(Latch::new());
        latch.set();
        assert_eq!(
            latch.wait_with_timeout(Duration::MAX).await,
            WakeReason::Woken
        );
        latch.reset();

        let setter = Arc::clone(&latch);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            setter.set();
        });
        let reason = latch
            .wait_with_timeout(Duration::from_secs(i64::MAX as u64))
            .await;
        assert_eq!(reason, WakeReason::Woken);
    }

    #[tokio::test(start_paused = true)]
    async fn host_gone_wins_over_pending_wake() {
        let latch = Latch::new();
        latch.set();
        latch.host_gone();
        assert_eq!(
            latch.wait_with_timeout(Duration::from_secs(60)).await,
            WakeReason::HostGone
        );
    }

    #[tokio::test(start_paused = true)]
    async fn host_gone_interrupts_wait() {
        let latch = Arc::new(Latch::new());
        let token = latch.host_gone_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });
        assert_eq!(
            latch.wait_with_timeout(Duration::from_secs(60)).await,
            WakeReason::HostGone
        );
    }
}

//! Reload/terminate request flags and the OS signal listener that sets them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::latch::Latch;

/// Flags written by signal delivery and consumed only by the scheduler loop.
#[derive(Debug, Default)]
pub struct SignalState {
    reload: AtomicBool,
    terminate: AtomicBool,
}

impl SignalState {
    pub fn reload_requested(&self) -> bool {
        self.reload.load(Ordering::Acquire)
    }

    /// Consume a pending reload request.
    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::AcqRel)
    }

    /// Once true this never goes back to false.
    pub fn terminate_requested(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }
}

/// Handle shared between the loop and whatever delivers requests to it.
///
/// Every request sets its flag first and then the latch, so a woken loop
/// always finds the flag that caused the wake.
#[derive(Debug, Clone, Default)]
pub struct Control {
    latch: Arc<Latch>,
    flags: Arc<SignalState>,
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_reload(&self) {
        self.flags.reload.store(true, Ordering::Release);
        self.latch.set();
    }

    pub fn request_terminate(&self) {
        self.flags.terminate.store(true, Ordering::Release);
        self.latch.set();
    }

    pub fn latch(&self) -> &Latch {
        &self.latch
    }

    pub fn flags(&self) -> &SignalState {
        &self.flags
    }
}

/// Route SIGHUP to reload and SIGTERM/SIGINT to terminate.
///
/// Handlers are installed before this returns, so signals sent afterwards are
/// never delivered with the default disposition.
#[cfg(unix)]
pub fn spawn_signal_listener(control: Control) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    info!("SIGHUP received - configuration reload requested");
                    control.request_reload();
                }
                _ = sigint.recv() => {
                    warn!("SIGINT received");
                    control.request_terminate();
                    break;
                }
                _ = sigterm.recv() => {
                    warn!("SIGTERM received");
                    control.request_terminate();
                    break;
                }
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_signal_listener(control: Control) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Ctrl+C received");
                control.request_terminate();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl+C"),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_request_sets_flag_and_latch() {
        let control = Control::new();
        control.request_reload();
        assert!(control.flags().reload_requested());
        assert!(control.latch().is_set());

        assert!(control.flags().take_reload());
        assert!(!control.flags().take_reload());
    }

    #[test]
    fn terminate_is_one_way() {
        let control = Control::new();
        control.request_terminate();
        control.latch().reset();
        control.request_reload();
        assert!(control.flags().take_reload());
        assert!(control.flags().terminate_requested());
    }

    #[test]
    fn clones_share_state() {
        let control = Control::new();
        let remote = control.clone();
        remote.request_terminate();
        assert!(control.flags().terminate_requested());
        assert!(control.latch().is_set());
    }

    #[cfg(unix)]
    fn send(signal: &str) {
        let status = std::process::Command::new("kill")
            .args([signal, &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());
    }

    // SIGHUP and SIGTERM share one test: every listener in the process sees
    // every signal, so separate tests would observe each other's.
    #[cfg(unix)]
    #[tokio::test]
    async fn real_signals_map_to_requests() {
        use std::time::Duration;

        use crate::latch::WakeReason;

        let control = Control::new();
        let listener = spawn_signal_listener(control.clone()).unwrap();

        send("-HUP");
        let reason = control.latch().wait_with_timeout(Duration::from_secs(5)).await;
        assert_eq!(reason, WakeReason::Woken);
        control.latch().reset();
        assert!(control.flags().take_reload());
        assert!(!control.flags().terminate_requested());

        send("-TERM");
        let reason = control.latch().wait_with_timeout(Duration::from_secs(5)).await;
        assert_eq!(reason, WakeReason::Woken);
        assert!(control.flags().terminate_requested());
        assert!(!control.flags().take_reload());

        // the listener stops after a terminate request
        tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .unwrap()
            .unwrap();
    }
}

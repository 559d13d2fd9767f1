//! Host-death detection.
//!
//! The host is the process that started the worker. When it goes away the
//! worker is re-parented, which is what this watcher looks for.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

pub const HOST_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Something that can say whether the host is still around.
pub trait HostProbe: Send + 'static {
    fn alive(&mut self) -> bool;
}

/// Alive while our parent pid still equals the pid seen at startup.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct ParentProbe {
    expected: u32,
}

#[cfg(unix)]
impl ParentProbe {
    /// Watch the current parent process.
    pub fn current() -> Self {
        Self {
            expected: std::os::unix::process::parent_id(),
        }
    }

    pub fn expecting(pid: u32) -> Self {
        Self { expected: pid }
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }
}

#[cfg(unix)]
impl HostProbe for ParentProbe {
    fn alive(&mut self) -> bool {
        std::os::unix::process::parent_id() == self.expected
    }
}

/// Poll `probe` every `interval` and cancel `host_gone` the first time it
/// reports the host dead. Stops on its own after firing.
pub fn spawn_host_watch<P: HostProbe>(
    mut probe: P,
    interval: Duration,
    host_gone: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !probe.alive() {
                        error!("host process is gone");
                        host_gone.cancel();
                        break;
                    }
                }
                _ = host_gone.cancelled() => break,
            }
        }
    })
}

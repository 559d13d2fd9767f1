use std::fmt;

use serde::Serialize;

/// Process exit status for a graceful terminate request.
pub const EXIT_TERMINATED: u8 = 0;
/// Process exit status for host death and fatal store errors; the host's
/// restart policy takes over from here.
pub const EXIT_FAILURE: u8 = 1;

/// Why the scheduler loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// A terminate request was observed before starting a cycle.
    Terminated,
    /// The host process disappeared; nothing further may touch the store.
    HostGone,
}

impl Shutdown {
    pub fn exit_code(self) -> u8 {
        match self {
            Shutdown::Terminated => EXIT_TERMINATED,
            Shutdown::HostGone => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shutdown::Terminated => write!(f, "terminated"),
            Shutdown::HostGone => write!(f, "host gone"),
        }
    }
}

/// Result of one committed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The unit existed and was invoked once.
    Invoked,
    /// No matching unit; nothing was invoked. Not an error.
    NotFound,
}

/// Counters accumulated across cycles, logged at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub cycles: u64,
    pub invocations: u64,
    pub not_found: u64,
    pub reloads: u64,
    pub reload_failures: u64,
}

impl CycleStats {
    pub(crate) fn record(&mut self, outcome: CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Invoked => self.invocations += 1,
            CycleOutcome::NotFound => self.not_found += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(Shutdown::Terminated.exit_code(), 0);
        assert_eq!(Shutdown::HostGone.exit_code(), 1);
    }

    #[test]
    fn stats_count_outcomes() {
        let mut stats = CycleStats::default();
        stats.record(CycleOutcome::NotFound);
        stats.record(CycleOutcome::NotFound);
        stats.record(CycleOutcome::Invoked);
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.invocations, 1);
        assert_eq!(stats.not_found, 2);
    }
}

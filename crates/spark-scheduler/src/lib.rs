//! `spark-scheduler`: fires a named unit from a SQLite catalog on a fixed naptime.
//!
//! # Overview
//!
//! The [`engine::SparkEngine`] sleeps on a [`latch::Latch`] for `naptime`
//! seconds, then runs one cycle: open a transaction, look the configured unit
//! up in the `spark_units` catalog, invoke it if present, commit.
//!
//! # Requests
//!
//! | Source      | Effect                                                  |
//! |-------------|---------------------------------------------------------|
//! | `SIGHUP`    | Reload configuration before the next cycle              |
//! | `SIGTERM`   | Finish the current cycle, then stop (exit 0)            |
//! | `SIGINT`    | Same as `SIGTERM`                                       |
//! | host death  | Stop immediately without touching the store (exit 1)    |
//!
//! A store failure inside a cycle rolls the transaction back and stops the
//! loop; retrying is left to whoever restarts the process.

pub mod db;
pub mod engine;
pub mod error;
pub mod host;
pub mod latch;
pub mod signals;
pub mod status;
pub mod store;
pub mod types;

pub use db::SqliteStore;
pub use engine::SparkEngine;
pub use error::{Result, SchedulerError};
pub use latch::{Latch, WakeReason};
pub use signals::{Control, SignalState};
pub use status::{FileStatus, StatusFanout, StatusSink, TracingStatus, WatchStatus};
pub use store::{UnitStore, UnitTxn};
pub use types::{CycleOutcome, CycleStats, Shutdown};

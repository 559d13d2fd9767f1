//! `spark-core`: configuration, shared types and errors for the spark worker.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigSource, FileConfigSource, SparkConfig};
pub use error::{Result, SparkError};
pub use types::{Activity, ActivityReport, UnitDescriptor};

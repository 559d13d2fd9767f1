use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the callable unit the worker fires each cycle.
///
/// Immutable for the life of a configuration snapshot; only a reload
/// produces a different descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub namespace: String,
    pub name: String,
}

impl UnitDescriptor {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for UnitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Coarse activity state published for external monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// A cycle transaction is open.
    Running,
    /// Waiting on the latch between cycles.
    Idle,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

/// Latest activity snapshot with an optional free-text detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub activity: Activity,
    pub detail: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityReport {
    pub fn now(activity: Activity, detail: Option<&str>) -> Self {
        Self {
            activity,
            detail: detail.map(str::to_string),
            updated_at: Utc::now(),
        }
    }
}

impl Default for ActivityReport {
    fn default() -> Self {
        Self::now(Activity::Idle, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_displays_qualified_name() {
        let unit = UnitDescriptor::new("ops", "heartbeat");
        assert_eq!(unit.to_string(), "ops.heartbeat");
    }

    #[test]
    fn activity_serializes_snake_case() {
        let json = serde_json::to_string(&Activity::Running).unwrap();
        assert_eq!(json, r#""running""#);
    }
}

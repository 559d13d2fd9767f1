//! Unit lookup and invocation against the external store.
//!
//! The loop owns transaction boundaries: it begins a transaction, asks the
//! transaction whether the unit exists, invokes it, and commits. Dropping a
//! transaction without committing rolls it back.

use spark_core::UnitDescriptor;

use crate::error::Result;

pub trait UnitStore: Send {
    type Txn<'a>: UnitTxn
    where
        Self: 'a;

    /// Open a transaction against `target`, connecting (or reconnecting when
    /// the target changed) first.
    fn begin(&mut self, target: &str) -> Result<Self::Txn<'_>>;
}

/// Operations available inside one cycle's transaction.
pub trait UnitTxn {
    /// True when a unit with exactly this namespace and name exists.
    fn exists(&self, unit: &UnitDescriptor) -> Result<bool>;

    /// Run the unit with no arguments. Any result is discarded.
    fn invoke(&self, unit: &UnitDescriptor) -> Result<()>;

    fn commit(self) -> Result<()>;
}

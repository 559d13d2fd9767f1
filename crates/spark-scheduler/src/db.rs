use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, Transaction};
use spark_core::UnitDescriptor;
use tracing::{debug, info};

use crate::{
    error::{Result, SchedulerError},
    store::{UnitStore, UnitTxn},
};

/// How long a cycle waits on a locked database before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialise the unit catalog in `conn`.
///
/// Creates the `spark_units` table (idempotent). Names compare with the
/// default BINARY collation, so lookups are exact and case-sensitive.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS spark_units (
            namespace   TEXT    NOT NULL,
            name        TEXT    NOT NULL,
            body        TEXT    NOT NULL,   -- SQL batch run on invoke
            created_at  TEXT    NOT NULL,
            PRIMARY KEY (namespace, name)
        ) STRICT;
        ",
    )?;
    Ok(())
}

/// Open an existing database read-write and make sure the catalog exists.
///
/// The file is never created: a missing database is a store failure.
pub fn open_store(target: &str) -> Result<Connection> {
    let conn = connect(target, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    init_db(&conn)?;
    Ok(conn)
}

/// Look a unit up without writing to the database.
///
/// Opens `target` read-only and never bootstraps the catalog: a database
/// without `spark_units` simply has no units.
pub fn unit_defined(target: &str, unit: &UnitDescriptor) -> Result<bool> {
    let conn = connect(target, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let has_catalog = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'spark_units'")?
        .exists([])?;
    if !has_catalog {
        return Ok(false);
    }
    let found = conn
        .prepare(UNIT_EXISTS)?
        .exists(params![unit.namespace, unit.name])?;
    Ok(found)
}

const UNIT_EXISTS: &str = "SELECT 1 FROM spark_units WHERE namespace = ?1 AND name = ?2 LIMIT 1";

fn connect(target: &str, mode: OpenFlags) -> Result<Connection> {
    let flags = mode | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(target, flags).map_err(|e| {
        SchedulerError::StoreUnavailable {
            target: target.to_string(),
            reason: e.to_string(),
        }
    })?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

/// Create or replace a unit definition.
pub fn define_unit(conn: &Connection, unit: &UnitDescriptor, body: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO spark_units (namespace, name, body, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (namespace, name) DO UPDATE SET body = excluded.body",
        params![unit.namespace, unit.name, body, Utc::now().to_rfc3339()],
    )?;
    info!(%unit, "unit defined");
    Ok(())
}

/// Remove a unit definition. Returns false when nothing matched.
pub fn drop_unit(conn: &Connection, unit: &UnitDescriptor) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM spark_units WHERE namespace = ?1 AND name = ?2",
        params![unit.namespace, unit.name],
    )?;
    if n > 0 {
        info!(%unit, "unit dropped");
    }
    Ok(n > 0)
}

/// SQLite-backed store. Holds one connection, reopened when the configured
/// target changes.
#[derive(Default)]
pub struct SqliteStore {
    conn: Option<(String, Connection)>,
}

impl SqliteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the currently open database, if any.
    pub fn target(&self) -> Option<&str> {
        self.conn.as_ref().map(|(target, _)| target.as_str())
    }

    fn connection(&mut self, target: &str) -> Result<&mut Connection> {
        let entry = match self.conn.take() {
            Some((current, conn)) if current == target => (current, conn),
            previous => {
                if let Some((old, _)) = previous {
                    info!(from = %old, to = %target, "store target changed, reconnecting");
                }
                debug!(%target, "opening store");
                (target.to_string(), open_store(target)?)
            }
        };
        let (_, conn) = self.conn.insert(entry);
        Ok(conn)
    }
}

impl UnitStore for SqliteStore {
    type Txn<'a> = SqliteTxn<'a>;

    fn begin(&mut self, target: &str) -> Result<SqliteTxn<'_>> {
        let conn = self.connection(target)?;
        Ok(SqliteTxn {
            tx: conn.transaction()?,
        })
    }
}

pub struct SqliteTxn<'conn> {
    tx: Transaction<'conn>,
}

impl UnitTxn for SqliteTxn<'_> {
    fn exists(&self, unit: &UnitDescriptor) -> Result<bool> {
        let mut stmt = self.tx.prepare_cached(UNIT_EXISTS)?;
        Ok(stmt.exists(params![unit.namespace, unit.name])?)
    }

    fn invoke(&self, unit: &UnitDescriptor) -> Result<()> {
        let body: String = self.tx.query_row(
            "SELECT body FROM spark_units WHERE namespace = ?1 AND name = ?2",
            params![unit.namespace, unit.name],
            |row| row.get(0),
        )?;
        self.tx.execute_batch(&body)?;
        Ok(())
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

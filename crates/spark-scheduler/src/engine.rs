use std::sync::Arc;

use spark_core::{Activity, ConfigSource, SparkConfig, UnitDescriptor};
use tracing::{debug, error, info, warn};

use crate::{
    error::Result,
    latch::WakeReason,
    signals::Control,
    status::{StatusSink, TracingStatus},
    store::{UnitStore, UnitTxn},
    types::{CycleOutcome, CycleStats, Shutdown},
};

/// The spark loop: sleep, apply requests, run one transactional cycle, repeat.
///
/// Each cycle opens a transaction on the configured database, checks whether
/// the configured unit exists and, if so, invokes it once before committing.
/// Configuration is an immutable snapshot swapped only between cycles.
pub struct SparkEngine<S: UnitStore> {
    store: S,
    config: Arc<SparkConfig>,
    source: Box<dyn ConfigSource>,
    control: Control,
    status: Arc<dyn StatusSink>,
    stats: CycleStats,
}

impl<S: UnitStore> SparkEngine<S> {
    /// Create an engine with the initial configuration read from `source`.
    ///
    /// An invalid initial configuration is an error; there is no previous
    /// snapshot to fall back on.
    pub fn new(store: S, source: impl ConfigSource + 'static, control: Control) -> Result<Self> {
        let config = source.load()?;
        config.validate()?;
        Ok(Self {
            store,
            config: Arc::new(config),
            source: Box::new(source),
            control,
            status: Arc::new(TracingStatus),
            stats: CycleStats::default(),
        })
    }

    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn config(&self) -> Arc<SparkConfig> {
        Arc::clone(&self.config)
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    /// Main loop. Returns how it stopped, or the fatal error that stopped it.
    ///
    /// A fatal error has already rolled back its cycle; the caller must exit
    /// rather than run the loop again.
    pub async fn run(&mut self) -> Result<Shutdown> {
        info!(
            unit = %self.config.unit_descriptor(),
            database = %self.config.database,
            naptime = self.config.naptime,
            "spark engine started"
        );

        let result = self.run_loop().await;
        match &result {
            Ok(shutdown) => info!(
                %shutdown,
                cycles = self.stats.cycles,
                invocations = self.stats.invocations,
                not_found = self.stats.not_found,
                reloads = self.stats.reloads,
                "spark engine stopped"
            ),
            Err(e) => error!(
                code = e.code(),
                error = %e,
                cycles = self.stats.cycles,
                "spark engine aborted"
            ),
        }
        result
    }

    async fn run_loop(&mut self) -> Result<Shutdown> {
        loop {
            if self.control.flags().terminate_requested() {
                return Ok(Shutdown::Terminated);
            }

            let reason = self
                .control
                .latch()
                .wait_with_timeout(self.config.naptime())
                .await;
            self.control.latch().reset();

            if reason == WakeReason::HostGone {
                error!("host gone, exiting without touching the store");
                return Ok(Shutdown::HostGone);
            }

            // Terminate wins over a reload delivered alongside it: never start
            // a transaction, and never apply new settings right before exit.
            if self.control.flags().terminate_requested() {
                return Ok(Shutdown::Terminated);
            }

            if self.control.flags().take_reload() {
                self.reload();
            }

            self.run_cycle()?;
        }
    }

    /// Re-read configuration. Failure keeps the previous snapshot.
    fn reload(&mut self) {
        match self.source.load().and_then(|next| {
            next.validate()?;
            Ok(next)
        }) {
            Ok(next) => {
                self.stats.reloads += 1;
                if next == *self.config {
                    info!("configuration reloaded, no changes");
                } else {
                    info!(
                        unit = %next.unit_descriptor(),
                        database = %next.database,
                        naptime = next.naptime,
                        "configuration reloaded"
                    );
                }
                self.config = Arc::new(next);
            }
            Err(e) => {
                self.stats.reload_failures += 1;
                warn!(
                    code = e.code(),
                    error = %e,
                    "configuration reload failed, keeping previous settings"
                );
            }
        }
    }

    fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let config = Arc::clone(&self.config);
        let unit = config.unit_descriptor();
        let detail = unit.to_string();

        self.status.report(Activity::Running, Some(&detail));
        let outcome = match execute(&mut self.store, &config, &unit) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.status.report(Activity::Idle, Some(e.code()));
                return Err(e);
            }
        };
        self.stats.record(outcome);
        self.status.report(Activity::Idle, None);
        Ok(outcome)
    }
}

/// One transaction: look the unit up, invoke it if present, commit.
///
/// Any error drops the transaction, which rolls it back.
fn execute<S: UnitStore>(
    store: &mut S,
    config: &SparkConfig,
    unit: &UnitDescriptor,
) -> Result<CycleOutcome> {
    let txn = store.begin(&config.database)?;

    debug!(%unit, "looking for the unit");
    let outcome = if txn.exists(unit)? {
        debug!(%unit, "firing the unit");
        txn.invoke(unit)?;
        CycleOutcome::Invoked
    } else {
        debug!(%unit, database = %config.database, "unit not found");
        CycleOutcome::NotFound
    };

    txn.commit()?;
    Ok(outcome)
}

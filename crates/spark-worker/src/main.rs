use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use spark_core::{FileConfigSource, SparkConfig, UnitDescriptor};
use spark_scheduler::{
    db,
    signals::spawn_signal_listener,
    types::{EXIT_FAILURE, EXIT_TERMINATED},
    Control, FileStatus, Shutdown, SparkEngine, SqliteStore, StatusFanout, StatusSink,
    TracingStatus,
};
use tracing::{error, info, warn};

/// Exit status for bad configuration and other startup failures.
const EXIT_STARTUP: u8 = 2;

/// Periodically fire a named unit from a SQLite catalog.
#[derive(Parser)]
#[command(name = "spark-worker", version, about)]
struct Cli {
    /// Config file (default: ~/.spark/spark.toml).
    #[arg(long, env = "SPARK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Expected parent (host) pid. Defaults to the parent seen at startup.
    #[arg(long, global = true)]
    host_pid: Option<u32>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Run the spark loop in the foreground (default).
    Run,
    /// Validate configuration and report whether the unit exists. Invokes nothing.
    Check,
    /// Create or replace a unit in the catalog.
    Define {
        /// SQL batch executed each time the unit fires.
        body: String,
        #[command(flatten)]
        target: UnitArgs,
    },
    /// Remove a unit from the catalog.
    Drop {
        #[command(flatten)]
        target: UnitArgs,
    },
}

/// Overrides for the configured namespace/unit.
#[derive(clap::Args, Clone)]
struct UnitArgs {
    #[arg(long)]
    namespace: Option<String>,
    #[arg(long)]
    unit: Option<String>,
}

impl UnitArgs {
    fn resolve(&self, config: &SparkConfig) -> UnitDescriptor {
        UnitDescriptor::new(
            self.namespace.clone().unwrap_or_else(|| config.namespace.clone()),
            self.unit.clone().unwrap_or_else(|| config.unit.clone()),
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spark_worker=info,spark_scheduler=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command.clone().unwrap_or(Command::Run) {
        Command::Run => run(&cli).await,
        Command::Check => check(&cli),
        Command::Define { body, target } => define(&cli, &target, &body),
        Command::Drop { target } => drop_unit(&cli, &target),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(EXIT_STARTUP)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let control = Control::new();
    // install handlers first so a SIGTERM during startup is not lost
    let _signals = spawn_signal_listener(control.clone()).context("installing signal handlers")?;

    let source = FileConfigSource::new(cli.config.clone());
    let engine = SparkEngine::new(SqliteStore::new(), source, control.clone())
        .context("loading configuration")?;
    let config = engine.config();
    let mut engine = engine.with_status(build_status(&config));

    if config.watch_host {
        watch_host(cli.host_pid, &control);
    } else {
        info!("host watch disabled");
    }

    let outcome = engine.run().await;
    if let Ok(Shutdown::HostGone) = outcome {
        // no graceful teardown: the host that would coordinate it is gone
        std::process::exit(i32::from(Shutdown::HostGone.exit_code()));
    }
    let status = exit_status(&outcome);
    if outcome.is_err() {
        warn!(status, "exiting for restart");
    }
    Ok(ExitCode::from(status))
}

/// Process exit status for how the loop ended. Errors were logged by the engine.
fn exit_status(outcome: &spark_scheduler::Result<Shutdown>) -> u8 {
    match outcome {
        Ok(shutdown) => shutdown.exit_code(),
        Err(_) => EXIT_FAILURE,
    }
}

/// Tracing always; a JSON status file when configured. Read once at startup.
fn build_status(config: &SparkConfig) -> Arc<dyn StatusSink> {
    let mut fanout = StatusFanout::new().with(Arc::new(TracingStatus));
    if let Some(ref path) = config.status_file {
        info!(path = %path.display(), "writing status file");
        fanout = fanout.with(Arc::new(FileStatus::new(path)));
    }
    Arc::new(fanout)
}

#[cfg(unix)]
fn watch_host(host_pid: Option<u32>, control: &Control) {
    use spark_scheduler::host::{spawn_host_watch, ParentProbe, HOST_POLL_INTERVAL};

    let probe = host_pid
        .map(ParentProbe::expecting)
        .unwrap_or_else(ParentProbe::current);
    info!(host_pid = probe.expected(), "watching host process");
    spawn_host_watch(probe, HOST_POLL_INTERVAL, control.latch().host_gone_token());
}

#[cfg(not(unix))]
fn watch_host(_host_pid: Option<u32>, _control: &Control) {
    warn!("host watch is not supported on this platform");
}

fn check(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = SparkConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let unit = config.unit_descriptor();

    let found = db::unit_defined(&config.database, &unit)?;

    println!("database:  {}", config.database);
    println!("naptime:   {}s", config.naptime);
    if found {
        println!("unit:      {unit} (found)");
        Ok(ExitCode::from(EXIT_TERMINATED))
    } else {
        println!("unit:      {unit} (not found)");
        warn!(%unit, "unit not found; the worker will idle until it is defined");
        Ok(ExitCode::from(EXIT_FAILURE))
    }
}

fn define(cli: &Cli, target: &UnitArgs, body: &str) -> anyhow::Result<ExitCode> {
    let config = SparkConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let unit = target.resolve(&config);
    let conn = db::open_store(&config.database)?;
    db::define_unit(&conn, &unit, body)?;
    println!("defined {unit}");
    Ok(ExitCode::SUCCESS)
}

fn drop_unit(cli: &Cli, target: &UnitArgs) -> anyhow::Result<ExitCode> {
    let config = SparkConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let unit = target.resolve(&config);
    let conn = db::open_store(&config.database)?;
    if db::drop_unit(&conn, &unit)? {
        println!("dropped {unit}");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{unit} not found");
        Ok(ExitCode::from(EXIT_FAILURE))
    }
}

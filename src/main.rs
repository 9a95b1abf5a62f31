mod api;
mod clock_source;
mod error;
mod idle;
mod quart;
mod report;
mod store;
mod ui;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use crate::api::{ApiServer, ApiServerConfig, ApiSharedState, RuntimeSnapshot};
use crate::clock_source::select_clock;
use crate::quart::editor::ScheduleEditor;
use crate::quart::model::default_schedule;
use crate::quart::resolver::Resolver;
use crate::store::FileStore;

const LOG_ENV_VAR: &str = "QUARTCLOCK_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "quartclock",
    version,
    about = "Full-screen dashboard for a day divided into named shift intervals"
)]
struct Cli {
    #[arg(long, default_value = "quarts.json")]
    quarts: PathBuf,

    /// Pin the clock to a fixed local time (HH:MM).
    #[arg(long)]
    at: Option<String>,

    /// Print the current quart and its neighbors, then exit.
    #[arg(long)]
    status: bool,

    #[arg(long, default_value_t = 10)]
    tick_secs: u64,

    #[arg(long, default_value_t = 10)]
    idle_secs: u64,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    api_enabled: bool,

    #[arg(long, default_value = "127.0.0.1")]
    api_bind: String,

    #[arg(long, default_value_t = 8199)]
    api_port: u16,

    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if cli.tick_secs == 0 {
        bail!("--tick-secs must be greater than zero");
    }
    if cli.idle_secs == 0 {
        bail!("--idle-secs must be greater than zero");
    }

    let clock = select_clock(cli.at.as_deref())?;
    let editor = ScheduleEditor::load(FileStore::new(&cli.quarts), Arc::new(default_schedule()));
    let tick_period = Duration::from_secs(cli.tick_secs);

    if cli.status {
        let resolver = Resolver::new(editor.schedule(), tick_period, clock.clock.minute_of_day());
        let snapshot = RuntimeSnapshot::capture(&resolver, &clock.label, false);
        report::run_status_report(&snapshot, editor.store().path())?;
        return Ok(());
    }

    let api_server = if cli.api_enabled {
        let server = ApiServer::start(ApiServerConfig {
            bind_addr: cli.api_bind.clone(),
            port: cli.api_port,
        })
        .with_context(|| {
            format!(
                "failed to start local API at {}:{}",
                cli.api_bind, cli.api_port
            )
        })?;
        Some(server)
    } else {
        None
    };
    let api_state: Option<Arc<Mutex<ApiSharedState>>> =
        api_server.as_ref().map(|server| Arc::clone(&server.state));

    let ui_result = ui::app::run_gui(
        clock,
        editor,
        ui::app::DashboardOptions {
            tick_period,
            idle_timeout: Duration::from_secs(cli.idle_secs),
            api_state,
            api_url: api_server
                .as_ref()
                .map(|_| format!("http://{}:{}/v1", cli.api_bind, cli.api_port)),
        },
    );

    drop(api_server);
    ui_result
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
#[cfg(feature = "tui")]
use tracing::info;

use initech_crm::{
    build_store, init_logging, load_settings, BackendKind, FunnelGrouping, FunnelReport, LogSink,
    Settings, StartPage, TableReport,
};

#[derive(Debug, Parser)]
#[command(name = "initech-crm", version, about = "Manage your customers and sales funnel")]
struct Cli {
    /// Settings file (defaults to ./crm.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed customers from a CSV file (id,name,email,status)
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Page the terminal UI opens on (funnel or customers)
    #[arg(long)]
    page: Option<StartPage>,

    /// Where status changes are saved (local or offline)
    #[arg(long)]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive terminal UI (default)
    Ui,
    /// Print the customers table
    Table,
    /// Print funnel counts and customers per stage
    Funnel,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        settings.seed_file = Some(seed);
    }
    if let Some(page) = cli.page {
        settings.start_page = page;
    }
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }

    match cli.command.unwrap_or(Command::Ui) {
        Command::Ui => run_ui_mode(&settings)?,
        Command::Table => {
            init_logging(&settings.log_filter, settings.log_file.as_deref(), LogSink::Discard)?;
            let store = build_store(&settings)?;
            print!("{}", TableReport(&store.snapshot()));
        }
        Command::Funnel => {
            init_logging(&settings.log_filter, settings.log_file.as_deref(), LogSink::Discard)?;
            let store = build_store(&settings)?;
            print!("{}", FunnelReport(&FunnelGrouping::group(&store.snapshot())));
        }
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(settings: &Settings) -> Result<()> {
    init_logging(&settings.log_filter, settings.log_file.as_deref(), LogSink::Discard)?;

    let store = build_store(settings)?;
    let backend = initech_crm::backend_for(settings.backend);
    info!(customers = store.snapshot().len(), backend = backend.name(), "starting terminal UI");

    let mut app = ui::App::new(store, backend, settings.start_page.into());
    ui::run_ui(&mut app)?;

    info!("terminal UI closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_settings: &Settings) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or print a view: initech-crm table | initech-crm funnel");
    eprintln!("   Or use web UI: cargo run --bin crm-server --features server");
    std::process::exit(1);
}

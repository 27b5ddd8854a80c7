use anyhow::Result;
use clap::Parser;
use tracing::info;

mod app;
mod config;
mod logging;

use app::{App, TtySuspend};
use app::row::{self, ServiceRow};
use app::systemd::{SystemRunner, Systemctl};
use config::{Cli, Registry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.log_file {
        logging::init_file(path)?;
    } else if cli.list {
        logging::init_stderr()?;
    }

    let registry = Registry::load(cli.config.as_deref())?.apply_cli(&cli)?;
    let manager = Systemctl::new(SystemRunner, registry.escalation.clone());

    let rows = row::discover(&registry.engines, &manager);
    info!("Discovered {} of {} engines", rows.len(), registry.engines.len());

    if cli.list {
        print_rows(rows, &manager);
        return Ok(());
    }

    let mut app = App::new(manager, rows, registry.action_mode, registry.refresh_interval);
    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal, &mut TtySuspend);
    ratatui::restore();
    result
}

fn print_rows(mut rows: Vec<ServiceRow>, manager: &Systemctl<SystemRunner>) {
    if rows.is_empty() {
        println!("{}", app::ui::NO_ENGINES);
        return;
    }
    for row in &mut rows {
        row.refresh(manager);
        let pid = row.pid().map(|p| p.to_string()).unwrap_or_default();
        let port = row.port().map(|p| p.to_string()).unwrap_or_default();
        println!(
            "{:<12} {:<6} {:<28} {:<14} {:<8} {:<8} {}",
            row.engine().name,
            port,
            row.unit(),
            row.status_text(),
            pid,
            row.control().label(),
            row.engine().process_pattern
        );
    }
}

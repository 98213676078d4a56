use std::{
    io::{self, BufRead},
    path::PathBuf,
    thread,
};

mod backend_bridge;
mod config;
mod controller;
mod ui;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::bounded;
use tracing_subscriber::EnvFilter;

use backend_bridge::{commands::BackendCommand, runtime};
use controller::{
    events::UiEvent,
    orchestration::{dispatch_backend_command, parse_line, ConsoleInput},
};

#[derive(Parser, Debug)]
#[command(about = "Interactive console for the document workflow assistant")]
struct Args {
    /// Path to a console.toml file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides api_base_url, e.g. http://127.0.0.1:8000/api
    #[arg(long)]
    api_url: Option<String>,
    /// Endpoint used for questions (/agent or /qa)
    #[arg(long)]
    ask_path: Option<String>,
    #[arg(long)]
    request_timeout_secs: Option<u64>,
    /// Used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_filter: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(url) = args.api_url {
        settings.api_base_url = url;
    }
    if let Some(path) = args.ask_path {
        settings.ask_path = path;
    }
    if let Some(secs) = args.request_timeout_secs {
        settings.request_timeout_secs = secs;
    }
    let settings = settings.validate().context("invalid command-line settings")?;
    tracing::info!(
        "console: starting api_base_url={} ask_path={}",
        settings.api_base_url,
        settings.ask_path
    );

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    let worker = runtime::launch(settings, cmd_rx, ui_tx.clone());
    let renderer = thread::spawn(move || ui::run(ui_rx));

    println!("{}", ui::help_text());

    let mut status = String::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read from stdin")?;
        match parse_line(&line) {
            ConsoleInput::Command(cmd) => {
                dispatch_backend_command(&cmd_tx, cmd, &mut status);
                if !status.is_empty() {
                    let _ = ui_tx.try_send(UiEvent::Info(std::mem::take(&mut status)));
                }
            }
            ConsoleInput::Help => {
                let _ = ui_tx.try_send(UiEvent::Info(ui::help_text().to_string()));
            }
            ConsoleInput::Quit => break,
            ConsoleInput::Empty => {}
            ConsoleInput::Invalid(message) => {
                let _ = ui_tx.try_send(UiEvent::Info(message));
            }
        }
    }

    drop(cmd_tx);
    if worker.join().is_err() {
        tracing::error!("console: backend worker panicked");
    }
    drop(ui_tx);
    if renderer.join().is_err() {
        tracing::error!("console: renderer panicked");
    }
    Ok(())
}

//! `les02` – LES02 CAN → WebSocket listener
//!
//! Commands:
//!
//! * `les02 [listen]` – read the bus, broadcast position samples to every
//!   WebSocket subscriber on `ws://localhost:8765`.
//! * `les02 dump` – read the bus and print every frame to stdout.
//! * `les02 watch [uri]` – debug subscriber that prints every broadcast.
//! * `les02 init` – write a default `~/.les02/config.toml`.
//!
//! `--config <path>` selects another config file.  Ctrl-C stops any command.

mod config;
mod telemetry;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use les02_can::{BusTransport, FrameDump, FrameSource, SimulatedBus};
use les02_middleware::{BridgeItem, BroadcastServer, bridge_queue, spawn_reader, start_bridge};
use les02_types::Les02Error;
use tokio::sync::watch as signal;
use tracing::{error, info, warn};

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Listen,
    Dump,
    Watch(String),
    Init,
    Help,
}

#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    command: Command,
    config_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    let invocation = match parse_args(std::env::args().skip(1)) {
        Ok(inv) => inv,
        Err(msg) => {
            eprintln!("{}: {msg}\n", "error".red().bold());
            print_usage();
            return ExitCode::from(2);
        }
    };

    if invocation.command == Command::Help {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let config_path = invocation.config_path.clone().unwrap_or_else(config::config_path);

    if invocation.command == Command::Init {
        return init_config(&config_path);
    }

    let cfg = match config::resolve(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };

    // Tracing first: the OTLP exporter must not need a runtime.
    let _guard = telemetry::init_tracing("les02");

    // ── Ctrl-C ────────────────────────────────────────────────────────────
    let (stop_tx, stop_rx) = signal::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(invocation.command, cfg, stop_rx));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "les02 failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, cfg: Config, mut stop: signal::Receiver<bool>) -> Result<(), Les02Error> {
    let work = async {
        match command {
            Command::Listen => listen(&cfg).await,
            Command::Dump => dump(&cfg).await,
            Command::Watch(uri) => {
                watch::run(&uri).await;
                Ok(())
            }
            Command::Init | Command::Help => Ok(()),
        }
    };

    tokio::select! {
        result = work => result,
        Ok(()) = stop.changed() => {
            println!();
            info!("listener stopped by user (Ctrl-C)");
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

async fn listen(cfg: &Config) -> Result<(), Les02Error> {
    let server = BroadcastServer::new()
        .with_host(cfg.ws_host.clone())
        .with_port(cfg.ws_port);
    let listener = server.bind().await?;

    let transport = open_transport(cfg)?;
    let bridge = start_bridge(FrameSource::new(transport), server.clone(), cfg.idle_backoff())?;
    info!("LES02 listener started");

    tokio::spawn(async move {
        match bridge.await {
            Ok(report) => info!(
                frames = report.frames,
                events = report.events,
                end = ?report.end,
                "bridge finished; server keeps running without new events"
            ),
            Err(e) => error!(error = %e, "bridge task panicked"),
        }
    });

    server.serve(listener).await;
    Ok(())
}

async fn dump(cfg: &Config) -> Result<(), Les02Error> {
    let (producer, consumer) = bridge_queue();
    let mut consumer = consumer.with_idle_backoff(cfg.idle_backoff());
    spawn_reader(FrameSource::new(open_transport(cfg)?), producer)?;

    while let Some(item) = consumer.next().await {
        match item {
            BridgeItem::Frame(frame) => println!("{}", FrameDump(&frame)),
            BridgeItem::End(end) => {
                info!(end = ?end, "bus stream ended");
                break;
            }
        }
    }
    Ok(())
}

fn init_config(path: &std::path::Path) -> ExitCode {
    if path.exists() {
        println!("  Config already exists at {}", path.display().to_string().bold());
        return ExitCode::SUCCESS;
    }
    match config::save_to(&Config::default(), path) {
        Ok(()) => {
            println!("  {} Config saved to {}", "✓".green().bold(), path.display().to_string().bold());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", "Error saving config".red());
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bus selection
// ─────────────────────────────────────────────────────────────────────────────

fn open_transport(cfg: &Config) -> Result<Box<dyn BusTransport>, Les02Error> {
    if cfg.simulate {
        info!(period_ms = cfg.sim_period_ms, "using simulated LES02 bus");
        return Ok(Box::new(SimulatedBus::new().with_period(cfg.sim_period())));
    }
    open_hardware(cfg)
}

#[cfg(all(target_os = "linux", feature = "socketcan"))]
fn open_hardware(cfg: &Config) -> Result<Box<dyn BusTransport>, Les02Error> {
    let transport = les02_can::SocketCanTransport::open(&cfg.can_interface)?;
    Ok(Box::new(transport))
}

#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
fn open_hardware(cfg: &Config) -> Result<Box<dyn BusTransport>, Les02Error> {
    Err(Les02Error::Transport(format!(
        "cannot open {}: SocketCAN support is not compiled in (set simulate = true)",
        cfg.can_interface
    )))
}

// ─────────────────────────────────────────────────────────────────────────────
// Arguments
// ─────────────────────────────────────────────────────────────────────────────

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Invocation, String> {
    let mut command = None;
    let mut config_path = None;
    let mut watch_uri = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" | "help" => command = Some(Command::Help),
            "listen" | "dump" | "watch" | "init" if command.is_none() => {
                command = Some(match arg.as_str() {
                    "listen" => Command::Listen,
                    "dump" => Command::Dump,
                    "init" => Command::Init,
                    _ => Command::Watch(String::new()),
                });
            }
            other if matches!(command, Some(Command::Watch(_))) && watch_uri.is_none() => {
                watch_uri = Some(other.to_string());
            }
            other => return Err(format!("unexpected argument `{other}`")),
        }
    }

    let command = match command.unwrap_or(Command::Listen) {
        Command::Watch(_) => Command::Watch(watch_uri.unwrap_or_else(|| watch::DEFAULT_URI.to_string())),
        other => other,
    };
    Ok(Invocation { command, config_path })
}

fn print_usage() {
    println!("{} {}", "les02".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  LES02 CAN → WebSocket listener\n");
    println!("{}", "USAGE:".bold());
    println!("  les02 [--config <path>] [listen]   broadcast position samples over WebSocket");
    println!("  les02 [--config <path>] dump       print every bus frame");
    println!("  les02 watch [uri]                  print broadcasts (default {})", watch::DEFAULT_URI);
    println!("  les02 [--config <path>] init       write a default config file");
    println!();
    println!("  Config: {}", config::config_path().display());
}

//! Command-line surface of the `rewind` binary.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::describe::Describe;
use crate::driver::{ConsoleDriver, SignalDriver};
use crate::export::{export_approved, read_timeline, write_fixtures};
use crate::monitor::{compose_monitor, EventHandlingState, MonitorDrivers, MonitorModel};
use crate::peer::{TcpConfig, TcpTransport};
use crate::timeline::Timeline;

#[derive(Debug, Parser)]
#[command(name = "rewind", version, about = "Record, scrub and export app state transitions")]
pub struct Cli {
    /// Override the data directory (defaults to ~/.rewind)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mirror a running app's moments and drive them from the console
    Monitor(MonitorArgs),
    /// Write the approved moments of a timeline as test fixtures
    Export(ExportArgs),
    /// Summarize a timeline file, or print one of its moments
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Address to accept peer sessions on
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Peer address to probe during discovery (repeatable)
    #[arg(long = "peer", value_name = "ADDR")]
    pub peers: Vec<SocketAddr>,

    /// Timeline file to load on startup
    #[arg(long, value_name = "FILE")]
    pub open: Option<PathBuf>,

    /// Initial mode: playing, events, effects or recording
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<EventHandlingState>,

    /// Name advertised to peers
    #[arg(long)]
    pub name: Option<String>,

    /// Do not connect to the first discovered peer
    #[arg(long)]
    pub no_auto_connect: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Timeline file to export from
    pub timeline: PathBuf,

    /// Destination of the fixtures (defaults to the configured fixtures file)
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Timeline file to read
    pub timeline: PathBuf,

    /// Print the moment at this index in full
    #[arg(short, long)]
    pub index: Option<usize>,
}

fn parse_mode(value: &str) -> Result<EventHandlingState, String> {
    EventHandlingState::parse(value).ok_or_else(|| {
        let names: Vec<&str> = EventHandlingState::ALL.iter().map(|m| m.as_str()).collect();
        format!("unknown mode `{value}` (expected one of: {})", names.join(", "))
    })
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load();

    match cli.command {
        Command::Monitor(args) => run_monitor(args, &config).await,
        Command::Export(args) => {
            let out = args.out.unwrap_or_else(|| config.export.fixtures_file.clone());
            let count = export_command(&args.timeline, &out)?;
            println!("Exported {count} fixture(s) to {}", out.display());
            Ok(())
        }
        Command::Inspect(args) => {
            let timeline = read_timeline(&args.timeline)
                .with_context(|| format!("Failed to open {}", args.timeline.display()))?;
            print!("{}", inspect_report(&timeline, args.index)?);
            Ok(())
        }
    }
}

impl MonitorArgs {
    /// Transport settings: command-line values win over the config file.
    pub fn tcp_config(&self, config: &Config) -> TcpConfig {
        let mut peers = config.peer.peers.clone();
        for peer in &self.peers {
            if !peers.contains(peer) {
                peers.push(*peer);
            }
        }
        TcpConfig {
            display_name: self
                .name
                .clone()
                .unwrap_or_else(|| config.peer.display_name.clone()),
            listen: self.listen.or(config.peer.listen),
            peers,
            discovery_interval: config.peer.discovery_interval,
        }
    }

    /// State the monitor starts from, before any timeline is loaded.
    pub fn initial_model(&self, config: &Config) -> MonitorModel {
        MonitorModel::new(
            self.mode.unwrap_or(config.monitor.initial_mode),
            config.monitor.auto_connect && !self.no_auto_connect,
        )
    }
}

async fn run_monitor(args: MonitorArgs, config: &Config) -> Result<()> {
    let mut initial = args.initial_model(config);
    if let Some(path) = &args.open {
        let timeline =
            read_timeline(path).with_context(|| format!("Failed to open {}", path.display()))?;
        initial = initial.with_timeline(timeline);
    }

    let transport = TcpTransport::bind(args.tcp_config(config))
        .await
        .context("Failed to start the peer transport")?;
    if let Some(addr) = transport.local_addr() {
        println!("Listening for peers on {addr}");
    }
    println!("Type `mode`, `record`, `select N`, `approve`, `export FILE` or `quit`.");

    let drivers = MonitorDrivers::new(transport)
        .with_console(ConsoleDriver::stdio())
        .with_signal(SignalDriver::new());

    tracing::info!(mode = %initial.mode, "Starting monitor");
    let handle = compose_monitor(initial, drivers).spawn();
    let state = handle.join().await.context("Monitor stopped unexpectedly")?;

    tracing::info!(
        events = state.timeline.len(),
        approved = state.timeline.approved_count(),
        "Monitor finished"
    );
    Ok(())
}

/// Write the approved moments of the timeline at `timeline` to `out`.
///
/// Returns the number of fixtures written.
pub fn export_command(timeline: &Path, out: &Path) -> Result<usize> {
    let timeline =
        read_timeline(timeline).with_context(|| format!("Failed to open {}", timeline.display()))?;
    let fixtures = export_approved(&timeline);
    write_fixtures(out, &fixtures)
        .with_context(|| format!("Failed to write fixtures to {}", out.display()))?;
    Ok(fixtures.len())
}

/// Human-readable summary of a timeline, or the full text of one moment.
pub fn inspect_report(timeline: &Timeline, index: Option<usize>) -> Result<String> {
    let mut out = String::new();

    if let Some(index) = index {
        let Some(moment) = timeline.events().get(index) else {
            bail!("No event at index {index} (timeline has {})", timeline.len());
        };
        writeln!(out, "{}", moment.to_text())?;
        return Ok(out);
    }

    let selected = timeline
        .selected_index()
        .map(|index| index.to_string())
        .unwrap_or_else(|| "none".to_string());
    writeln!(
        out,
        "{} events, {} approved, selected {selected}",
        timeline.len(),
        timeline.approved_count()
    )?;
    for (index, moment) in timeline.events().iter().enumerate() {
        let marker = if moment.approved { "✓" } else { " " };
        writeln!(
            out,
            "{marker} {index:>4}  {}: {}",
            moment.cause.label, moment.cause.action
        )?;
    }
    Ok(out)
}

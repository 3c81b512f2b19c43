//! CLI entry point for psu_monitor
//!
//! # Usage
//!
//! ```bash
//! # List RS232/Serial ports
//! psu_monitor list
//!
//! # Print the *IDN? reply of a device
//! psu_monitor identify --port /dev/ttyUSB0
//!
//! # Poll voltage and current every 0.5 s until Ctrl+C
//! psu_monitor monitor --port /dev/ttyUSB0 --mode both --interval 0.5
//!
//! # Interactive: scan, pick a port, identify, prompt for mode and interval
//! psu_monitor
//!
//! # Try it without hardware
//! psu_monitor monitor --mock --mode both
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use psu_monitor::{
    adapters::{Connector, MockConnector, SerialConnector},
    config::Settings,
    console, logging,
    monitor::{parse_interval, ConsoleSink, MeasurementMode, Monitor, StopReason},
    ports::{print_ports, scan_ports},
    PowerSupply,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

const MOCK_IDENTITY: &str = "INSTEK PSW 9115 MOCK0001";

#[derive(Parser)]
#[command(name = "psu_monitor")]
#[command(about = "Find a bench power supply on a serial port and poll its readings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: psu_monitor.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List RS232/Serial ports
    List,

    /// Query and print the device identity
    Identify {
        #[command(flatten)]
        target: Target,
    },

    /// Identify the device, then poll voltage/current until Ctrl+C
    Monitor(MonitorArgs),
}

#[derive(Args, Default)]
struct Target {
    /// Serial port path (skips scanning)
    #[arg(short, long)]
    port: Option<String>,

    /// Talk to a simulated 9115 instead of a serial port
    #[arg(long)]
    mock: bool,
}

#[derive(Args, Default)]
struct MonitorArgs {
    #[command(flatten)]
    target: Target,

    /// voltage, current or both (prompted when omitted)
    #[arg(short, long, value_parser = parse_mode_arg)]
    mode: Option<MeasurementMode>,

    /// Polling interval in seconds (prompted when omitted)
    #[arg(short, long, value_parser = parse_interval_arg)]
    interval: Option<Duration>,

    /// Measure even if the identity does not match the model marker
    #[arg(long)]
    force: bool,
}

fn parse_mode_arg(s: &str) -> Result<MeasurementMode, String> {
    s.parse().map_err(|e: psu_monitor::PsuError| e.to_string())
}

fn parse_interval_arg(s: &str) -> Result<Duration, String> {
    parse_interval(s).ok_or_else(|| format!("'{}' is not a positive number of seconds", s))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("Failed to load configuration")?;

    logging::init(&settings, cli.verbose);

    match cli.command {
        Some(Commands::List) => list(),
        Some(Commands::Identify { target }) => {
            if target.mock {
                identify(MockConnector::power_supply(MOCK_IDENTITY), &target, &settings)
            } else {
                identify(SerialConnector::new(), &target, &settings)
            }
        }
        Some(Commands::Monitor(args)) => run_monitor_command(args, &settings),
        None => run_monitor_command(MonitorArgs::default(), &settings),
    }
}

fn run_monitor_command(args: MonitorArgs, settings: &Settings) -> Result<()> {
    if args.target.mock {
        monitor(MockConnector::power_supply(MOCK_IDENTITY), args, settings)
    } else {
        monitor(SerialConnector::new(), args, settings)
    }
}

fn list() -> Result<()> {
    let ports = scan_ports();
    print_ports(&ports, &mut io::stdout().lock())?;
    Ok(())
}

/// Pick the port: `--port`, then the configured port, then scan and ask.
fn resolve_port(target: &Target, settings: &Settings) -> Result<String> {
    if let Some(port) = target.port.as_ref().or(settings.instrument.port.as_ref()) {
        return Ok(port.clone());
    }
    if target.mock {
        return Ok("mock".to_string());
    }

    let ports = scan_ports();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    print_ports(&ports, &mut out)?;

    let chosen = console::prompt_port(&mut io::stdin().lock(), &mut out, &ports)?;
    match chosen {
        Some(port) => {
            info!("Using port {} ({})", port.device, port.description);
            Ok(port.device.clone())
        }
        None => bail!("No RS232/Serial port found. Use --port to name one explicitly."),
    }
}

fn identify<C: Connector>(connector: C, target: &Target, settings: &Settings) -> Result<()> {
    let port = resolve_port(target, settings)?;
    let supply = PowerSupply::new(connector, &port);
    let marker = &settings.instrument.model_marker;

    let (identity, supported) = supply.identify(marker);
    println!("Device identity: {}", identity);
    if supported {
        println!("Device matches model {}.", marker);
    } else {
        println!("Device is not a {} power supply.", marker);
    }
    Ok(())
}

fn monitor<C>(connector: C, args: MonitorArgs, settings: &Settings) -> Result<()>
where
    C: Connector + Send + 'static,
{
    let port = resolve_port(&args.target, settings)?;
    let supply = PowerSupply::new(connector, &port);
    let marker = &settings.instrument.model_marker;

    let (identity, supported) = supply.identify(marker);
    println!("Device identity: {}", identity);
    if !supported {
        if !args.force {
            println!("Device is not a {} power supply. Measurement skipped.", marker);
            return Ok(());
        }
        warn!("Identity does not contain '{}'; measuring anyway", marker);
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mode = match args.mode.or(settings.monitor.mode) {
        Some(mode) => mode,
        None => console::prompt_mode(&mut input, &mut out)?,
    };
    let interval = match args.interval {
        Some(interval) => interval,
        None => console::prompt_interval(&mut input, &mut out, settings.interval())?,
    };
    let monitor = Monitor::new(supply, mode, interval);
    writeln!(
        out,
        "Measuring {} every {} s. Press Ctrl+C to stop.",
        monitor.mode(),
        interval.as_secs_f64()
    )?;
    drop(out);
    drop(input);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let summary = runtime.block_on(async move {
        let running = monitor.running_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                running.store(false, Ordering::SeqCst);
            }
        });

        tokio::task::spawn_blocking(move || monitor.run(&mut ConsoleSink::new(io::stdout())))
            .await
            .context("Measurement task panicked")
    })?;

    match summary.stop {
        StopReason::Interrupted => println!("\nMeasurement stopped by user."),
        StopReason::Failed(message) => println!("Error during measurement: {}", message),
    }
    Ok(())
}

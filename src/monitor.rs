//! Continuous measurement loop
//!
//! Polls voltage and/or current at a fixed interval until the shared running
//! flag is cleared (Ctrl+C) or reporting a reading fails.

use crate::adapters::Connector;
use crate::error::{AppResult, PsuError};
use crate::instrument::{Command, PowerSupply, Reading};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default polling interval in seconds
pub const DEFAULT_INTERVAL_SECS: f64 = 2.0;

/// Longest uninterrupted nap while waiting for the next iteration
const STOP_CHECK_PERIOD: Duration = Duration::from_millis(50);

/// Which quantities to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementMode {
    /// Voltage only
    Voltage,
    /// Current only
    Current,
    /// Voltage, then current
    Both,
}

impl MeasurementMode {
    /// Commands issued per iteration, in order
    pub fn commands(&self) -> &'static [Command] {
        match self {
            MeasurementMode::Voltage => &[Command::Voltage],
            MeasurementMode::Current => &[Command::Current],
            MeasurementMode::Both => &[Command::Voltage, Command::Current],
        }
    }
}

impl FromStr for MeasurementMode {
    type Err = PsuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "voltage" => Ok(MeasurementMode::Voltage),
            "current" => Ok(MeasurementMode::Current),
            "both" => Ok(MeasurementMode::Both),
            other => Err(PsuError::Validation(format!(
                "Invalid measurement mode '{}'. Must be one of: voltage, current, both",
                other
            ))),
        }
    }
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasurementMode::Voltage => "voltage",
            MeasurementMode::Current => "current",
            MeasurementMode::Both => "both",
        };
        f.write_str(name)
    }
}

/// Receives readings as they are taken.
pub trait MeasurementSink {
    /// Report one reading; an error stops the loop.
    fn record(&mut self, command: Command, reading: &Reading) -> AppResult<()>;
}

/// Prints `Voltage: <reading>` / `Current: <reading>` lines.
pub struct ConsoleSink<W> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    /// Print to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MeasurementSink for ConsoleSink<W> {
    fn record(&mut self, command: Command, reading: &Reading) -> AppResult<()> {
        writeln!(self.out, "{}: {}", command.label(), reading)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The running flag was cleared
    Interrupted,
    /// An iteration failed; carries the reported message
    Failed(String),
}

/// Result of a polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSummary {
    /// Completed iterations
    pub iterations: u64,
    /// Why polling stopped
    pub stop: StopReason,
}

/// Polling loop over one power supply.
pub struct Monitor<C> {
    supply: PowerSupply<C>,
    mode: MeasurementMode,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl<C: Connector> Monitor<C> {
    /// Create a monitor; it starts in the running state.
    pub fn new(supply: PowerSupply<C>, mode: MeasurementMode, interval: Duration) -> Self {
        Self {
            supply,
            mode,
            interval,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a clone of the running flag for signal handling
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Measurement mode
    pub fn mode(&self) -> MeasurementMode {
        self.mode
    }

    /// Poll until interrupted or until reporting fails.
    pub fn run<S: MeasurementSink>(&self, sink: &mut S) -> PollSummary {
        info!(
            "Polling {} on {} every {:?}",
            self.mode,
            self.supply.port(),
            self.interval
        );

        let mut iterations = 0u64;
        while self.is_running() {
            if let Err(e) = self.poll_once(sink) {
                error!("Measurement loop stopped: {}", e);
                return PollSummary {
                    iterations,
                    stop: StopReason::Failed(e.to_string()),
                };
            }
            iterations += 1;
            debug!("Iteration {} complete", iterations);
            self.pause();
        }

        info!("Measurement loop interrupted after {} iteration(s)", iterations);
        PollSummary {
            iterations,
            stop: StopReason::Interrupted,
        }
    }

    fn poll_once<S: MeasurementSink>(&self, sink: &mut S) -> AppResult<()> {
        for &command in self.mode.commands() {
            let reading = self.supply.query(command);
            sink.record(command, &reading)?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sleep for the interval, waking early if the flag is cleared.
    ///
    /// An interval past the clock's range waits until the flag is cleared.
    fn pause(&self) {
        let deadline = Instant::now().checked_add(self.interval);
        while self.is_running() {
            let nap = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    (deadline - now).min(STOP_CHECK_PERIOD)
                }
                None => STOP_CHECK_PERIOD,
            };
            std::thread::sleep(nap);
        }
    }
}

/// Convert seconds to an interval; `None` unless positive and representable.
pub fn interval_from_secs(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Parse an interval answer in seconds; `None` when invalid or not positive.
pub fn parse_interval(text: &str) -> Option<Duration> {
    interval_from_secs(text.trim().parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockConnector;

    struct Collect(Vec<(Command, Reading)>);

    impl MeasurementSink for Collect {
        fn record(&mut self, command: Command, reading: &Reading) -> AppResult<()> {
            self.0.push((command, reading.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_mode_parsing_is_case_insensitive() {
        assert_eq!("VOLTAGE".parse::<MeasurementMode>().unwrap(), MeasurementMode::Voltage);
        assert_eq!(" Current ".parse::<MeasurementMode>().unwrap(), MeasurementMode::Current);
        assert_eq!("both".parse::<MeasurementMode>().unwrap(), MeasurementMode::Both);
        assert!("power".parse::<MeasurementMode>().is_err());
    }

    #[test]
    fn test_mode_commands() {
        assert_eq!(MeasurementMode::Voltage.commands(), &[Command::Voltage]);
        assert_eq!(
            MeasurementMode::Both.commands(),
            &[Command::Voltage, Command::Current]
        );
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_interval(" 0.5 "), Some(Duration::from_millis(500)));
        assert_eq!(parse_interval("abc"), None);
        assert_eq!(parse_interval("0"), None);
        assert_eq!(parse_interval("-1"), None);
        assert_eq!(parse_interval("inf"), None);
        assert_eq!(parse_interval("NaN"), None);
        assert_eq!(parse_interval("1e30"), None);
        assert!(parse_interval("1e19").is_some());
    }

    #[test]
    fn test_cleared_flag_runs_no_iterations() {
        let monitor = Monitor::new(
            PowerSupply::new(MockConnector::power_supply("9115"), "mock"),
            MeasurementMode::Both,
            Duration::from_millis(1),
        );
        monitor.running_flag().store(false, Ordering::SeqCst);

        let mut sink = Collect(Vec::new());
        let summary = monitor.run(&mut sink);
        assert_eq!(summary.iterations, 0);
        assert_eq!(summary.stop, StopReason::Interrupted);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn test_console_sink_format() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.record(Command::Voltage, &Reading::Value("5.02".to_string()))
            .unwrap();
        sink.record(
            Command::Current,
            &Reading::Failed {
                action: "measuring current",
                detail: "timeout".to_string(),
            },
        )
        .unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "Voltage: 5.02\nCurrent: Error measuring current: timeout\n"
        );
    }
}

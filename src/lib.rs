//! Core library for the psu_monitor tool.
//!
//! Discovers serial ports, identifies a 9115-class bench power supply with
//! `*IDN?`, and polls `MEAS:VOLT?` / `MEAS:CURR?` until interrupted.
//!
//! # Features
//!
//! - `instrument_serial` (default) - real serial ports via `serialport`
//!
//! # Example
//!
//! ```no_run
//! use psu_monitor::adapters::SerialConnector;
//! use psu_monitor::instrument::PowerSupply;
//!
//! let psu = PowerSupply::new(SerialConnector::new(), "/dev/ttyUSB0");
//! println!("{}", psu.query_voltage());
//! ```

pub mod adapters;
pub mod config;
pub mod console;
pub mod error;
pub mod instrument;
pub mod logging;
pub mod monitor;
pub mod ports;

pub use adapters::{Connector, LinkSettings, MockConnector, SerialConnector};
pub use config::Settings;
pub use error::{AppResult, PsuError};
pub use instrument::{is_supported_identity, Command, PowerSupply, Reading};
pub use monitor::{ConsoleSink, MeasurementMode, MeasurementSink, Monitor, PollSummary, StopReason};
pub use ports::{scan_ports, PortInfo};

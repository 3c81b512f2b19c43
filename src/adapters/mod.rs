//! Link adapters
//!
//! A [`Connector`] opens a byte link to an instrument. The instrument session
//! opens one link per query and drops it before the query returns, so a
//! `Connector` is the only thing that outlives an exchange.

pub mod mock;
pub mod serial_adapter;

pub use mock::{MockConnector, MockReply};
pub use serial_adapter::SerialConnector;

use crate::error::AppResult;
use std::io::{Read, Write};
use std::time::Duration;

/// Fixed baud rate for every exchange.
pub const BAUD_RATE: u32 = 9600;

/// Fixed response timeout for every exchange.
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Parameters used to open a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Device identifier (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Communication speed
    pub baud_rate: u32,
    /// Read timeout applied to the response line
    pub timeout: Duration,
}

impl LinkSettings {
    /// Settings for `port` at 9600 baud with a 2 second timeout.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: BAUD_RATE,
            timeout: READ_TIMEOUT,
        }
    }
}

/// Opens links to an instrument.
///
/// The returned link is closed when it is dropped.
pub trait Connector {
    /// Link type produced by this connector
    type Link: Read + Write;

    /// Human readable adapter name, used in logs
    fn name(&self) -> &str;

    /// Open a fresh link using `settings`.
    fn open(&self, settings: &LinkSettings) -> AppResult<Self::Link>;
}

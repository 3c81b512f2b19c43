//! Serial connector for RS-232 / USB-serial instruments.
//!
//! Wraps the `serialport` crate. Each call to [`Connector::open`] opens the
//! device node with fixed 8N1 framing and no flow control; the port is closed
//! when the returned link is dropped.

use super::{Connector, LinkSettings};
use crate::error::{AppResult, PsuError};
#[cfg(feature = "instrument_serial")]
use log::debug;

#[cfg(feature = "instrument_serial")]
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Link produced by [`SerialConnector`].
#[cfg(feature = "instrument_serial")]
pub type SerialLink = Box<dyn SerialPort>;

/// Link produced by [`SerialConnector`] (serial support disabled).
#[cfg(not(feature = "instrument_serial"))]
pub type SerialLink = std::io::Empty;

/// Opens real serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl SerialConnector {
    /// Create a serial connector
    pub fn new() -> Self {
        Self
    }
}

impl Connector for SerialConnector {
    type Link = SerialLink;

    fn name(&self) -> &str {
        "serial"
    }

    #[cfg(feature = "instrument_serial")]
    fn open(&self, settings: &LinkSettings) -> AppResult<SerialLink> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.timeout)
            .open()
            .map_err(|e| PsuError::PortUnavailable {
                port: settings.port.clone(),
                reason: e.to_string(),
            })?;

        if let Err(e) = port.clear(serialport::ClearBuffer::All) {
            debug!("Could not clear buffers on '{}': {}", settings.port, e);
        }

        debug!(
            "Serial port '{}' opened at {} baud",
            settings.port, settings.baud_rate
        );
        Ok(port)
    }

    #[cfg(not(feature = "instrument_serial"))]
    fn open(&self, _settings: &LinkSettings) -> AppResult<SerialLink> {
        Err(PsuError::SerialFeatureDisabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_connector_name() {
        assert_eq!(SerialConnector::new().name(), "serial");
    }

    #[test]
    fn test_missing_port_is_unavailable() {
        let settings = LinkSettings::new("/dev/psu-monitor-does-not-exist");
        let err = SerialConnector::new().open(&settings).err();

        #[cfg(feature = "instrument_serial")]
        assert!(matches!(err, Some(PsuError::PortUnavailable { .. })));
        #[cfg(not(feature = "instrument_serial"))]
        assert!(matches!(err, Some(PsuError::SerialFeatureDisabled)));
    }
}

//! Bench power supply session
//!
//! [`PowerSupply`] performs one-shot query/response exchanges. Every query
//! opens its own link through the [`Connector`], and the link is dropped, and
//! therefore closed, before the query returns on every path.
//!
//! Queries never fail: exchange errors are folded into [`Reading::Failed`],
//! whose display form is `"Error <action>: <detail>"`.

pub mod scpi;

pub use scpi::Command;

use crate::adapters::{Connector, LinkSettings};
use crate::error::AppResult;
use log::{debug, warn};
use std::fmt;

/// Model marker the identity string must contain before measuring.
pub const DEFAULT_MODEL_MARKER: &str = "9115";

/// Outcome of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    /// Trimmed response text, passed through verbatim
    Value(String),
    /// The exchange failed locally
    Failed {
        /// What was being done (e.g., "measuring voltage")
        action: &'static str,
        /// Failure detail
        detail: String,
    },
}

impl Reading {
    /// True for [`Reading::Value`]
    pub fn is_ok(&self) -> bool {
        matches!(self, Reading::Value(_))
    }

    /// Response text, if the exchange succeeded
    pub fn value(&self) -> Option<&str> {
        match self {
            Reading::Value(v) => Some(v),
            Reading::Failed { .. } => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Value(v) => f.write_str(v),
            Reading::Failed { action, detail } => write!(f, "Error {}: {}", action, detail),
        }
    }
}

/// True when an identity string names the supported model.
pub fn is_supported_identity(identity: &str) -> bool {
    identity_matches(identity, DEFAULT_MODEL_MARKER)
}

/// True when `identity` contains `marker`.
pub fn identity_matches(identity: &str, marker: &str) -> bool {
    identity.contains(marker)
}

/// Query/response session against one port.
#[derive(Debug, Clone)]
pub struct PowerSupply<C> {
    connector: C,
    settings: LinkSettings,
}

impl<C: Connector> PowerSupply<C> {
    /// Session on `port` at the fixed baud rate and timeout.
    pub fn new(connector: C, port: &str) -> Self {
        Self::with_settings(connector, LinkSettings::new(port))
    }

    /// Session with explicit link settings.
    pub fn with_settings(connector: C, settings: LinkSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    /// Port this session talks to
    pub fn port(&self) -> &str {
        &self.settings.port
    }

    /// `*IDN?`
    pub fn query_identity(&self) -> Reading {
        self.query(Command::Identity)
    }

    /// `MEAS:VOLT?`
    pub fn query_voltage(&self) -> Reading {
        self.query(Command::Voltage)
    }

    /// `MEAS:CURR?`
    pub fn query_current(&self) -> Reading {
        self.query(Command::Current)
    }

    /// Run one exchange on a fresh link.
    pub fn query(&self, command: Command) -> Reading {
        match self.try_query(command) {
            Ok(response) => Reading::Value(response),
            Err(e) => {
                warn!(
                    "[{}] {} via {} failed: {}",
                    self.settings.port,
                    command,
                    self.connector.name(),
                    e
                );
                Reading::Failed {
                    action: command.action(),
                    detail: e.to_string(),
                }
            }
        }
    }

    fn try_query(&self, command: Command) -> AppResult<String> {
        let mut link = self.connector.open(&self.settings)?;
        debug!("[{}] Link opened for {}", self.settings.port, command);
        scpi::exchange(&mut link, command)
    }

    /// Identify the device and check it against `marker`.
    ///
    /// Returns the identity reading and whether measuring may proceed.
    /// A failed identity query never passes.
    pub fn identify(&self, marker: &str) -> (Reading, bool) {
        let identity = self.query_identity();
        let supported = identity
            .value()
            .is_some_and(|id| identity_matches(id, marker));
        (identity, supported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockConnector, MockReply};

    #[test]
    fn test_query_voltage_trims_response() {
        let mock = MockConnector::echoing("5.02\n");
        let psu = PowerSupply::new(mock.clone(), "/dev/ttyUSB0");
        assert_eq!(psu.query_voltage(), Reading::Value("5.02".to_string()));
        assert_eq!(mock.commands(), vec!["MEAS:VOLT?".to_string()]);
    }

    #[test]
    fn test_empty_read_is_error_reading() {
        let psu = PowerSupply::new(MockConnector::silent(), "/dev/ttyUSB0");
        let reading = psu.query_current();
        assert!(!reading.is_ok());
        assert!(reading.to_string().starts_with("Error"));
        assert_eq!(
            reading.to_string(),
            "Error measuring current: empty response"
        );
    }

    #[test]
    fn test_timeout_message() {
        let psu = PowerSupply::new(MockConnector::new(|_| MockReply::TimedOut), "COM3");
        assert_eq!(
            psu.query_identity().to_string(),
            "Error querying device: timeout"
        );
    }

    #[test]
    fn test_unavailable_port_is_error_reading() {
        let mock = MockConnector::silent();
        mock.set_unavailable("Permission denied");
        let psu = PowerSupply::new(mock, "/dev/ttyS0");
        assert_eq!(
            psu.query_voltage().to_string(),
            "Error measuring voltage: could not open /dev/ttyS0: Permission denied"
        );
    }

    #[test]
    fn test_link_closed_on_every_path() {
        let mock = MockConnector::new(|command| match command {
            "*IDN?" => MockReply::line("INSTEK PSW 9115"),
            "MEAS:VOLT?" => MockReply::Silent,
            _ => MockReply::Bytes(vec![0xff, b'\n']),
        });
        let psu = PowerSupply::new(mock.clone(), "mock");

        assert!(psu.query_identity().is_ok());
        assert!(!psu.query_voltage().is_ok());
        assert!(!psu.query_current().is_ok());
        assert_eq!(mock.opened(), 3);
        assert_eq!(mock.closed(), 3);
    }

    #[test]
    fn test_identity_is_repeatable() {
        let mock = MockConnector::power_supply("INSTEK PSW 9115 SN123");
        let psu = PowerSupply::new(mock.clone(), "mock");
        let first = psu.query_identity();
        let second = psu.query_identity();
        assert_eq!(first, second);
        assert_eq!(mock.opened(), 2);
        assert_eq!(mock.closed(), 2);
    }

    #[test]
    fn test_identity_gate() {
        assert!(is_supported_identity("INSTEK PSW 9115 SN123"));
        assert!(!is_supported_identity("Error querying device: timeout"));
        assert!(!is_supported_identity("KEYSIGHT E36312A"));
    }

    #[test]
    fn test_identify_failed_reading_never_passes() {
        let psu = PowerSupply::new(MockConnector::silent(), "mock");
        let (reading, supported) = psu.identify("9115");
        assert!(!supported);
        assert!(reading.to_string().starts_with("Error querying device"));

        let psu = PowerSupply::new(MockConnector::power_supply("GW 9115"), "mock");
        let (reading, supported) = psu.identify("9115");
        assert!(supported);
        assert_eq!(reading.value(), Some("GW 9115"));
    }
}

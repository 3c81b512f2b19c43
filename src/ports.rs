//! Serial port discovery
//!
//! Lists the ports visible to the operating system and keeps the ones whose
//! description mentions RS232 or Serial. The match is a case-sensitive
//! substring test: "rs232" does not match.

use log::{debug, warn};
use std::io::{self, Write};

/// Description substrings that mark a port as a candidate instrument link.
pub const DESCRIPTION_MARKERS: &[&str] = &["RS232", "Serial"];

/// A discovered serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device identifier used to open the port (e.g., "/dev/ttyUSB0", "COM3")
    pub device: String,
    /// Human readable description
    pub description: String,
    /// Hardware id (e.g., "USB VID:PID=0403:6001 SER=A10K5X")
    pub hwid: String,
}

impl PortInfo {
    /// Build a port record
    pub fn new(device: &str, description: &str, hwid: &str) -> Self {
        Self {
            device: device.to_string(),
            description: description.to_string(),
            hwid: hwid.to_string(),
        }
    }
}

/// True when `description` contains one of [`DESCRIPTION_MARKERS`].
pub fn matches_marker(description: &str) -> bool {
    DESCRIPTION_MARKERS
        .iter()
        .any(|marker| description.contains(marker))
}

/// Keep the ports whose description matches.
pub fn filter_ports<I>(ports: I) -> Vec<PortInfo>
where
    I: IntoIterator<Item = PortInfo>,
{
    ports
        .into_iter()
        .filter(|p| matches_marker(&p.description))
        .collect()
}

/// Enumerate the OS port table and return the matching ports.
///
/// Never fails: an enumeration error is logged and yields an empty list.
pub fn scan_ports() -> Vec<PortInfo> {
    match list_ports() {
        Ok(ports) => {
            debug!("Enumerated {} serial port(s)", ports.len());
            filter_ports(ports)
        }
        Err(e) => {
            warn!("{}", e);
            Vec::new()
        }
    }
}

/// Enumerate every port without filtering.
#[cfg(feature = "instrument_serial")]
pub fn list_ports() -> crate::error::AppResult<Vec<PortInfo>> {
    let ports = serialport::available_ports()
        .map_err(|e| crate::error::PsuError::Enumeration(e.to_string()))?;

    Ok(ports.into_iter().map(PortInfo::from).collect())
}

/// Enumerate every port without filtering.
#[cfg(not(feature = "instrument_serial"))]
pub fn list_ports() -> crate::error::AppResult<Vec<PortInfo>> {
    Err(crate::error::PsuError::SerialFeatureDisabled)
}

#[cfg(feature = "instrument_serial")]
impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        use serialport::SerialPortType;

        let (description, hwid) = match info.port_type {
            SerialPortType::UsbPort(usb) => {
                let description = usb
                    .product
                    .clone()
                    .or_else(|| usb.manufacturer.clone())
                    .unwrap_or_else(|| "n/a".to_string());
                (
                    description,
                    usb_hwid(usb.vid, usb.pid, usb.serial_number.as_deref()),
                )
            }
            SerialPortType::PciPort => ("PCI Serial Port".to_string(), "PCI".to_string()),
            SerialPortType::BluetoothPort => {
                ("Bluetooth Serial Port".to_string(), "BLUETOOTH".to_string())
            }
            SerialPortType::Unknown => ("n/a".to_string(), "n/a".to_string()),
        };

        Self {
            device: info.port_name,
            description,
            hwid,
        }
    }
}

/// Format a USB hardware id the way common port listers do.
pub fn usb_hwid(vid: u16, pid: u16, serial_number: Option<&str>) -> String {
    match serial_number {
        Some(sn) if !sn.is_empty() => format!("USB VID:PID={:04X}:{:04X} SER={}", vid, pid, sn),
        _ => format!("USB VID:PID={:04X}:{:04X}", vid, pid),
    }
}

/// Print a numbered list of ports, or a notice when there are none.
pub fn print_ports<W: Write>(ports: &[PortInfo], out: &mut W) -> io::Result<()> {
    if ports.is_empty() {
        return writeln!(out, "No RS232 devices found.");
    }

    writeln!(out, "RS232/Serial devices found:")?;
    for (idx, port) in ports.iter().enumerate() {
        writeln!(
            out,
            "{}. Device: {}, Description: {}, HWID: {}",
            idx + 1,
            port.device,
            port.description,
            port.hwid
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(description: &str) -> PortInfo {
        PortInfo::new("/dev/ttyUSB0", description, "n/a")
    }

    #[test]
    fn test_filter_keeps_rs232_and_serial() {
        let ports = vec![port("Foo"), port("RS232 Adapter"), port("USB Serial")];
        let found = filter_ports(ports.clone());
        assert_eq!(found, vec![ports[1].clone(), ports[2].clone()]);
    }

    #[test]
    fn test_filter_is_case_sensitive() {
        assert!(filter_ports(vec![port("rs232")]).is_empty());
        assert!(filter_ports(vec![port("usb serial")]).is_empty());
        assert!(matches_marker("Prolific USB-to-Serial Comm Port"));
    }

    #[test]
    fn test_filter_empty_input() {
        assert!(filter_ports(Vec::new()).is_empty());
    }

    #[test]
    fn test_usb_hwid_format() {
        assert_eq!(
            usb_hwid(0x0403, 0x6001, Some("A10K5X")),
            "USB VID:PID=0403:6001 SER=A10K5X"
        );
        assert_eq!(usb_hwid(0x067b, 0x2303, None), "USB VID:PID=067B:2303");
    }

    #[test]
    fn test_print_ports() {
        let ports = vec![PortInfo::new(
            "COM3",
            "USB Serial Port",
            "USB VID:PID=0403:6001",
        )];
        let mut out = Vec::new();
        print_ports(&ports, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "RS232/Serial devices found:\n\
             1. Device: COM3, Description: USB Serial Port, HWID: USB VID:PID=0403:6001\n"
        );
    }

    #[test]
    fn test_print_no_ports() {
        let mut out = Vec::new();
        print_ports(&[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No RS232 devices found.\n");
    }
}

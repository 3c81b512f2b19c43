//! SCPI line exchange
//!
//! Writes one newline-terminated command to a link and reads back one line.

use crate::error::{AppResult, PsuError};
use log::debug;
use std::fmt;
use std::io::{ErrorKind, Read, Write};

/// The commands this tool sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `*IDN?`
    Identity,
    /// `MEAS:VOLT?`
    Voltage,
    /// `MEAS:CURR?`
    Current,
}

impl Command {
    /// Command text without terminator
    pub fn as_scpi(&self) -> &'static str {
        match self {
            Command::Identity => "*IDN?",
            Command::Voltage => "MEAS:VOLT?",
            Command::Current => "MEAS:CURR?",
        }
    }

    /// Label printed in front of a reading
    pub fn label(&self) -> &'static str {
        match self {
            Command::Identity => "Identity",
            Command::Voltage => "Voltage",
            Command::Current => "Current",
        }
    }

    /// Phrase used in failure messages ("Error <action>: ...")
    pub fn action(&self) -> &'static str {
        match self {
            Command::Identity => "querying device",
            Command::Voltage => "measuring voltage",
            Command::Current => "measuring current",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_scpi())
    }
}

/// Command line terminator
pub const TERMINATOR: &str = "\n";

/// Send `command` and return the trimmed first response line.
pub fn exchange<L: Read + Write>(link: &mut L, command: Command) -> AppResult<String> {
    let framed = format!("{}{}", command.as_scpi(), TERMINATOR);
    link.write_all(framed.as_bytes()).map_err(PsuError::from_link)?;
    link.flush().map_err(PsuError::from_link)?;
    debug!("Sent command: {}", command);

    let raw = read_line(link)?;
    let response = String::from_utf8(raw)?.trim().to_string();
    debug!("Received response: {}", response);
    Ok(response)
}

/// Read bytes up to and including `\n`.
///
/// A timeout or end-of-stream after some bytes returns the partial line; with
/// nothing received it is a `Timeout` or `EmptyResponse` error.
pub fn read_line<R: Read>(link: &mut R) -> AppResult<Vec<u8>> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match link.read(&mut byte) {
            Ok(1) => {
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            Ok(_) => {
                if line.is_empty() {
                    return Err(PsuError::EmptyResponse);
                }
                break;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                let err = PsuError::from_link(e);
                if matches!(err, PsuError::Timeout) && !line.is_empty() {
                    break;
                }
                return Err(err);
            }
        }
    }

    Ok(line)
}

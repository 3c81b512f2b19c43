//! In-memory instrument for tests and `--mock` runs.
//!
//! A [`MockConnector`] answers each newline-terminated command written to one
//! of its links with a [`MockReply`] chosen by a responder closure. It also
//! counts opened and closed links and records every command it received.

use super::{Connector, LinkSettings};
use crate::error::{AppResult, PsuError};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// What the mock instrument does after receiving a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Send these bytes back verbatim
    Bytes(Vec<u8>),
    /// Send nothing; reads return end-of-stream
    Silent,
    /// Send nothing; reads fail with `TimedOut`
    TimedOut,
}

impl MockReply {
    /// Reply with `text` followed by a newline.
    pub fn line(text: &str) -> Self {
        MockReply::Bytes(format!("{}\n", text).into_bytes())
    }
}

type Responder = Box<dyn FnMut(&str) -> MockReply + Send>;

struct MockState {
    responder: Responder,
    unavailable: Option<String>,
    opened: usize,
    closed: usize,
    commands: Vec<String>,
}

/// Scripted instrument reachable through [`Connector::open`].
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// Answer every command using `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&str) -> MockReply + Send + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(MockState {
                responder: Box::new(responder),
                unavailable: None,
                opened: 0,
                closed: 0,
                commands: Vec::new(),
            })),
        }
    }

    /// Answer every command with the same raw bytes.
    pub fn echoing(response: &str) -> Self {
        let bytes = response.as_bytes().to_vec();
        Self::new(move |_| MockReply::Bytes(bytes.clone()))
    }

    /// Never answer; every read ends with an empty response.
    pub fn silent() -> Self {
        Self::new(|_| MockReply::Silent)
    }

    /// A 9115-class power supply reporting `identity` and fixed readings.
    pub fn power_supply(identity: &str) -> Self {
        let identity = identity.to_string();
        Self::new(move |command| match command {
            "*IDN?" => MockReply::line(&identity),
            "MEAS:VOLT?" => MockReply::line("5.000"),
            "MEAS:CURR?" => MockReply::line("0.250"),
            _ => MockReply::Silent,
        })
    }

    /// Make every subsequent open fail with `reason`.
    pub fn set_unavailable(&self, reason: &str) {
        self.lock().unavailable = Some(reason.to_string());
    }

    /// Number of links opened so far
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Number of links dropped so far
    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    /// Commands received, without their terminators
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Connector for MockConnector {
    type Link = MockLink;

    fn name(&self) -> &str {
        "mock"
    }

    fn open(&self, settings: &LinkSettings) -> AppResult<MockLink> {
        let mut state = self.lock();
        if let Some(reason) = &state.unavailable {
            return Err(PsuError::PortUnavailable {
                port: settings.port.clone(),
                reason: reason.clone(),
            });
        }
        state.opened += 1;

        Ok(MockLink {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            outgoing: VecDeque::new(),
            timed_out: false,
        })
    }
}

/// One open link to a [`MockConnector`].
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
    pending: Vec<u8>,
    outgoing: VecDeque<u8>,
    timed_out: bool,
}

impl MockLink {
    fn dispatch(&mut self, command: String) {
        let reply = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.commands.push(command.clone());
            (state.responder)(&command)
        };

        match reply {
            MockReply::Bytes(bytes) => self.outgoing.extend(bytes),
            MockReply::Silent => {}
            MockReply::TimedOut => self.timed_out = true,
        }
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                self.dispatch(line);
            } else {
                self.pending.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outgoing.is_empty() {
            if self.timed_out {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"));
            }
            return Ok(0);
        }

        let mut n = 0;
        while n < buf.len() {
            match self.outgoing.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_answers_complete_lines_only() {
        let mock = MockConnector::power_supply("INSTEK PSW 9115");
        let mut link = mock.open(&LinkSettings::new("mock")).unwrap();

        link.write_all(b"MEAS:").unwrap();
        assert!(mock.commands().is_empty());
        link.write_all(b"VOLT?\n").unwrap();
        assert_eq!(mock.commands(), vec!["MEAS:VOLT?".to_string()]);

        let mut buf = [0u8; 16];
        let n = link.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"5.000\n");
        assert_eq!(link.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_mock_counts_open_and_close() {
        let mock = MockConnector::silent();
        {
            let _a = mock.open(&LinkSettings::new("mock")).unwrap();
            let _b = mock.open(&LinkSettings::new("mock")).unwrap();
            assert_eq!(mock.opened(), 2);
            assert_eq!(mock.closed(), 0);
        }
        assert_eq!(mock.closed(), 2);
    }

    #[test]
    fn test_mock_timed_out_reply() {
        let mock = MockConnector::new(|_| MockReply::TimedOut);
        let mut link = mock.open(&LinkSettings::new("mock")).unwrap();
        link.write_all(b"*IDN?\n").unwrap();

        let mut buf = [0u8; 4];
        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_unavailable_mock_refuses_to_open() {
        let mock = MockConnector::silent();
        mock.set_unavailable("device busy");
        assert!(matches!(
            mock.open(&LinkSettings::new("COM9")),
            Err(PsuError::PortUnavailable { .. })
        ));
        assert_eq!(mock.opened(), 0);
    }
}

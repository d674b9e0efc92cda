//! In-memory transport that replays canned responses.
//!
//! Used by the test suites and for exercising the signing flow without a
//! token attached. Every report written is kept so callers can check what
//! would have gone over the wire.

use std::collections::VecDeque;
use std::time::Duration;

use super::report::{decode_message, encode_message, DecodedMessage, Report};
use super::{DeviceTransport, Opcode, Slot};
use crate::error::{AgentError, Result};

/// One scripted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    /// Bytes returned by the next read.
    Data(Vec<u8>),
    /// The read times out with nothing.
    Silence,
    /// The read fails with an I/O error.
    Fail(String),
}

/// A transport backed by a queue of responses.
///
/// Reads take responses from the front of the queue; an empty queue reads as
/// silence. `read_bytes` truncates to the requested length and
/// `read_string` strips trailing NUL padding, like a real token.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    open: bool,
    responses: VecDeque<ScriptedResponse>,
    written: Vec<Vec<Report>>,
    timeouts: Vec<Duration>,
    open_count: u32,
    close_count: u32,
}

impl ScriptedTransport {
    /// Creates a closed transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that will answer with `responses` in order.
    pub fn with_responses(responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Queues one more response.
    pub fn push_response(&mut self, response: ScriptedResponse) {
        self.responses.push_back(response);
    }

    /// Queues `bytes` as the next data response.
    pub fn push_data(&mut self, bytes: impl Into<Vec<u8>>) {
        self.push_response(ScriptedResponse::Data(bytes.into()));
    }

    /// Responses not consumed yet.
    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }

    /// Raw reports written, grouped per `send` call.
    pub fn written_reports(&self) -> &[Vec<Report>] {
        &self.written
    }

    /// Messages written, decoded back from their reports.
    pub fn sent_messages(&self) -> Vec<DecodedMessage> {
        self.written
            .iter()
            .filter_map(|reports| decode_message(reports))
            .collect()
    }

    /// Timeout passed to every read, in call order.
    pub fn read_timeouts(&self) -> &[Duration] {
        &self.timeouts
    }

    /// Total time reads were allowed to wait.
    pub fn total_wait(&self) -> Duration {
        self.timeouts.iter().sum()
    }

    /// How many times `open` actually opened the transport.
    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    /// How many times `close` actually closed the transport.
    pub fn close_count(&self) -> u32 {
        self.close_count
    }

    fn next_response(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        if !self.open {
            return Err(AgentError::NotOpen);
        }
        self.timeouts.push(timeout);

        match self.responses.pop_front() {
            Some(ScriptedResponse::Data(bytes)) => Ok(bytes),
            Some(ScriptedResponse::Silence) | None => Ok(Vec::new()),
            Some(ScriptedResponse::Fail(reason)) => Err(AgentError::Transport(
                std::io::Error::other(reason),
            )),
        }
    }
}

impl DeviceTransport for ScriptedTransport {
    fn open(&mut self) -> Result<()> {
        if !self.open {
            self.open = true;
            self.open_count += 1;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.close_count += 1;
        }
        Ok(())
    }

    fn send(&mut self, opcode: Opcode, slot: Slot, payload: &[u8]) -> Result<()> {
        if !self.open {
            return Err(AgentError::NotOpen);
        }
        self.written.push(encode_message(opcode, slot.id(), payload));
        Ok(())
    }

    fn read_bytes(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        let mut bytes = self.next_response(timeout)?;
        bytes.truncate(n);
        Ok(bytes)
    }

    fn read_string(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let mut bytes = self.next_response(timeout)?;
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        bytes.truncate(end);
        Ok(bytes)
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(250);

    #[test]
    fn test_reads_require_open() {
        let mut transport = ScriptedTransport::new();
        assert!(matches!(
            transport.read_bytes(32, TIMEOUT),
            Err(AgentError::NotOpen)
        ));
        assert!(matches!(
            transport.send(Opcode::GetPublicKey, Slot::from_index(1).unwrap(), &[]),
            Err(AgentError::NotOpen)
        ));
    }

    #[test]
    fn test_responses_in_order() {
        let mut transport = ScriptedTransport::with_responses([
            ScriptedResponse::Data(vec![1, 2, 3]),
            ScriptedResponse::Silence,
            ScriptedResponse::Data(vec![4]),
        ]);
        transport.open().unwrap();

        assert_eq!(transport.read_bytes(64, TIMEOUT).unwrap(), vec![1, 2, 3]);
        assert!(transport.read_bytes(64, TIMEOUT).unwrap().is_empty());
        assert_eq!(transport.read_bytes(64, TIMEOUT).unwrap(), vec![4]);
        assert!(transport.read_bytes(64, TIMEOUT).unwrap().is_empty());
        assert_eq!(transport.read_timeouts().len(), 4);
        assert_eq!(transport.total_wait(), TIMEOUT * 4);
    }

    #[test]
    fn test_read_bytes_truncates() {
        let mut transport = ScriptedTransport::new();
        transport.push_data(vec![7; 64]);
        transport.open().unwrap();
        assert_eq!(transport.read_bytes(32, TIMEOUT).unwrap().len(), 32);
    }

    #[test]
    fn test_read_string_strips_padding() {
        let mut transport = ScriptedTransport::new();
        let mut padded = b"ready".to_vec();
        padded.resize(64, 0);
        transport.push_data(padded);
        transport.open().unwrap();
        assert_eq!(transport.read_string(TIMEOUT).unwrap(), b"ready");
    }

    #[test]
    fn test_failure_response() {
        let mut transport =
            ScriptedTransport::with_responses([ScriptedResponse::Fail("unplugged".into())]);
        transport.open().unwrap();
        assert!(matches!(
            transport.read_string(TIMEOUT),
            Err(AgentError::Transport(_))
        ));
    }

    #[test]
    fn test_send_records_messages() {
        let mut transport = ScriptedTransport::new();
        transport.open().unwrap();
        let slot = Slot::from_index(2).unwrap();
        transport.send(Opcode::SignChallenge, slot, &[9; 100]).unwrap();

        assert_eq!(transport.written_reports()[0].len(), 2);
        let messages = transport.sent_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].opcode, Opcode::SignChallenge);
        assert_eq!(messages[0].slot_id, 102);
        assert_eq!(messages[0].payload, vec![9; 100]);
    }

    #[test]
    fn test_open_close_counts() {
        let mut transport = ScriptedTransport::new();
        transport.open().unwrap();
        transport.open().unwrap();
        transport.close().unwrap();
        transport.close().unwrap();
        assert_eq!(transport.open_count(), 1);
        assert_eq!(transport.close_count(), 1);
        assert!(!transport.is_open());
    }
}

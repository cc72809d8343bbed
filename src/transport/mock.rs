//! # Mock Transport
//!
//! A scripted transport for driver tests and device simulators. Queued
//! responses are handed out one per `send_and_receive` call; every
//! transmitted command is recorded for assertion.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::TclError;
use crate::transport::Transport;

/// Scripted in-memory transport.
///
/// ## Example
///
/// ```
/// use tclprint::transport::{MockTransport, Transport};
///
/// let mut mock = MockTransport::new();
/// mock.queue_response(b"*G|\x34\x12|\r".to_vec());
///
/// let reply = mock.send_and_receive(b"^G|000000|", 7).unwrap();
/// assert_eq!(reply.len(), 7);
/// assert_eq!(mock.sent()[0], b"^G|000000|");
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Vec<Vec<u8>>,
    responses: VecDeque<Vec<u8>>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next `send_and_receive` call.
    /// An empty vec simulates a device that does not answer.
    pub fn queue_response(&mut self, response: Vec<u8>) {
        self.responses.push_back(response);
    }

    /// All commands transmitted so far, in order.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// The last transmitted command.
    pub fn last_sent(&self) -> Option<&[u8]> {
        self.sent.last().map(Vec::as_slice)
    }

    /// True if any transmitted command equals `cmd`.
    pub fn did_send(&self, cmd: &[u8]) -> bool {
        self.sent.iter().any(|s| s == cmd)
    }

    /// Number of transmitted commands equal to `cmd`.
    pub fn send_count(&self, cmd: &[u8]) -> usize {
        self.sent.iter().filter(|s| s.as_slice() == cmd).count()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TclError> {
        self.sent.push(data.to_vec());
        Ok(())
    }

    fn send_and_receive(&mut self, data: &[u8], expect_len: usize) -> Result<Vec<u8>, TclError> {
        self.sent.push(data.to_vec());
        let mut response = self.responses.pop_front().unwrap_or_default();
        response.truncate(expect_len);
        Ok(response)
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn set_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn write_timeout(&self) -> Duration {
        self.write_timeout
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_sends() {
        let mut mock = MockTransport::new();
        mock.send(b"^F|").unwrap();
        mock.send(b"^F|").unwrap();
        assert_eq!(mock.send_count(b"^F|"), 2);
        assert_eq!(mock.last_sent(), Some(b"^F|".as_slice()));
    }

    #[test]
    fn test_scripted_responses_in_order() {
        let mut mock = MockTransport::new();
        mock.queue_response(vec![1, 2, 3]);
        mock.queue_response(vec![4]);
        assert_eq!(mock.send_and_receive(b"a", 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(mock.send_and_receive(b"b", 3).unwrap(), vec![4]);
        // Queue exhausted: device goes silent.
        assert!(mock.send_and_receive(b"c", 3).unwrap().is_empty());
    }

    #[test]
    fn test_response_truncated_to_expectation() {
        let mut mock = MockTransport::new();
        mock.queue_response(vec![9; 10]);
        assert_eq!(mock.send_and_receive(b"a", 4).unwrap().len(), 4);
    }
}

//! Test doubles shared by the unit tests.

use serde_json::Value;

use crate::error::ChatError;
use crate::transport::Transport;

/// Transport that keeps every record it was asked to send.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub sent: Vec<String>,
    pub refuse: bool,
    pub shut_down: bool,
}

impl RecordingTransport {
    pub fn records(&self) -> Vec<Value> {
        self.sent
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, text: &str) -> Result<(), ChatError> {
        if self.refuse {
            return Err(ChatError::NotConnected);
        }
        self.sent.push(text.to_string());
        Ok(())
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

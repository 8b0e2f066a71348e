//! Test doubles for the transport and sleeper seams
//!
//! Shared by this crate's unit tests and by the model crates, which drive
//! whole select/insert/update flows against scripted response sequences.

use crate::connection::Sleeper;
use crate::transport::{Transport, TransportResponse};
use boardsync_common::Result;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Transport that replays a scripted sequence of responses and records
/// every payload it was asked to post.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<TransportResponse>>,
    repeat: Mutex<Option<TransportResponse>>,
    calls: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedTransport {
    /// A transport that answers every request with the same response
    pub fn always(status: u16, body: String) -> Self {
        let transport = Self::default();
        *transport.repeat.lock().unwrap() = Some(TransportResponse::new(status, body));
        transport
    }

    /// Queue one response; queued responses are consumed before the repeat
    /// response, if any.
    pub fn push(&self, status: u16, body: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(TransportResponse::new(status, body));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// All payloads posted so far, in order
    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn post(
        &self,
        _url: &str,
        payload: &serde_json::Value,
        _headers: &[(String, String)],
        _timeout: Duration,
    ) -> Result<TransportResponse> {
        self.calls.lock().unwrap().push(payload.clone());
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return Ok(response);
        }
        if let Some(response) = self.repeat.lock().unwrap().clone() {
            return Ok(response);
        }
        Ok(TransportResponse::new(
            200,
            r#"{"data":{}}"#.to_string(),
        ))
    }
}

/// Sleeper that records requested pauses instead of blocking
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_order() {
        let transport = ScriptedTransport::default();
        transport.push(500, "{}");
        transport.push(200, r#"{"data":{"items":[]}}"#);

        let first = transport
            .post("u", &serde_json::json!({}), &[], Duration::from_secs(1))
            .unwrap();
        let second = transport
            .post("u", &serde_json::json!({}), &[], Duration::from_secs(1))
            .unwrap();

        assert_eq!(first.status, 500);
        assert_eq!(second.status, 200);
        assert_eq!(transport.call_count(), 2);
    }

    #[test]
    fn test_always_repeats() {
        let transport = ScriptedTransport::always(429, "limited".to_string());
        for _ in 0..3 {
            let response = transport
                .post("u", &serde_json::json!({}), &[], Duration::from_secs(1))
                .unwrap();
            assert_eq!(response.status, 429);
        }
    }
}

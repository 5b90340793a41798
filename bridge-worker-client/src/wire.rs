//! The `{"Event": <kind>, "Data": <object>}` envelope carried by each SSE
//! `data: ` line (`spec.md` §4.G, §6). `kube_client::Client::request_events`
//! decodes its NDJSON watch stream the same way: one small envelope struct
//! deserialized line-by-line, with the payload re-parsed from the `data`
//! field once the kind is known.

use bridge_worker_core::{BridgeEvent, FunctionEvent, WorkerEvent};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Event")]
    event: String,
    #[serde(rename = "Data")]
    data: Value,
}

/// A decoded server-sent event, one level past the raw SSE framing.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Worker(WorkerEvent),
    Bridge(BridgeEvent),
    Function(FunctionEvent),
}

impl ServerEvent {
    /// Parses one `data: ` line's JSON payload. `Ok(None)` means the frame
    /// named a kind this worker doesn't recognize; per `spec.md` §4.G
    /// "Unknown event types are logged and ignored", the caller skips it
    /// rather than treating it as an error.
    pub fn parse(data_line: &str) -> Result<Option<Self>> {
        let envelope: Envelope = serde_json::from_str(data_line).map_err(Error::Serde)?;
        let event = match envelope.event.as_str() {
            "WorkerEvent" => Self::Worker(serde_json::from_value(envelope.data).map_err(Error::Serde)?),
            "BridgeWorkerEvent" => Self::Bridge(serde_json::from_value(envelope.data).map_err(Error::Serde)?),
            "FunctionWorkerEvent" => Self::Function(serde_json::from_value(envelope.data).map_err(Error::Serde)?),
            other => {
                tracing::warn!(kind = %other, "ignoring server event of unknown kind");
                return Ok(None);
            }
        };
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_worker_heartbeat_envelope() {
        let line = r#"{"Event":"WorkerEvent","Data":{"action":"Heartbeat","data":{"sent_at":"2024-01-01T00:00:00Z"}}}"#;
        let event = ServerEvent::parse(line).unwrap().unwrap();
        assert!(matches!(event, ServerEvent::Worker(WorkerEvent::Heartbeat { .. })));
    }

    #[test]
    fn unknown_kinds_are_ignored_rather_than_erroring() {
        let line = r#"{"Event":"SomethingElse","Data":{}}"#;
        assert!(ServerEvent::parse(line).unwrap().is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ServerEvent::parse("not json").is_err());
    }
}

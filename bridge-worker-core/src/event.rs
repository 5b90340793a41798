//! Events delivered over the control channel (`spec.md` §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::toolchain::{HandlerKey, Provider, Toolchain};

/// The action requested by a [`BridgeEvent`]. `Unknown` carries the raw
/// action name the control plane sent so the command processor can echo it
/// back in an error message (`spec.md` §4.H "unknown operation name: …",
/// §8 scenario 3) instead of failing to deserialize the event outright.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BridgeAction {
    Apply,
    Refresh,
    Import,
    Destroy,
    Finalize,
    Unknown(String),
}

impl BridgeAction {
    fn as_wire_str(&self) -> &str {
        match self {
            BridgeAction::Apply => "Apply",
            BridgeAction::Refresh => "Refresh",
            BridgeAction::Import => "Import",
            BridgeAction::Destroy => "Destroy",
            BridgeAction::Finalize => "Finalize",
            BridgeAction::Unknown(name) => name,
        }
    }
}

impl std::fmt::Display for BridgeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

impl Serialize for BridgeAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire_str())
    }
}

impl<'de> Deserialize<'de> for BridgeAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(match name.as_str() {
            "Apply" => BridgeAction::Apply,
            "Refresh" => BridgeAction::Refresh,
            "Import" => BridgeAction::Import,
            "Destroy" => BridgeAction::Destroy,
            "Finalize" => BridgeAction::Finalize,
            _ => BridgeAction::Unknown(name),
        })
    }
}

/// The payload of a [`BridgeEvent`]. All id fields are 128-bit UUIDs;
/// `unit_id` is the serialization key (`spec.md` I1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgePayload {
    pub queued_op_id: Uuid,
    pub toolchain: Toolchain,
    pub provider: Provider,
    pub unit_id: Uuid,
    pub unit_slug: String,
    pub space_id: Uuid,
    pub revision_num: i64,
    #[serde(with = "bytes_as_base64")]
    pub data: Vec<u8>,
    #[serde(with = "bytes_as_base64")]
    pub live_state: Vec<u8>,
    #[serde(with = "bytes_as_base64")]
    pub target_params: Vec<u8>,
    #[serde(with = "bytes_as_base64")]
    pub extra_params: Vec<u8>,
}

impl BridgePayload {
    #[must_use]
    pub fn handler_key(&self) -> HandlerKey {
        HandlerKey::new(self.toolchain.clone(), self.provider.clone())
    }
}

/// A bridge action dispatched to a registered bridge handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub action: BridgeAction,
    pub payload: BridgePayload,
}

/// The action requested by a [`FunctionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionAction {
    InvokeFunctions,
    ListFunctions,
}

/// A request to invoke one or more functions against a unit's data. The
/// serialization key is `unit_id`, falling back to `space_id:unit_slug`,
/// falling back to the sentinel `"default-function-unit"` (`spec.md` §3,
/// §4.E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub toolchain: Option<Toolchain>,
    pub unit_id: Option<Uuid>,
    pub space_id: Option<Uuid>,
    pub unit_slug: Option<String>,
    pub function_name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(with = "bytes_as_base64")]
    pub data: Vec<u8>,
}

impl InvocationRequest {
    /// The per-unit serialization key, following the fallback chain from
    /// `spec.md` §4.E.
    #[must_use]
    pub fn serialization_key(&self) -> String {
        if let Some(unit_id) = self.unit_id {
            return unit_id.to_string();
        }
        if let (Some(space_id), Some(unit_slug)) = (self.space_id, &self.unit_slug) {
            return format!("{space_id}:{unit_slug}");
        }
        "default-function-unit".to_string()
    }
}

/// A function invocation or listing dispatched to a registered function
/// handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionEvent {
    pub action: FunctionAction,
    pub queued_op_id: Uuid,
    pub invocation_request: InvocationRequest,
}

/// Control-plane-initiated events (`spec.md` §3). Currently only a
/// heartbeat carrying the time the control plane sent it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "data")]
pub enum WorkerEvent {
    Heartbeat { sent_at: DateTime<Utc> },
}

pub(crate) use crate::bytes_as_base64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_request_prefers_unit_id_over_space_and_slug() {
        let req = InvocationRequest {
            toolchain: None,
            unit_id: Some(Uuid::nil()),
            space_id: Some(Uuid::max()),
            unit_slug: Some("slug".into()),
            function_name: "len".into(),
            arguments: Value::Null,
            data: vec![],
        };
        assert_eq!(req.serialization_key(), Uuid::nil().to_string());
    }

    #[test]
    fn invocation_request_falls_back_to_space_and_slug() {
        let space_id = Uuid::max();
        let req = InvocationRequest {
            toolchain: None,
            unit_id: None,
            space_id: Some(space_id),
            unit_slug: Some("slug".into()),
            function_name: "len".into(),
            arguments: Value::Null,
            data: vec![],
        };
        assert_eq!(req.serialization_key(), format!("{space_id}:slug"));
    }

    #[test]
    fn invocation_request_falls_back_to_sentinel() {
        let req = InvocationRequest {
            toolchain: None,
            unit_id: None,
            space_id: None,
            unit_slug: None,
            function_name: "len".into(),
            arguments: Value::Null,
            data: vec![],
        };
        assert_eq!(req.serialization_key(), "default-function-unit");
    }

    #[test]
    fn unrecognized_action_names_deserialize_to_unknown() {
        let action: BridgeAction = serde_json::from_str(r#""Frobnicate""#).unwrap();
        assert_eq!(action, BridgeAction::Unknown("Frobnicate".to_string()));
        assert_eq!(serde_json::to_string(&action).unwrap(), r#""Frobnicate""#);
        assert_eq!(action.to_string(), "Frobnicate");
    }

    #[test]
    fn recognized_action_names_round_trip_as_bare_strings() {
        let json = serde_json::to_string(&BridgeAction::Apply).unwrap();
        assert_eq!(json, r#""Apply""#);
        let back: BridgeAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BridgeAction::Apply);
    }

    #[test]
    fn bridge_payload_round_trips_through_json() {
        let payload = BridgePayload {
            queued_op_id: Uuid::new_v4(),
            toolchain: "Kubernetes/YAML".into(),
            provider: "Kubernetes".into(),
            unit_id: Uuid::new_v4(),
            unit_slug: "my-unit".into(),
            space_id: Uuid::new_v4(),
            revision_num: 1,
            data: b"hello".to_vec(),
            live_state: vec![],
            target_params: vec![],
            extra_params: vec![],
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: BridgePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.data, payload.data);
        assert_eq!(back.unit_id, payload.unit_id);
    }
}

//! Serde helper shared by every opaque byte-blob field on the wire
//! (`BridgePayload::data`/`live_state`/..., `ActionResult::data`/
//! `live_state`/`outputs`): encode as a base64 string rather than a JSON
//! array of numbers, matching how the control plane's own `[]byte` fields
//! marshal.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
}

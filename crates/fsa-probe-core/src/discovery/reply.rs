//! Discovery reply classification.

use serde_json::Value;

use crate::error::ReplyError;
use crate::types::ProtocolVersion;

/// Version assumed when a reply carries no `protocol_version` field
pub const DEFAULT_PROTOCOL_VERSION: i64 = 2;

/// Classify a discovery reply datagram.
///
/// Any JSON object is accepted. Extra fields are ignored, and a missing or
/// non-integer `protocol_version` counts as the default.
pub fn parse_reply(data: &[u8]) -> Result<ProtocolVersion, ReplyError> {
    let text = std::str::from_utf8(data)?;
    let json: Value = serde_json::from_str(text)?;

    let object = json.as_object().ok_or(ReplyError::NotAnObject)?;
    let version = object
        .get("protocol_version")
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);

    Ok(ProtocolVersion::from_wire(version))
}

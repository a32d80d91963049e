//! Tone wire payloads
//! Outbound: the initial state frame `vol:<N>`. Inbound: one JSON object per notification.

use std::fmt;

use serde_json::{Map, Value};

use crate::core::bluetooth::constants::{
    MAX_VOLUME, MIN_VOLUME, PAYLOAD_VALUE_KEY, VOLUME_FRAME_PREFIX,
};
use crate::error::{DecodeError, DispatchError};

/// Clamps any integer into the volume range.
pub fn clamp_volume(volume: i64) -> u8 {
    // Within 0..=100 after the clamp, so the cast is lossless
    volume.clamp(MIN_VOLUME, MAX_VOLUME) as u8
}

/// Encodes the initial state frame, e.g. `vol:42`. No terminator.
pub fn encode_volume_frame(volume: i64) -> Vec<u8> {
    format!("{}{}", VOLUME_FRAME_PREFIX, clamp_volume(volume)).into_bytes()
}

/// A decoded notification: a mapping from string keys to JSON values.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    fields: Map<String, Value>,
}

impl DecodedPayload {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The requested volume, clamped into range. `None` when the payload carries no `value`.
    ///
    /// Integers, floats (truncated) and numeric strings are accepted.
    pub fn volume(&self) -> Result<Option<u8>, DispatchError> {
        let Some(value) = self.fields.get(PAYLOAD_VALUE_KEY) else {
            return Ok(None);
        };
        let volume = match value {
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().and_then(truncate)),
            Value::String(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(truncate))
            }
            _ => None,
        };
        volume
            .map(|v| Some(clamp_volume(v)))
            .ok_or_else(|| DispatchError::InvalidValue(value.to_string()))
    }
}

fn truncate(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.trunc() as i64)
}

impl fmt::Display for DecodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.fields) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{:?}", self.fields),
        }
    }
}

/// Decodes text, silently dropping invalid UTF-8 sequences.
fn decode_text(data: &[u8]) -> String {
    data.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Decodes one notification frame into a payload.
pub fn decode_payload(data: &[u8]) -> Result<DecodedPayload, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }
    let text = decode_text(data);
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(fields)) => Ok(DecodedPayload { fields }),
        Ok(_) => Err(DecodeError::NotAnObject),
        Err(e) => Err(DecodeError::Malformed(e.to_string())),
    }
}

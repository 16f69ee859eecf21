//! Inbound frame validation and decoding.

use crate::error::{RealtimeError, RealtimeResult};

use super::types::WireMessage;

/// Validates an inbound frame before decoding.
pub fn validate_inbound(raw: &str, max_size: usize) -> RealtimeResult<()> {
    if raw.len() > max_size {
        return Err(RealtimeError::MalformedMessage(format!(
            "Message exceeds maximum size of {max_size} bytes"
        )));
    }

    if raw.trim().is_empty() {
        return Err(RealtimeError::MalformedMessage("Empty message".to_string()));
    }

    Ok(())
}

/// Validates and decodes an inbound frame.
pub fn decode_inbound(raw: &str, max_size: usize) -> RealtimeResult<WireMessage> {
    validate_inbound(raw, max_size)?;
    serde_json::from_str(raw)
        .map_err(|e| RealtimeError::MalformedMessage(format!("Failed to parse message: {e}")))
}

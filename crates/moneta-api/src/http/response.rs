//! Success envelope for all API responses.
//!
//! Every success body carries `"success": true` alongside the flattened
//! payload:
//! ```json
//! { "success": true, "conversations": [ ... ] }
//! ```

use serde::Serialize;

/// Envelope wrapping a successful response payload.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> Envelope<T> {
    /// Wrap a payload in the success envelope.
    pub fn new(payload: T) -> Self {
        Self {
            success: true,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Payload {
        message: &'static str,
    }

    #[test]
    fn test_envelope_flattens_payload() {
        let envelope = Envelope::new(Payload { message: "deleted" });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json, json!({"success": true, "message": "deleted"}));
    }
}

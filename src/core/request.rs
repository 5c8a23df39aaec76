//! Notification request construction.
//!
//! Turns a hex device token and message options into the (binary token, JSON
//! payload) pair the gateway frame carries. Construction never panics: a bad
//! token or an oversized payload comes back as a typed error the caller can
//! log and drop.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, warn};

use crate::error::{RelayError, Result};

/// Device tokens are fixed-width binary.
pub const DEVICE_TOKEN_LEN: usize = 32;

/// Hard payload cap imposed by the gateway.
pub const MAX_PAYLOAD_BYTES: usize = 256;

/// Options controlling the `aps` dictionary of the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationOptions {
    /// Badge count. `None` leaves the badge unchanged; `Some(0)` clears it.
    pub badge: Option<u32>,

    /// Sound name. `None` or empty means a silent notification.
    pub sound: Option<String>,

    /// Flat custom keys merged into the payload next to `aps`.
    pub context: Option<Map<String, Value>>,

    /// Flag the message as available for background fetch
    /// (`content-available: 1`).
    pub background_wake: bool,
}

impl Default for NotificationOptions {
    fn default() -> Self {
        Self {
            badge: None,
            sound: Some("default".to_string()),
            context: None,
            background_wake: true,
        }
    }
}

/// An immutable, validated notification bound for a single device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Binary device token.
    pub token: [u8; DEVICE_TOKEN_LEN],
    /// Compact UTF-8 JSON payload, at most [`MAX_PAYLOAD_BYTES`] long.
    pub payload: Vec<u8>,
}

impl NotificationRequest {
    /// Build a request from a hex-encoded device token and a message.
    ///
    /// Fails with [`RelayError::InvalidToken`] when the token is not hex or
    /// does not decode to 32 bytes, and with [`RelayError::OversizedPayload`]
    /// when the encoded JSON exceeds 256 bytes. Whitespace-free JSON keeps
    /// short messages comfortably under the cap; non-ASCII text is emitted as
    /// raw UTF-8 rather than `\u` escapes for the same reason.
    pub fn build(token_hex: &str, message: &str, options: &NotificationOptions) -> Result<Self> {
        let mut aps = Map::new();
        aps.insert("alert".to_string(), json!(message));
        if options.background_wake {
            aps.insert("content-available".to_string(), json!(1));
        }
        if let Some(badge) = options.badge {
            aps.insert("badge".to_string(), json!(badge));
        }
        match options.sound.as_deref() {
            Some(sound) if !sound.is_empty() => {
                aps.insert("sound".to_string(), json!(sound));
            }
            _ => {}
        }

        let mut payload = options.context.clone().unwrap_or_default();
        payload.insert("aps".to_string(), Value::Object(aps));

        let payload = serde_json::to_vec(&Value::Object(payload))
            .map_err(|e| RelayError::Config(format!("payload serialization failed: {e}")))?;
        if payload.len() > MAX_PAYLOAD_BYTES {
            error!(bytes = payload.len(), "notification payload too large");
            return Err(RelayError::OversizedPayload(payload.len()));
        }

        let decoded = hex::decode(token_hex).map_err(|_| {
            warn!(token = token_hex, "invalid device token");
            RelayError::InvalidToken(token_hex.to_string())
        })?;
        let token: [u8; DEVICE_TOKEN_LEN] = decoded.try_into().map_err(|_| {
            warn!(token = token_hex, "device token has wrong length");
            RelayError::InvalidToken(token_hex.to_string())
        })?;

        Ok(Self { token, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_hex() -> String {
        "ab".repeat(DEVICE_TOKEN_LEN)
    }

    #[test]
    fn builds_compact_json() {
        let request = NotificationRequest::build(
            &token_hex(),
            "You're up!",
            &NotificationOptions::default(),
        )
        .unwrap();

        assert_eq!(request.token, [0xAB; DEVICE_TOKEN_LEN]);

        let value: Value = serde_json::from_slice(&request.payload).unwrap();
        assert_eq!(value["aps"]["alert"], "You're up!");
        assert_eq!(value["aps"]["sound"], "default");
        assert_eq!(value["aps"]["content-available"], 1);
        assert!(value["aps"].get("badge").is_none());
        // Compact separators, no padding whitespace.
        assert!(!request.payload.contains(&b' '));
    }

    #[test]
    fn badge_zero_is_distinct_from_unset() {
        let options = NotificationOptions {
            badge: Some(0),
            ..Default::default()
        };
        let request = NotificationRequest::build(&token_hex(), "hi", &options).unwrap();
        let value: Value = serde_json::from_slice(&request.payload).unwrap();
        assert_eq!(value["aps"]["badge"], 0);
    }

    #[test]
    fn empty_sound_means_silent() {
        for sound in [None, Some(String::new())] {
            let options = NotificationOptions {
                sound,
                ..Default::default()
            };
            let request = NotificationRequest::build(&token_hex(), "hi", &options).unwrap();
            let value: Value = serde_json::from_slice(&request.payload).unwrap();
            assert!(value["aps"].get("sound").is_none());
        }
    }

    #[test]
    fn context_merged_beside_aps() {
        let mut context = Map::new();
        context.insert("matchId".to_string(), json!("m-41"));
        let options = NotificationOptions {
            context: Some(context),
            ..Default::default()
        };

        let request = NotificationRequest::build(&token_hex(), "Your move", &options).unwrap();
        let value: Value = serde_json::from_slice(&request.payload).unwrap();
        assert_eq!(value["matchId"], "m-41");
        assert_eq!(value["aps"]["alert"], "Your move");
    }

    #[test]
    fn oversized_payload_is_reported_not_panicked() {
        let message = "x".repeat(300);
        let err = NotificationRequest::build(&token_hex(), &message, &Default::default())
            .unwrap_err();
        assert!(matches!(err, RelayError::OversizedPayload(n) if n > MAX_PAYLOAD_BYTES));
    }

    #[test]
    fn invalid_hex_token_rejected() {
        let err = NotificationRequest::build("zz", "hi", &Default::default()).unwrap_err();
        assert!(matches!(err, RelayError::InvalidToken(_)));
    }

    #[test]
    fn short_token_rejected() {
        // Valid hex, wrong width.
        let err = NotificationRequest::build("abcd", "hi", &Default::default()).unwrap_err();
        assert!(matches!(err, RelayError::InvalidToken(_)));
    }

    #[test]
    fn non_ascii_text_stays_utf8() {
        let request =
            NotificationRequest::build(&token_hex(), "réveillé ☀", &Default::default()).unwrap();
        let text = std::str::from_utf8(&request.payload).unwrap();
        assert!(text.contains("réveillé ☀"));
    }
}

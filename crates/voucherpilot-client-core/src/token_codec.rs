//! Reversible token obfuscation for values parked in host roaming settings.
//!
//! This is an encoding, not cryptography: the host storage is already scoped
//! to the signed-in user, and the goal is only to keep raw bearer tokens out
//! of casual settings dumps. The transform must be total — storage corruption
//! degrades to an empty string, never an error.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Encodes a value for storage. Empty input yields an empty string.
#[must_use]
pub fn obfuscate(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    STANDARD.encode(value.as_bytes())
}

/// Decodes a stored value. Invalid base64 or non-UTF-8 payloads yield an
/// empty string so callers can treat any unusable value as "no token".
#[must_use]
pub fn reveal(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    match STANDARD.decode(value.as_bytes()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(decoded) => decoded,
            Err(_) => {
                tracing::warn!(target: "voucherpilot.session", "stored token is not valid utf-8");
                String::new()
            }
        },
        Err(_) => {
            tracing::warn!(target: "voucherpilot.session", "stored token is not valid base64");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obfuscate_round_trips_arbitrary_strings() {
        for value in ["A1", "secret", "töken-越", "a b c", "=="] {
            assert_eq!(reveal(&obfuscate(value)), value);
        }
    }

    #[test]
    fn obfuscate_is_stable_over_round_trip() {
        let once = obfuscate("R1");
        assert_eq!(obfuscate(&reveal(&once)), once);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(obfuscate(""), "");
        assert_eq!(reveal(""), "");
    }

    #[test]
    fn invalid_base64_reveals_as_empty() {
        assert_eq!(reveal("%%% not base64 %%%"), "");
    }

    #[test]
    fn non_utf8_payload_reveals_as_empty() {
        let encoded = STANDARD.encode([0xff, 0xfe, 0xfd]);
        assert_eq!(reveal(&encoded), "");
    }
}

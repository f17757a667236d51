//! Pretty-print / compact transforms for node payloads.
//!
//! Both directions fail open: text that does not parse as JSON is returned
//! unchanged, with a debug trace and nothing surfaced to the user.

use serde_json::Value;
use tracing::debug;

use crate::error::FormatError;

fn parse(text: &str) -> Result<Value, FormatError> {
    Ok(serde_json::from_str::<Value>(text)?)
}

/// Re-serializes `text` as indented, multi-line JSON.
///
/// Key order and number literals are preserved, so the result formats to
/// itself and compacts back to the same value.
pub fn format(text: &str) -> String {
    match parse(text).and_then(|value| Ok(serde_json::to_string_pretty(&value)?)) {
        Ok(pretty) => pretty,
        Err(e) => {
            debug!("Leaving payload unformatted: {}", e);
            text.to_string()
        }
    }
}

/// Strips all insignificant whitespace from `text` if it is JSON.
pub fn unformat(text: &str) -> String {
    match parse(text).and_then(|value| Ok(serde_json::to_string(&value)?)) {
        Ok(compact) => compact,
        Err(e) => {
            debug!("Leaving payload as-is: {}", e);
            text.to_string()
        }
    }
}

/// Whether `text` is structured data the transforms act on.
pub fn is_structured(text: &str) -> bool {
    parse(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_compact_object() {
        assert_eq!(format(r#"{"a":1}"#), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn unformat_compacts_indented_json() {
        let pretty = "{\n  \"name\": \"zk\",\n  \"ports\": [\n    2181,\n    2888\n  ]\n}";
        assert_eq!(unformat(pretty), r#"{"name":"zk","ports":[2181,2888]}"#);
    }

    #[test]
    fn key_order_survives() {
        let text = r#"{"z":1,"a":2,"m":3}"#;
        assert_eq!(unformat(&format(text)), text);
    }

    #[test]
    fn number_literals_survive() {
        let text = r#"{"big":123456789012345678901234567890,"f":1.50}"#;
        assert_eq!(unformat(&format(text)), text);
    }

    #[test]
    fn invalid_input_passes_through() {
        for text in ["not json {{{", "", "   ", "key=value", "{\"a\":}"] {
            assert_eq!(format(text), text);
            assert_eq!(unformat(text), text);
        }
    }

    #[test]
    fn transforms_are_idempotent() {
        let text = r#"{"a":[1,{"b":null}],"c":"d"}"#;
        let once = format(text);
        assert_eq!(format(&once), once);
        let compact = unformat(&once);
        assert_eq!(unformat(&compact), compact);
    }

    #[test]
    fn scalars_are_structured() {
        assert!(is_structured("42"));
        assert!(is_structured("\"text\""));
        assert!(!is_structured("plain text"));
    }
}

//! Property tests for the text transforms and the highlight engine.

use proptest::prelude::*;
use serde_json::{Map, Value};
use zooinspector::find_matches;
use zooinspector::format::{format, unformat};

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 \"\\\\/\u{e9}\u{4e2d}]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..6).prop_map(|entries| {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key, value);
                }
                Value::Object(map)
            }),
        ]
    })
}

fn fold(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

proptest! {
    #[test]
    fn unformat_undoes_format(value in json_value()) {
        let compact = serde_json::to_string(&value).unwrap();
        let round_trip = unformat(&format(&compact));
        prop_assert_eq!(serde_json::from_str::<Value>(&round_trip).unwrap(), value);
        prop_assert_eq!(round_trip, compact);
    }

    #[test]
    fn formatted_json_keeps_its_value(value in json_value()) {
        let pretty = format(&serde_json::to_string(&value).unwrap());
        prop_assert_eq!(serde_json::from_str::<Value>(&pretty).unwrap(), value);
    }

    #[test]
    fn transforms_are_idempotent(text in any::<String>()) {
        let once = format(&text);
        prop_assert_eq!(format(&once), once);
        let once = unformat(&text);
        prop_assert_eq!(unformat(&once), once);
    }

    #[test]
    fn unparseable_text_passes_through(text in any::<String>()) {
        prop_assume!(serde_json::from_str::<Value>(&text).is_err());
        prop_assert_eq!(format(&text), text.clone());
        prop_assert_eq!(unformat(&text), text);
    }

    #[test]
    fn empty_query_never_matches(text in any::<String>()) {
        prop_assert!(find_matches(&text, "").is_empty());
    }

    #[test]
    fn spans_are_ordered_disjoint_case_insensitive_hits(
        text in "[aAbB\u{df}\u{130}\u{131} ]{0,40}",
        needle in "[aAbB\u{df}]{1,3}",
    ) {
        let matches = find_matches(&text, &needle);
        let mut previous_end = 0;
        for span in &matches {
            prop_assert!(span.start >= previous_end);
            prop_assert!(span.start < span.end);
            prop_assert!(text.is_char_boundary(span.start));
            prop_assert!(text.is_char_boundary(span.end));
            prop_assert_eq!(fold(&text[span.range()]), fold(&needle));
            previous_end = span.end;
        }
    }

    #[test]
    fn ascii_hits_match_a_plain_lowercase_scan(
        text in "[a-cA-C ]{0,60}",
        needle in "[a-cA-C]{1,3}",
    ) {
        let expected: Vec<usize> = text
            .to_ascii_lowercase()
            .match_indices(&needle.to_ascii_lowercase())
            .map(|(start, _)| start)
            .collect();
        let found: Vec<usize> = find_matches(&text, &needle).iter().map(|s| s.start).collect();
        prop_assert_eq!(found, expected);
    }
}

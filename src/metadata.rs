//! User metadata key transcoding.
//!
//! Object stores carry user metadata in HTTP headers, which are
//! case-insensitive and come back lower-cased. Keys are therefore stored in
//! snake_case (`contentType` -> `content_type`) and turned back into
//! camelCase when read. Values are never touched.

use std::collections::HashMap;

/// Convert camelCase keys to their stored snake_case form.
pub fn to_stored(metadata: Option<&HashMap<String, String>>) -> Option<HashMap<String, String>> {
    metadata.map(|m| {
        m.iter()
            .map(|(key, value)| (stored_key(key), value.clone()))
            .collect()
    })
}

/// Convert stored snake_case keys back to camelCase.
pub fn to_retrieved(
    metadata: Option<&HashMap<String, String>>,
) -> Option<HashMap<String, String>> {
    metadata.map(|m| {
        m.iter()
            .map(|(key, value)| (retrieved_key(key), value.clone()))
            .collect()
    })
}

fn stored_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(c);
    }
    out.to_lowercase()
}

fn retrieved_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' {
            if let Some(next) = chars.peek().copied().filter(char::is_ascii_lowercase) {
                chars.next();
                out.push(next.to_ascii_uppercase());
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_to_stored() {
        let stored = to_stored(Some(&map(&[
            ("contentType", "text/yaml"),
            ("executionId", "AbC"),
            ("plain", "v"),
        ])))
        .unwrap();
        assert_eq!(
            stored,
            map(&[
                ("content_type", "text/yaml"),
                ("execution_id", "AbC"),
                ("plain", "v"),
            ])
        );
    }

    #[test]
    fn test_to_retrieved() {
        let retrieved =
            to_retrieved(Some(&map(&[("content_type", "x"), ("a_b_c", "y")]))).unwrap();
        assert_eq!(retrieved, map(&[("contentType", "x"), ("aBC", "y")]));
    }

    #[test]
    fn test_none_preserved() {
        assert_eq!(to_stored(None), None);
        assert_eq!(to_retrieved(None), None);
    }

    #[test]
    fn test_empty_preserved() {
        assert_eq!(to_stored(Some(&HashMap::new())), Some(HashMap::new()));
    }

    #[test]
    fn test_round_trip_letter_keys() {
        let original = map(&[
            ("contentType", "application/json"),
            ("flowRevisionNumber", "3"),
            ("a", "1"),
            ("someVeryLongCamelCaseKeyName", "value with Spaces_And_Underscores"),
        ]);
        let back = to_retrieved(to_stored(Some(&original)).as_ref()).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_underscore_before_non_letter_kept() {
        assert_eq!(retrieved_key("key_1"), "key_1");
        assert_eq!(retrieved_key("trailing_"), "trailing_");
        assert_eq!(retrieved_key("upper_A"), "upper_A");
    }

    #[test]
    fn test_stored_key_consecutive_capitals() {
        assert_eq!(stored_key("fileURL"), "file_u_r_l");
        assert_eq!(retrieved_key("file_u_r_l"), "fileURL");
    }
}

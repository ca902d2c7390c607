//! Masking of sensitive values
//!
//! Two geometries for single strings:
//!
//! - [`mask`] reveals both edges and hides the middle
//! - [`mask_margin`] hides both edges and reveals the middle
//!
//! and a body-level masker that rewrites decoded JSON objects by field name
//! before they reach the log.
//!
//! Positions count `char`s, never bytes, so multi-byte text is never split.

use crate::config::MaskSet;
use crate::extract::Masker;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Keep the first `start` and last `end` characters of `s`, replacing the
/// rest with `mask_char`.
///
/// When `start + end` covers the whole string every character is masked,
/// so the length is preserved but nothing is revealed.
///
/// ```
/// use fieldlog::mask::mask;
///
/// assert_eq!(mask("1234567890", 2, 2, '*'), "12******90");
/// assert_eq!(mask("abc", 5, 5, '*'), "***");
/// ```
pub fn mask(s: &str, start: usize, end: usize, mask_char: char) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    if start.saturating_add(end) >= len {
        return std::iter::repeat(mask_char).take(len).collect();
    }

    let mut out = String::with_capacity(s.len());
    out.extend(&chars[..start]);
    out.extend(std::iter::repeat(mask_char).take(len - start - end));
    out.extend(&chars[len - end..]);
    out
}

/// Reveal only the characters in `[start, end)`, masking everything before
/// and after.
///
/// Returns an empty string when `start >= end`. A `start` past the end of
/// the string masks it entirely; an `end` past the end reveals everything
/// from `start` on.
///
/// ```
/// use fieldlog::mask::mask_margin;
///
/// assert_eq!(mask_margin("1234567890", 2, 8, '*'), "**345678**");
/// assert_eq!(mask_margin("abc", 2, 1, '*'), "");
/// ```
pub fn mask_margin(s: &str, start: usize, end: usize, mask_char: char) -> String {
    if start >= end {
        return String::new();
    }
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    if start >= len {
        return std::iter::repeat(mask_char).take(len).collect();
    }

    let mut out = String::with_capacity(s.len());
    out.extend(std::iter::repeat(mask_char).take(start));
    if end >= len {
        out.extend(&chars[start..]);
    } else {
        out.extend(&chars[start..end]);
        out.extend(std::iter::repeat(mask_char).take(len - end));
    }
    out
}

/// Callback that masks a decoded request or response body in place.
pub trait BodyMasker: Send + Sync {
    /// Rewrite sensitive entries of `body`
    fn mask_body(&self, body: &mut Map<String, Value>);
}

impl<F> BodyMasker for F
where
    F: Fn(&mut Map<String, Value>) + Send + Sync,
{
    fn mask_body(&self, body: &mut Map<String, Value>) {
        self(body)
    }
}

/// Masks every value stored under one of a set of field names, at any depth.
///
/// Objects and arrays are walked recursively. Strings under a listed key go
/// through the wrapped [`Masker`]; numbers and booleans are masked through
/// their string form. Objects, arrays and nulls under a listed key are
/// descended into rather than replaced.
///
/// ```
/// use fieldlog::mask::{mask, BodyMasker, FieldMasker};
/// use serde_json::json;
///
/// let masker = FieldMasker::new(["password"], |_: &str, v: &str| mask(v, 1, 1, '*'));
/// let mut body = json!({"user": {"password": "hunter2"}});
/// masker.mask_body(body.as_object_mut().unwrap());
/// assert_eq!(body["user"]["password"], "h*****2");
/// ```
#[derive(Clone)]
pub struct FieldMasker {
    fields: MaskSet,
    masker: Arc<dyn Masker>,
}

impl FieldMasker {
    /// Mask the listed `fields` with `masker`
    pub fn new<I, S>(fields: I, masker: impl Masker + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            masker: Arc::new(masker),
        }
    }

    /// Field names this masker rewrites
    pub fn fields(&self) -> &MaskSet {
        &self.fields
    }

    fn mask_value(&self, key: Option<&str>, value: &mut Value) {
        let masked_key = key.filter(|k| self.fields.contains(*k));
        match value {
            Value::Object(map) => self.mask_map(map),
            Value::Array(items) => {
                for item in items {
                    self.mask_value(key, item);
                }
            }
            Value::String(s) => {
                if let Some(k) = masked_key {
                    *s = self.masker.mask(k, s);
                }
            }
            Value::Number(_) | Value::Bool(_) => {
                if let Some(k) = masked_key {
                    let text = value.to_string();
                    *value = Value::String(self.masker.mask(k, &text));
                }
            }
            Value::Null => {}
        }
    }

    fn mask_map(&self, map: &mut Map<String, Value>) {
        for (key, value) in map.iter_mut() {
            self.mask_value(Some(key.as_str()), value);
        }
    }
}

impl BodyMasker for FieldMasker {
    fn mask_body(&self, body: &mut Map<String, Value>) {
        self.mask_map(body);
    }
}

impl std::fmt::Debug for FieldMasker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldMasker")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Turn a raw body into the value that gets logged.
///
/// Without a masker the raw text is logged unchanged. Otherwise the body is
/// decoded as a JSON object and masked; a body that is not a JSON object (or
/// is an empty one) is logged as raw text. In `string_format` mode the
/// masked object is re-serialized to a string, falling back to the raw text
/// if that fails.
pub fn mask_body_value(raw: &str, masker: Option<&dyn BodyMasker>, string_format: bool) -> Value {
    let Some(masker) = masker else {
        return Value::String(raw.to_string());
    };

    let mut body = match serde_json::from_str::<Map<String, Value>>(raw) {
        Ok(map) if !map.is_empty() => map,
        _ => return Value::String(raw.to_string()),
    };
    masker.mask_body(&mut body);

    if !string_format {
        return Value::Object(body);
    }
    match serde_json::to_string(&body) {
        Ok(text) => Value::String(text),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize masked body");
            Value::String(raw.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn edge_reveal() {
        assert_eq!(mask("1234567890", 2, 2, '*'), "12******90");
        assert_eq!(mask("abc", 5, 5, '*'), "***");
        assert_eq!(mask("abcd", 2, 2, '#'), "####");
        assert_eq!(mask("abcde", 0, 0, 'x'), "xxxxx");
        assert_eq!(mask("", 1, 1, '*'), "");
        assert_eq!(mask("päßwörd", 1, 1, '*'), "p*****d");
    }

    #[test]
    fn margin_reveal() {
        assert_eq!(mask_margin("1234567890", 2, 8, '*'), "**345678**");
        assert_eq!(mask_margin("abc", 2, 1, '*'), "");
        assert_eq!(mask_margin("abc", 1, 1, '*'), "");
        assert_eq!(mask_margin("abc", 5, 9, '*'), "***");
        assert_eq!(mask_margin("abcdef", 2, 100, '*'), "**cdef");
        assert_eq!(mask_margin("éléphant", 0, 3, '-'), "élé-----");
    }

    #[test]
    fn field_masker_walks_nested_objects_and_arrays() {
        let masker = FieldMasker::new(["card", "pin"], |_: &str, v: &str| mask(v, 0, 4, '*'));
        let mut body = json!({
            "card": "4111111111111111",
            "owner": "bob",
            "history": [{"card": "5500000000000004"}, {"note": "ok"}],
            "pin": 123456,
            "nested": {"pin": true, "other": 1}
        });
        masker.mask_body(body.as_object_mut().unwrap());

        assert_eq!(body["card"], "************1111");
        assert_eq!(body["owner"], "bob");
        assert_eq!(body["history"][0]["card"], "************0004");
        assert_eq!(body["history"][1]["note"], "ok");
        assert_eq!(body["pin"], "**3456");
        assert_eq!(body["nested"]["pin"], "****");
        assert_eq!(body["nested"]["other"], 1);
    }

    #[test]
    fn masked_key_holding_list_of_strings() {
        let masker = FieldMasker::new(["tags"], |_: &str, v: &str| "*".repeat(v.len()));
        let mut body = json!({"tags": ["ab", "cde"]});
        masker.mask_body(body.as_object_mut().unwrap());
        assert_eq!(body["tags"], json!(["**", "***"]));
    }

    #[test]
    fn body_value_object_and_string_modes() {
        let masker = FieldMasker::new(["password"], |_: &str, v: &str| mask(v, 0, 0, '*'));
        let raw = r#"{"user":"alice","password":"secret"}"#;

        let object = mask_body_value(raw, Some(&masker), false);
        assert_eq!(object, json!({"user": "alice", "password": "******"}));

        let string = mask_body_value(raw, Some(&masker), true);
        let reparsed: Value = serde_json::from_str(string.as_str().unwrap()).unwrap();
        assert_eq!(reparsed, json!({"user": "alice", "password": "******"}));
    }

    #[test]
    fn body_value_degrades_to_raw_text() {
        let masker = |body: &mut Map<String, Value>| {
            body.insert("touched".into(), json!(true));
        };
        assert_eq!(
            mask_body_value("not json", Some(&masker), false),
            json!("not json")
        );
        assert_eq!(mask_body_value("[1,2]", Some(&masker), false), json!("[1,2]"));
        assert_eq!(mask_body_value("{}", Some(&masker), false), json!("{}"));
        assert_eq!(
            mask_body_value(r#"{"a":1}"#, None, false),
            json!(r#"{"a":1}"#)
        );
    }

    proptest! {
        #[test]
        fn mask_is_total_and_length_preserving(s in "\\PC{0,40}", start in 0usize..60, end in 0usize..60) {
            let out = mask(&s, start, end, '*');
            prop_assert_eq!(out.chars().count(), s.chars().count());
        }

        #[test]
        fn mask_margin_is_total(s in "\\PC{0,40}", start in 0usize..60, end in 0usize..60) {
            let out = mask_margin(&s, start, end, '*');
            if start >= end {
                prop_assert!(out.is_empty());
            } else {
                prop_assert_eq!(out.chars().count(), s.chars().count());
            }
        }

        #[test]
        fn field_masking_is_idempotent(secret in "[a-zA-Z0-9]{0,24}", other in "[a-z]{0,10}") {
            let masker = FieldMasker::new(["secret"], |_: &str, v: &str| mask(v, 2, 2, '*'));
            let mut once = json!({"secret": secret.clone(), "other": other, "inner": {"secret": secret}});
            masker.mask_body(once.as_object_mut().unwrap());
            let mut twice = once.clone();
            masker.mask_body(twice.as_object_mut().unwrap());
            prop_assert_eq!(once, twice);
        }
    }
}

//! Dotted-path field extraction from JSON bodies
//!
//! Paths such as `"user.profile.email"` are resolved key by key. Extraction
//! never fails: a path that runs into a non-object stops there and yields
//! whatever value was reached.

use crate::config::{FieldSpec, MaskSet};
use crate::fields::Fields;
use serde_json::Value;

/// Per-field masking callback used during extraction.
///
/// Receives the output field name and the extracted string and returns the
/// value to log in its place.
pub trait Masker: Send + Sync {
    /// Mask `value` extracted into the field `field`
    fn mask(&self, field: &str, value: &str) -> String;
}

impl<F> Masker for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn mask(&self, field: &str, value: &str) -> String {
        self(field, value)
    }
}

/// Resolve a dotted `path` against `tree`.
///
/// Descends while the current value is an object holding the next key. At
/// the first key that cannot be followed the current value is returned, so
/// `value_of({"a": 5}, "a.b")` yields `5`. Only a missing key on an object
/// yields `None`.
pub fn value_of<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = tree;
    for key in path.split('.') {
        match current {
            Value::Object(map) => match map.get(key) {
                Some(next) => current = next,
                None => return None,
            },
            _ => return Some(current),
        }
    }
    Some(current)
}

/// Pull every field of `spec` out of `body`.
///
/// Null and unresolved values are left out, as are empty strings. A string
/// whose output name is in `masks` goes through `masker` when one is given.
/// Other values are copied unchanged. Non-object bodies yield no fields.
pub fn extract_fields(
    body: &Value,
    spec: &FieldSpec,
    masks: &MaskSet,
    masker: Option<&dyn Masker>,
) -> Fields {
    let mut fields = Fields::new();
    if !body.is_object() {
        return fields;
    }

    for (name, path) in spec {
        match value_of(body, path) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => {
                if s.is_empty() {
                    continue;
                }
                let value = match masker {
                    Some(masker) if masks.contains(name) => masker.mask(name, s),
                    _ => s.clone(),
                };
                fields.insert(name.clone(), Value::String(value));
            }
            Some(other) => {
                fields.insert(name.clone(), other.clone());
            }
        }
    }
    fields
}

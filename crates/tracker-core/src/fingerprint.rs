//! Fingerprinting (`spec.md` §3 `TrackerPayload` invariant, §9 Open Question).

use serde_json::Value;
use sha1::{Digest, Sha1};

/// Recursively sort object keys so two structurally-equal values with
/// keys inserted in different orders serialize identically.
///
/// This is the only canonicalization step; numeric formatting and
/// string escaping are left to `serde_json`, pinning the two behaviors
/// `spec.md` §9 leaves ambiguous (see `SPEC_FULL.md` §3.1).
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), sort_keys(v));
            }
            Value::Object(out)
        },
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Compute the SHA-1 hex digest of `value` with all object keys
/// sorted, excluding nothing (callers are responsible for excluding
/// `events`/`metadata` before calling this, per `spec.md` §3).
#[must_use]
pub fn fingerprint(value: &Value) -> String {
    let canonical = sort_keys(value);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stable_under_key_reordering() {
        let a = json!({"source": {"id": "src-A"}, "properties": {"x": 1, "y": 2}});
        let b = json!({"properties": {"y": 2, "x": 1}, "source": {"id": "src-A"}});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn differs_on_value_change() {
        let a = json!({"properties": {"x": 1}});
        let b = json!({"properties": {"x": 2}});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}

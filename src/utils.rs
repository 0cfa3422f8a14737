//! Small shared helpers: timestamps and response envelopes.

use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current instant formatted as ISO-8601 / RFC3339, e.g. `2026-07-27T00:00:00Z`.
pub fn now_iso8601() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Build a fresh `req_<uuid>` request id.
pub fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4())
}

/// Wrap `data` in the standard success envelope, merging any extra
/// `meta` fields the caller supplies (e.g. pagination).
pub fn envelope<T: Serialize>(data: T, request_id: &str, extra_meta: Option<Value>) -> Value {
    let mut meta = json!({
        "request_id": request_id,
        "timestamp": now_iso8601(),
    });
    if let Some(extra) = extra_meta
        && let (Some(meta_obj), Value::Object(extra_obj)) = (meta.as_object_mut(), extra)
    {
        for (k, v) in extra_obj {
            meta_obj.insert(k, v);
        }
    }
    json!({ "data": data, "meta": meta })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_prefixed_and_unique() {
        let a = new_request_id();
        let b = new_request_id();
        assert!(a.starts_with("req_"));
        assert_ne!(a, b);
    }
}

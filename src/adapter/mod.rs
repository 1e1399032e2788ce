//! Transport adapters: the code that turns a concrete transport's request
//! shape into `Request`/`Response` and drives it through
//! [`crate::dispatcher::handle`].
//!
//! Both adapters share the same serialization rules for the parts that
//! aren't transport-specific (the JSON envelope a structured body becomes,
//! and how `Response.revisions` turns into `Set-Cookie` values) so they
//! live here instead of being duplicated in `native`/`fetch`.

pub mod fetch;
pub mod native;

use crate::cookie::render_set_cookie;
use crate::response::{Body, Response};

/// Serializes a structured (`Json`) body into the envelope both adapters
/// write to the wire: `{code, status, results, error?, errors?, total?}`.
/// String/Bytes/Stream bodies bypass this and pass through untouched.
pub fn json_envelope(res: &Response) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert("code".into(), serde_json::Value::from(res.code));
    map.insert("status".into(), serde_json::Value::from(res.status.clone()));
    if let Body::Json(value) = &res.body {
        map.insert("results".into(), value.clone());
    }
    if let Some(total) = res.total {
        map.insert("total".into(), serde_json::Value::from(total));
    }
    if let Some(error) = &res.error {
        map.insert("error".into(), serde_json::Value::from(error.clone()));
    }
    if !res.errors.is_empty() {
        map.insert(
            "errors".into(),
            serde_json::to_value(&res.errors).unwrap_or(serde_json::Value::Null),
        );
    }
    if !res.stack.is_empty() {
        map.insert(
            "stack".into(),
            serde_json::to_value(&res.stack).unwrap_or(serde_json::Value::Null),
        );
    }
    serde_json::Value::Object(map)
}

/// Renders every recorded cookie intent into its `Set-Cookie` header
/// value, in the order the revisions map happens to iterate (cookie
/// order isn't meaningful to clients).
pub fn cookie_headers(res: &Response) -> Vec<String> {
    res.revisions
        .iter()
        .map(|(name, intent)| render_set_cookie(name, intent))
        .collect()
}

/// Buffers whatever `res.body` holds into bytes, applying the JSON
/// envelope to a structured body. Callers that care about a streamed
/// body must check `res.take_stream()` first; this only covers the
/// non-stream variants.
pub fn render_body_bytes(res: &Response) -> Vec<u8> {
    match &res.body {
        Body::Null => Vec::new(),
        Body::String(s) => s.clone().into_bytes(),
        Body::Bytes(b) => b.clone(),
        Body::Json(_) => json_envelope(res).to_string().into_bytes(),
        // Never actually constructed; `Response::set_stream` tracks a
        // streamed body out-of-band, not through this variant.
        Body::Stream => Vec::new(),
    }
}

/// The `Content-Type` to assume when a listener left `res.mimetype`
/// unset: JSON for a structured body, otherwise plain text.
pub fn default_mimetype(res: &Response) -> String {
    if matches!(res.body, Body::Json(_)) {
        "application/json".to_string()
    } else {
        "text/plain".to_string()
    }
}

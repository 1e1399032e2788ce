//! The mutable response value a listener chain fills in, then the
//! adapter-supplied dispatch callback flushes to the wire exactly once.
//!
//! Setter semantics mirror the teacher's `firework/src/response.rs`
//! builder methods (`.text()`, `.json()`, `.with_header()`), generalized
//! to the mutating setter shapes plus `session.revisions` bookkeeping.

use crate::cookie::{CookieIntent, CookieOptions};
use crate::status::reason_phrase;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The shape `Response.body` holds. `type()` derives the spec's `"type"`
/// field from this tag rather than storing it redundantly.
#[derive(Debug, Clone)]
pub enum Body {
    Null,
    String(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    /// A byte stream. Not `Clone`; swapping it out replaces the whole
    /// variant, matching the teacher's `ResponseBody::Stream`.
    Stream,
}

impl Body {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Body::Null => "null",
            Body::String(_) => "string",
            Body::Bytes(_) => "string",
            Body::Json(serde_json::Value::Array(_)) => "array",
            Body::Json(_) => "object",
            Body::Stream => "stream",
        }
    }
}

pub type DispatchFn = Arc<
    dyn for<'a> Fn(&'a mut Response) -> Pin<Box<dyn Future<Output = crate::Result<()>> + Send + 'a>>
        + Send
        + Sync,
>;

/// A single streamed chunk source, set by a listener that wants to pipe
/// data directly rather than buffer a full body. Boxed as `Send` so the
/// adapter can poll it from its own task.
pub type StreamReader = Pin<Box<dyn tokio::io::AsyncRead + Send>>;

pub struct Response {
    pub code: u16,
    pub status: String,
    pub mimetype: String,
    pub body: Body,
    pub total: Option<usize>,
    pub headers: HashMap<String, Vec<String>>,
    pub revisions: HashMap<String, CookieIntent>,
    pub error: Option<String>,
    pub errors: HashMap<String, Vec<String>>,
    pub stack: Vec<String>,
    pub sent: bool,

    stream: Option<StreamReader>,
    dispatcher: Option<DispatchFn>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("code", &self.code)
            .field("status", &self.status)
            .field("mimetype", &self.mimetype)
            .field("body_type", &self.body.type_tag())
            .field("sent", &self.sent)
            .finish()
    }
}

impl Response {
    pub fn new(dispatcher: Option<DispatchFn>) -> Self {
        Self {
            code: 0,
            status: String::new(),
            mimetype: String::new(),
            body: Body::Null,
            total: None,
            headers: HashMap::new(),
            revisions: HashMap::new(),
            error: None,
            errors: HashMap::new(),
            stack: Vec::new(),
            sent: false,
            stream: None,
            dispatcher,
        }
    }

    /// True while neither a listener has set a body/stream nor a status
    /// code, the condition the dispatcher uses to decide whether to try
    /// the `"METHOD /**"` fallback and then the synthesized 404.
    pub fn body_unset(&self) -> bool {
        self.code == 0 && self.stream.is_none() && matches!(self.body, Body::Null)
    }

    /// Derived `type` field: the tag of whatever `body` currently holds.
    pub fn type_tag(&self) -> &'static str {
        if self.stream.is_some() {
            "stream"
        } else {
            self.body.type_tag()
        }
    }

    /// Assigning `code` when `status` is still empty auto-fills `status`
    /// from the reason-phrase table, per §4.5.
    pub fn set_code(&mut self, code: u16) {
        self.code = code;
        if self.status.is_empty() {
            self.status = reason_phrase(code).to_string();
        }
    }

    pub fn set_status(&mut self, code: u16, status: impl Into<String>) {
        self.code = code;
        self.status = status.into();
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// `setError(msg)`: `{code: 400, status: "Bad Request", error: msg}`.
    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.set_error_full(msg, HashMap::new(), Vec::new(), None, None);
    }

    /// Full overload covering `(msg, errors, stack, code?, status?)`.
    pub fn set_error_full(
        &mut self,
        msg: impl Into<String>,
        errors: HashMap<String, Vec<String>>,
        stack: Vec<String>,
        code: Option<u16>,
        status: Option<String>,
    ) {
        self.error = Some(msg.into());
        self.errors = errors;
        self.stack = stack;
        let code = code.unwrap_or(400);
        match status {
            Some(status) => self.set_status(code, status),
            None => self.set_code(code),
        }
    }

    pub fn set_html(&mut self, body: impl Into<String>) {
        self.set_code(200);
        self.mimetype = "text/html".to_string();
        self.body = Body::String(body.into());
    }

    /// Unlike `setResults`, the body is serialized here and passed to the
    /// transport as a plain string, so it reaches the wire untouched by
    /// the `{code, status, results, …}` envelope that a structured
    /// (`Body::Json`) body gets.
    pub fn set_json(&mut self, value: impl serde::Serialize) {
        self.set_code(200);
        self.mimetype = "text/json".to_string();
        let text = serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string());
        self.body = Body::String(text);
    }

    pub fn set_xml(&mut self, body: impl Into<String>) {
        self.set_code(200);
        self.mimetype = "text/xml".to_string();
        self.body = Body::String(body.into());
    }

    /// `setResults(obj)`: body kept structured; the transport adapter
    /// serializes it at dispatch time rather than here.
    pub fn set_results(&mut self, value: impl serde::Serialize) {
        self.set_code(200);
        self.mimetype = "text/json".to_string();
        self.body = Body::Json(serde_json::to_value(value).unwrap_or(serde_json::Value::Null));
    }

    pub fn set_rows(&mut self, value: impl serde::Serialize, total: usize) {
        self.set_results(value);
        self.total = Some(total);
    }

    /// Leaves `code` untouched unless it is still unset (`0`).
    pub fn set_body(&mut self, mimetype: impl Into<String>, value: Body) {
        self.mimetype = mimetype.into();
        self.body = value;
        if self.code == 0 {
            self.set_code(200);
        }
    }

    pub fn set_stream(&mut self, reader: StreamReader) {
        self.stream = Some(reader);
        if self.code == 0 {
            self.set_code(200);
        }
    }

    pub fn take_stream(&mut self) -> Option<StreamReader> {
        self.stream.take()
    }

    pub fn redirect(&mut self, url: impl Into<String>) {
        self.set_status(302, "Found");
        self.set_header("Location", url);
    }

    /// Records cookie intent for the adapter to serialize as `Set-Cookie`;
    /// a later call for the same name overwrites the earlier intent.
    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set_cookie_with_options(name, value, CookieOptions::default());
    }

    pub fn set_cookie_with_options(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        options: CookieOptions,
    ) {
        self.revisions.insert(
            name.into(),
            CookieIntent::Set {
                value: value.into(),
                options,
            },
        );
    }

    pub fn remove_cookie(&mut self, name: impl Into<String>) {
        self.revisions.insert(name.into(), CookieIntent::Remove);
    }

    /// Prevents the automatic post-chain dispatch (a listener piping
    /// directly to the native socket, say) without invoking the
    /// dispatcher callback.
    pub fn stop(&mut self) {
        self.sent = true;
    }

    /// Runs the adapter-supplied dispatch callback exactly once, per
    /// §4.5. A second call is a no-op by construction of the dispatcher,
    /// which only invokes this when `sent == false`.
    pub async fn dispatch(&mut self) -> crate::Result<()> {
        if self.sent {
            return Ok(());
        }
        self.sent = true;
        if let Some(dispatcher) = self.dispatcher.clone() {
            dispatcher(self).await?;
        }
        Ok(())
    }

    // -- builder-style chainable helpers, folded in alongside the mutating
    // setters above; both operate on the same underlying fields. --

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.set_code(200);
        self.mimetype = "text/plain".to_string();
        self.body = Body::String(body.into());
        self
    }

    pub fn json(mut self, value: impl serde::Serialize) -> Self {
        self.set_json(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_error_defaults_to_400_bad_request() {
        let mut res = Response::new(None);
        res.set_error("missing field");
        assert_eq!(res.code, 400);
        assert_eq!(res.status, "Bad Request");
        assert_eq!(res.error.as_deref(), Some("missing field"));
    }

    #[test]
    fn set_code_autofills_status_once() {
        let mut res = Response::new(None);
        res.set_code(404);
        assert_eq!(res.status, "Not Found");
        res.status = "Custom".to_string();
        res.set_code(404);
        assert_eq!(res.status, "Custom");
    }

    #[test]
    fn set_body_only_sets_code_when_unset() {
        let mut res = Response::new(None);
        res.set_code(201);
        res.set_body("text/plain", Body::String("ok".into()));
        assert_eq!(res.code, 201);
    }

    #[test]
    fn set_json_stores_a_plain_serialized_string() {
        let mut res = Response::new(None);
        res.set_json(serde_json::json!({"a": 1}));
        match &res.body {
            Body::String(text) => {
                let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
                assert_eq!(parsed, serde_json::json!({"a": 1}));
            }
            other => panic!("expected a string body, got {other:?}"),
        }
    }

    #[test]
    fn set_results_keeps_a_structured_body() {
        let mut res = Response::new(None);
        res.set_results(serde_json::json!({"a": 1}));
        assert!(matches!(res.body, Body::Json(_)));
    }

    #[test]
    fn redirect_sets_found_and_location() {
        let mut res = Response::new(None);
        res.redirect("/login");
        assert_eq!(res.code, 302);
        assert_eq!(res.status, "Found");
        assert_eq!(res.headers.get("Location").unwrap()[0], "/login");
    }

    #[tokio::test]
    async fn dispatch_runs_exactly_once() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls2 = calls.clone();
        let dispatcher: DispatchFn = Arc::new(move |_res| {
            calls2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        });
        let mut res = Response::new(Some(dispatcher));
        res.dispatch().await.unwrap();
        res.dispatch().await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(res.sent);
    }

    #[test]
    fn stop_marks_sent_without_dispatcher() {
        let mut res = Response::new(None);
        res.stop();
        assert!(res.sent);
    }
}

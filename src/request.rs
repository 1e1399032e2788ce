//! The mutable request value threaded through a listener chain.
//!
//! Field layout follows the teacher's `core/src/request.rs` (`Method`,
//! `Context` as a `TypeId`-keyed side table) generalized to the merged
//! `data`/`params`/`post` view and idempotent `load()` this crate's
//! dispatcher relies on.

use crate::error::{Error, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use url::Url;

/// HTTP verb. `All` is the wildcard method `on()`'s `all()` sugar stores
/// under; `Other` preserves whatever token a transport actually sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
    All,
    Other(String),
}

impl Method {
    /// Route keys are built with the uppercase verb token; `All` never
    /// appears literally in an incoming request, only in registrations.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
            Method::All => "ALL",
            Method::Other(s) => s,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "CONNECT" => Method::Connect,
            "TRACE" => Method::Trace,
            other => Method::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed multi-part body (`multipart/form-data`), query string, or
/// form-urlencoded body. Kept as a flat string map; repeated keys keep the
/// last value, matching `URLSearchParams`-style folding.
pub type FieldMap = HashMap<String, String>;

/// Case-insensitive header multi-map. Lookups lowercase the key; storage
/// keeps the original casing a transport sent for faithful re-emission.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Typed extension map a listener uses to pass values to the next listener
/// in the same chain (an auth middleware stashing a parsed user, etc).
/// Additive to `data`/`params`/`post`, never a replacement for them.
#[derive(Clone, Default)]
pub struct Locals {
    data: Arc<RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&self, value: T) {
        if let Ok(mut data) = self.data.write() {
            data.insert(TypeId::of::<T>(), Box::new(value));
        }
    }

    pub fn get<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        self.data
            .read()
            .ok()?
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }
}

impl std::fmt::Debug for Locals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.data.read().map(|d| d.len()).unwrap_or(0);
        f.debug_struct("Locals").field("items", &len).finish()
    }
}

pub type BodyLoader =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send>> + Send + Sync>;

/// A loaded request body: raw bytes plus whatever structured shape the
/// content-type implied, per §3's `body` + `post` split.
#[derive(Debug, Clone)]
pub enum Body {
    Raw(Vec<u8>),
    Form(FieldMap),
    Json(serde_json::Value),
}

/// The mutable request value. One instance per transport event; the
/// adapter constructs it and hands it to the dispatcher, which runs the
/// listener chain before the adapter reclaims it to finalize a response.
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub query: FieldMap,
    pub session: FieldMap,
    pub mimetype: String,
    pub body: Option<Body>,
    pub params: HashMap<String, String>,
    pub locals: Locals,
    /// Opaque transport handle (e.g. the raw `TcpStream` half), reachable
    /// only by adapter code that knows what concrete type it stashed here.
    pub resource: Locals,

    loader: Option<BodyLoader>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("params", &self.params)
            .field("loaded", &self.body.is_some())
            .finish()
    }
}

impl Request {
    pub fn new(method: Method, url: Url, headers: Headers, loader: Option<BodyLoader>) -> Self {
        let query: FieldMap = url.query_pairs().into_owned().collect();
        let mimetype = headers
            .get("content-type")
            .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
            .unwrap_or_default();
        let session = crate::cookie::parse_cookie_header(headers.get("cookie").unwrap_or(""));

        Self {
            method,
            url,
            headers,
            query,
            session,
            mimetype,
            body: None,
            params: HashMap::new(),
            locals: Locals::new(),
            resource: Locals::new(),
            loader,
        }
    }

    /// Reads the transport body via the adapter-supplied loader and fills
    /// `body`/`post`. Idempotent: a second call is a no-op once `body` is
    /// populated, per §4.5.
    pub async fn load(&mut self) -> Result<()> {
        if self.body.is_some() {
            return Ok(());
        }
        let Some(loader) = self.loader.clone() else {
            self.body = Some(Body::Raw(Vec::new()));
            return Ok(());
        };
        let raw = loader().await?;
        self.body = Some(match self.mimetype.as_str() {
            "application/json" => {
                let value: serde_json::Value = if raw.is_empty() {
                    serde_json::Value::Null
                } else {
                    serde_json::from_slice(&raw)?
                };
                Body::Json(value)
            }
            "application/x-www-form-urlencoded" => {
                let text = String::from_utf8_lossy(&raw);
                let fields: FieldMap = url::form_urlencoded::parse(text.as_bytes())
                    .into_owned()
                    .collect();
                Body::Form(fields)
            }
            _ if self.mimetype.starts_with("multipart/") => {
                let boundary = self
                    .mimetype_boundary()
                    .ok_or_else(|| Error::BadRequest("missing multipart boundary".into()))?;
                Body::Form(parse_multipart(&raw, &boundary))
            }
            _ => Body::Raw(raw),
        });
        Ok(())
    }

    fn mimetype_boundary(&self) -> Option<String> {
        let content_type = self.headers.get("content-type")?;
        content_type
            .split(';')
            .find_map(|part| part.trim().strip_prefix("boundary="))
            .map(|b| b.trim_matches('"').to_string())
    }

    /// The `post` view: a flat field map over whatever `body` resolved to,
    /// empty until `load()` has completed.
    pub fn post(&self) -> FieldMap {
        match &self.body {
            Some(Body::Form(fields)) => fields.clone(),
            Some(Body::Json(serde_json::Value::Object(map))) => map
                .iter()
                .map(|(k, v)| (k.clone(), json_scalar(v)))
                .collect(),
            _ => FieldMap::new(),
        }
    }

    /// Merged view over `params` + `query` + `post`, params taking
    /// precedence, matching §3's `data(name)` lookup.
    pub fn data(&self, name: &str) -> Option<String> {
        if let Some(v) = self.params.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.query.get(name) {
            return Some(v.clone());
        }
        self.post().get(name).cloned()
    }

    pub fn data_all(&self) -> FieldMap {
        let mut merged = self.post();
        merged.extend(self.query.clone());
        merged.extend(self.params.clone());
        merged
    }
}

fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Minimal `multipart/form-data` parser: splits on the boundary and keeps
/// each part's `name` and text value. Binary file parts are skipped —
/// file uploads are an adapter-level concern outside this crate's scope.
fn parse_multipart(raw: &[u8], boundary: &str) -> FieldMap {
    let delimiter = format!("--{boundary}");
    let text = String::from_utf8_lossy(raw);
    let mut fields = FieldMap::new();

    for part in text.split(&delimiter) {
        let part = part.trim_start_matches("\r\n").trim_end_matches("\r\n");
        if part.is_empty() || part == "--" {
            continue;
        }
        let Some((headers, body)) = part.split_once("\r\n\r\n") else {
            continue;
        };
        let name = headers.lines().find_map(|line| {
            let lower = line.to_ascii_lowercase();
            if !lower.starts_with("content-disposition") {
                return None;
            }
            line.split(';').find_map(|seg| {
                let seg = seg.trim();
                seg.strip_prefix("name=\"")
                    .and_then(|s| s.strip_suffix('"'))
                    .map(|s| s.to_string())
            })
        });
        if let Some(name) = name {
            fields.insert(name, body.trim_end_matches("\r\n").to_string());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_roundtrips_known_verbs() {
        assert_eq!(Method::parse("get").as_str(), "GET");
        assert_eq!(Method::parse("PATCH").as_str(), "PATCH");
        assert!(matches!(Method::parse("frobnicate"), Method::Other(_)));
    }

    #[test]
    fn headers_lookup_is_case_insensitive() {
        let mut h = Headers::new();
        h.insert("Content-Type", "application/json");
        assert_eq!(h.get("content-type"), Some("application/json"));
    }

    #[test]
    fn locals_roundtrip_typed_value() {
        #[derive(Clone, PartialEq, Debug)]
        struct User(String);

        let locals = Locals::new();
        assert_eq!(locals.get::<User>(), None);
        locals.insert(User("ana".into()));
        assert_eq!(locals.get::<User>(), Some(User("ana".into())));
    }

    #[tokio::test]
    async fn load_is_idempotent_and_parses_json() {
        let url = Url::parse("http://localhost/items").unwrap();
        let mut headers = Headers::new();
        headers.insert("content-type", "application/json");
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls2 = calls.clone();
        let loader: BodyLoader = Arc::new(move || {
            calls2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Box::pin(async { Ok(br#"{"a":1}"#.to_vec()) })
        });

        let mut req = Request::new(Method::Post, url, headers, Some(loader));
        req.load().await.unwrap();
        req.load().await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(req.data("a"), Some("1".to_string()));
    }

    #[test]
    fn multipart_extracts_named_text_fields() {
        let boundary = "XYZ";
        let raw = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n--{b}--",
            b = boundary
        );
        let fields = parse_multipart(raw.as_bytes(), boundary);
        assert_eq!(fields.get("title").unwrap(), "hello");
    }
}

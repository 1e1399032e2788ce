//! Fetch-style adapter: a single-shot request/response shape for
//! embedding in a serverless handler, as opposed to the native adapter's
//! long-lived socket accept loop. Per the transport adapter contract the
//! wire semantics are identical; only how bytes arrive and leave differs
//! — here the whole request is already in memory, the way a serverless
//! runtime typically hands a request to a handler.

use crate::plugin::PluginHost;
use crate::request::{BodyLoader, Headers, Method, Request};
use crate::response::{DispatchFn, Response, StreamReader};
use std::sync::Arc;

pub struct FetchRequest {
    pub method: Method,
    pub url: url::Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// The body shape a `FetchResponse` resolves to. `Stream` is what a real
/// fetch adapter would map to a `ReadableStream`; this crate only carries
/// the Rust-side `AsyncRead` handle for the embedder to pipe onward.
pub enum FetchBody {
    Bytes(Vec<u8>),
    Stream(StreamReader),
}

pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: FetchBody,
}

/// Runs `fetch_req` through the full dispatch lifecycle and collects the
/// result into a `FetchResponse`: headers copied verbatim, cookies
/// rendered as `Set-Cookie`, and a structured body serialized into the
/// same envelope the native adapter uses.
pub async fn handle(host: &PluginHost, fetch_req: FetchRequest) -> FetchResponse {
    let mut req_headers = Headers::new();
    for (name, value) in &fetch_req.headers {
        req_headers.insert(name.clone(), value.clone());
    }

    let body = Arc::new(fetch_req.body);
    let loader: BodyLoader = {
        let body = body.clone();
        Arc::new(move || {
            let body = body.clone();
            Box::pin(async move { Ok((*body).clone()) })
        })
    };

    let mut req = Request::new(fetch_req.method, fetch_req.url, req_headers, Some(loader));

    // No mid-flight pipe to flush to; the caller reads the final `res`
    // state back out below once the lifecycle completes.
    let dispatcher: DispatchFn = Arc::new(|_res| Box::pin(async { Ok(()) }));
    let mut res = Response::new(Some(dispatcher));

    crate::dispatcher::handle(host, &mut req, &mut res).await;

    let status = if res.code == 0 { 200 } else { res.code };
    let status_text = if res.status.is_empty() {
        crate::status::reason_phrase(status).to_string()
    } else {
        res.status.clone()
    };

    let mut headers: Vec<(String, String)> = Vec::new();
    let mimetype = if res.mimetype.is_empty() {
        crate::adapter::default_mimetype(&res)
    } else {
        res.mimetype.clone()
    };
    headers.push(("Content-Type".to_string(), mimetype));
    for (name, values) in &res.headers {
        for value in values {
            headers.push((name.clone(), value.clone()));
        }
    }
    for cookie in crate::adapter::cookie_headers(&res) {
        headers.push(("Set-Cookie".to_string(), cookie));
    }

    let body = match res.take_stream() {
        Some(reader) => FetchBody::Stream(reader),
        None => FetchBody::Bytes(crate::adapter::render_body_bytes(&res)),
    };

    FetchResponse {
        status,
        status_text,
        headers,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{listener, Action, Outcome};

    #[tokio::test]
    async fn handles_request_and_collects_json_body() {
        let host = PluginHost::new();
        host.on(
            "GET /ping",
            Action::Callable(listener(|_, res, _| {
                Box::pin(async move {
                    res.set_json(serde_json::json!({"ok": true}));
                    Ok(Outcome::Continue)
                })
            })),
            0,
        )
        .unwrap();

        let fetch_req = FetchRequest {
            method: Method::Get,
            url: url::Url::parse("http://localhost/ping").unwrap(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        let res = handle(&host, fetch_req).await;
        assert_eq!(res.status, 200);
        match res.body {
            FetchBody::Bytes(bytes) => {
                let text = String::from_utf8(bytes).unwrap();
                assert!(text.contains("\"ok\""));
            }
            FetchBody::Stream(_) => panic!("expected a buffered body"),
        }
    }

    #[tokio::test]
    async fn unmatched_route_produces_synthesized_404() {
        let host = PluginHost::new();
        let fetch_req = FetchRequest {
            method: Method::Get,
            url: url::Url::parse("http://localhost/missing").unwrap(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        let res = handle(&host, fetch_req).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn cookie_revisions_become_set_cookie_headers() {
        let host = PluginHost::new();
        host.on(
            "GET /login",
            Action::Callable(listener(|_, res, _| {
                Box::pin(async move {
                    res.set_cookie("sid", "abc");
                    res.set_html("ok");
                    Ok(Outcome::Continue)
                })
            })),
            0,
        )
        .unwrap();

        let fetch_req = FetchRequest {
            method: Method::Get,
            url: url::Url::parse("http://localhost/login").unwrap(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        let res = handle(&host, fetch_req).await;
        assert!(res
            .headers
            .iter()
            .any(|(name, value)| name == "Set-Cookie" && value.starts_with("sid=abc")));
    }
}

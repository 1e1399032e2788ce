//! Native TCP transport adapter: the accept loop, a minimal HTTP/1.1
//! request parser built on `httparse`, and the response writer that
//! serializes `Response` back onto the socket.
//!
//! Grounded on the teacher's `src/server.rs` accept loop (bind, loop on
//! `accept()`, spawn one task per connection) and `src/serve.rs`'s
//! static-file helpers, generalized from the teacher's naive
//! `split("\r\n\r\n")` parsing to `httparse` since this crate already
//! depends on it for real header parsing.

use crate::config::ServerConfig;
use crate::plugin::PluginHost;
use crate::request::{BodyLoader, Headers, Method, Request};
use crate::response::{DispatchFn, Response, StreamReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Binds to `config.address:config.port` and serves forever, spawning one
/// task per accepted connection. Each connection is handled as a single
/// request/response and then closed, matching the teacher's accept loop.
pub async fn serve(host: Arc<PluginHost>, config: ServerConfig) -> crate::Result<()> {
    let listener = TcpListener::bind((config.address.as_str(), config.port)).await?;
    crate::log!("[native] listening on {}:{}", config.address, config.port);

    loop {
        let (stream, peer) = listener.accept().await?;
        let host = host.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, host).await {
                crate::error!("[native] {peer}: {e}");
            }
        });
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    host: Arc<PluginHost>,
) -> crate::Result<()> {
    let (header_bytes, body) = read_request(&mut stream).await?;

    let mut raw_headers = [httparse::EMPTY_HEADER; 64];
    let mut parsed = httparse::Request::new(&mut raw_headers);
    let parse_status = parsed
        .parse(&header_bytes)
        .map_err(|e| crate::Error::BadRequest(format!("malformed request: {e}")))?;
    if parse_status.is_partial() {
        return Err(crate::Error::BadRequest("truncated request headers".into()));
    }

    let method = Method::parse(parsed.method.unwrap_or("GET"));
    let raw_target = parsed.path.unwrap_or("/");

    let mut headers = Headers::new();
    for h in parsed.headers.iter() {
        headers.insert(h.name.to_string(), String::from_utf8_lossy(h.value).into_owned());
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "http".to_string());
    let host_header = headers.get("host").unwrap_or("localhost").to_string();
    let (path, query) = split_path(raw_target);
    let normalized = crate::path::normalize_path(path);
    let url = url::Url::parse(&format!("{scheme}://{host_header}{normalized}{query}"))
        .map_err(|e| crate::Error::BadRequest(format!("invalid request target: {e}")))?;

    let body = Arc::new(body);
    let loader: BodyLoader = {
        let body = body.clone();
        Arc::new(move || {
            let body = body.clone();
            Box::pin(async move { Ok((*body).clone()) })
        })
    };

    let mut req = Request::new(method, url, headers, Some(loader));

    let write_half = Arc::new(Mutex::new(stream));
    let dispatch_handle = write_half.clone();
    let dispatcher: DispatchFn = Arc::new(move |res| {
        let stream = dispatch_handle.clone();
        Box::pin(async move {
            let mut stream = stream.lock().await;
            write_response(&mut stream, res).await
        })
    });
    let mut res = Response::new(Some(dispatcher));

    crate::dispatcher::handle(&host, &mut req, &mut res).await;
    Ok(())
}

/// Reads until the header terminator is seen, then reads the remaining
/// body bytes implied by `Content-Length`. Returns `(header bytes sans
/// terminator's leading split, body bytes)`.
async fn read_request(
    stream: &mut tokio::net::TcpStream,
) -> crate::Result<(Vec<u8>, Vec<u8>)> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(crate::Error::BadRequest(
                "connection closed before headers completed".into(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err(crate::Error::BadRequest("request headers too large".into()));
        }
    };

    let content_length = content_length_of(&buf[..header_end]);
    let mut body = buf.split_off(header_end);
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    if body.len() > content_length {
        body.truncate(content_length);
    }
    Ok((buf, body))
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn content_length_of(headers: &[u8]) -> usize {
    let text = String::from_utf8_lossy(headers);
    text.lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

fn split_path(raw: &str) -> (&str, String) {
    match raw.split_once('?') {
        Some((path, query)) => (path, format!("?{query}")),
        None => (raw, String::new()),
    }
}

async fn write_response(
    stream: &mut tokio::net::TcpStream,
    res: &mut Response,
) -> crate::Result<()> {
    let stream_body = res.take_stream();
    let body_bytes = if stream_body.is_none() {
        Some(crate::adapter::render_body_bytes(res))
    } else {
        None
    };

    let code = if res.code == 0 { 200 } else { res.code };
    let status = if res.status.is_empty() {
        crate::status::reason_phrase(code).to_string()
    } else {
        res.status.clone()
    };
    let mimetype = if res.mimetype.is_empty() {
        crate::adapter::default_mimetype(res)
    } else {
        res.mimetype.clone()
    };

    let mut head = format!("HTTP/1.1 {code} {status}\r\n");
    head.push_str(&format!("Content-Type: {mimetype}\r\n"));
    match &body_bytes {
        Some(bytes) => head.push_str(&format!("Content-Length: {}\r\n", bytes.len())),
        None => head.push_str("Transfer-Encoding: chunked\r\n"),
    }
    for (name, values) in &res.headers {
        for value in values {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
    }
    for cookie in crate::adapter::cookie_headers(res) {
        head.push_str(&format!("Set-Cookie: {cookie}\r\n"));
    }
    head.push_str("Connection: close\r\n\r\n");

    stream.write_all(head.as_bytes()).await?;
    match (body_bytes, stream_body) {
        (Some(bytes), _) => stream.write_all(&bytes).await?,
        (None, Some(mut reader)) => write_chunked(stream, &mut reader).await?,
        _ => {}
    }
    stream.flush().await?;
    Ok(())
}

async fn write_chunked(
    stream: &mut tokio::net::TcpStream,
    reader: &mut StreamReader,
) -> crate::Result<()> {
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        stream.write_all(format!("{n:x}\r\n").as_bytes()).await?;
        stream.write_all(&buf[..n]).await?;
        stream.write_all(b"\r\n").await?;
    }
    stream.write_all(b"0\r\n\r\n").await?;
    Ok(())
}

/// Streams `path` into `res` as its body, inferring content type from the
/// file extension. Sets a synthesized 404 when the file doesn't exist.
pub async fn serve_file(res: &mut Response, path: impl AsRef<Path>) -> crate::Result<()> {
    let path = path.as_ref();
    match File::open(path).await {
        Ok(file) => {
            res.mimetype = guess_content_type(path).to_string();
            res.set_stream(Box::pin(file));
            Ok(())
        }
        Err(_) => {
            res.set_status(404, "Not Found");
            res.set_html("File not found");
            Ok(())
        }
    }
}

/// Serves `dir/index.html`, falling back to `dir/<fallback>` (an SPA's
/// catch-all entry point, typically), then a synthesized 404.
pub async fn serve_dir(
    res: &mut Response,
    dir: impl AsRef<Path>,
    fallback: Option<&str>,
) -> crate::Result<()> {
    let dir = dir.as_ref();
    let index = dir.join("index.html");
    if index.is_file() {
        return serve_file(res, index).await;
    }
    if let Some(name) = fallback {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return serve_file(res, candidate).await;
        }
    }
    res.set_status(404, "Not Found");
    res.set_html("Not found");
    Ok(())
}

/// Resolves `request_path` under `base_dir`, rejecting `..` traversal
/// before touching disk.
pub async fn serve_static(
    res: &mut Response,
    base_dir: impl AsRef<Path>,
    request_path: &str,
) -> crate::Result<()> {
    let base_dir = base_dir.as_ref();
    let relative = request_path.trim_start_matches('/');
    let safe = PathBuf::from(relative);
    if safe.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        res.set_status(403, "Forbidden");
        res.set_html("Access denied");
        return Ok(());
    }
    let full = base_dir.join(safe);
    if full.is_dir() {
        return serve_dir(res, full, None).await;
    }
    if !full.is_file() {
        res.set_status(404, "Not Found");
        res.set_html("File not found");
        return Ok(());
    }
    serve_file(res, full).await
}

fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogg" => "video/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn scratch_dir() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("ingest_native_test_{}_{n}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn find_header_end_detects_terminator() {
        let buf = b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody";
        assert_eq!(find_header_end(buf), Some(buf.len() - 4));
    }

    #[test]
    fn content_length_of_parses_header_case_insensitively() {
        let headers = b"GET / HTTP/1.1\r\ncontent-length: 42\r\n\r\n";
        assert_eq!(content_length_of(headers), 42);
    }

    #[test]
    fn split_path_separates_query_string() {
        assert_eq!(split_path("/a/b?x=1"), ("/a/b", "?x=1".to_string()));
        assert_eq!(split_path("/a/b"), ("/a/b", String::new()));
    }

    #[test]
    fn guess_content_type_maps_known_extensions() {
        assert_eq!(guess_content_type(Path::new("a.json")), "application/json");
        assert_eq!(guess_content_type(Path::new("a.bin")), "application/octet-stream");
    }

    #[tokio::test]
    async fn serve_file_streams_existing_file() {
        let dir = scratch_dir();
        let file = dir.join("hello.html");
        std::fs::write(&file, "<p>hi</p>").unwrap();

        let mut res = Response::new(None);
        serve_file(&mut res, &file).await.unwrap();
        assert_eq!(res.mimetype, "text/html; charset=utf-8");
        assert!(res.take_stream().is_some());
    }

    #[tokio::test]
    async fn serve_file_missing_sets_404() {
        let mut res = Response::new(None);
        serve_file(&mut res, "/no/such/file.txt").await.unwrap();
        assert_eq!(res.code, 404);
    }

    #[tokio::test]
    async fn serve_dir_falls_back_to_named_file() {
        let dir = scratch_dir();
        std::fs::write(dir.join("app.html"), "<p>app</p>").unwrap();

        let mut res = Response::new(None);
        serve_dir(&mut res, &dir, Some("app.html")).await.unwrap();
        assert!(res.take_stream().is_some());
    }

    #[tokio::test]
    async fn serve_static_rejects_parent_dir_traversal() {
        let dir = scratch_dir();
        let mut res = Response::new(None);
        serve_static(&mut res, &dir, "/../secret").await.unwrap();
        assert_eq!(res.code, 403);
    }
}

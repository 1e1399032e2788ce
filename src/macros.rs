//! Declarative shorthand for the `Response` setters, mirroring the
//! teacher's `core/src/macros.rs` response-building macros but mutating
//! an existing `&mut Response` in place instead of constructing a fresh
//! one, since a listener receives its `Response` rather than returning it.

#[macro_export]
macro_rules! text {
    ($res:expr, $body:expr) => {{
        $res.set_body("text/plain", $crate::response::Body::String($body.to_string()));
    }};
}

#[macro_export]
macro_rules! html {
    ($res:expr, $body:expr) => {{
        $res.set_html($body);
    }};
}

#[macro_export]
macro_rules! json {
    ($res:expr, $data:expr) => {{
        $res.set_json($data);
    }};
}

#[macro_export]
macro_rules! xml {
    ($res:expr, $body:expr) => {{
        $res.set_xml($body);
    }};
}

#[macro_export]
macro_rules! redirect {
    ($res:expr, $location:expr) => {{
        $res.redirect($location);
    }};
}

#[macro_export]
macro_rules! stream {
    ($res:expr, $reader:expr) => {{
        $res.set_stream(Box::pin($reader));
    }};
}

/// Serves a single file or an entire directory (with `index.html`
/// fallback) into `$res`, awaiting the adapter helper inline. Requires
/// an `async` caller context, same as the teacher's `serve!`.
#[macro_export]
macro_rules! serve {
    ($res:expr, $path:expr) => {{
        $crate::adapter::native::serve_file($res, $path).await
    }};
    ($res:expr, $dir:expr, $fallback:expr) => {{
        $crate::adapter::native::serve_dir($res, $dir, $fallback).await
    }};
}

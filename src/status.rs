//! Status code ⇄ reason phrase table, and the cooperative-abort constant.

/// Cooperative short-circuit signal. Never visible to the client; the
/// dispatcher treats it as "stop the current emit, but keep running the
/// remaining lifecycle stages" and never writes it onto the wire.
///
/// The source this crate is grounded on used `308` and `309`
/// interchangeably under the name "Incomplete". `309` is picked here to
/// avoid colliding with the real HTTP `308 Permanent Redirect`.
pub const ABORT: u16 = 309;
pub const ABORT_STATUS: &str = "Incomplete";

/// Looks up the canonical reason phrase for a status code, the way
/// `Response`'s code setter auto-fills `status` when it is still empty.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        ABORT => ABORT_STATUS,
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ if (100..200).contains(&code) => "Informational",
        _ if (200..300).contains(&code) => "Success",
        _ if (300..400).contains(&code) => "Redirection",
        _ if (400..500).contains(&code) => "Client Error",
        _ => "Server Error",
    }
}

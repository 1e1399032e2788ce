//! Cookie header parsing and `Set-Cookie` serialization.
//!
//! `Request.session` is populated once from the incoming `Cookie` header;
//! `Response.session.revisions` records intent (`set`/`remove`) that the
//! adapter turns back into `Set-Cookie` headers on the way out.

use std::collections::HashMap;

/// Parses a raw `Cookie` header into a flat name → value map. Malformed
/// pairs (no `=`) are skipped rather than rejected, matching how browsers
/// tolerate a stray cookie from another application on the same domain.
pub fn parse_cookie_header(raw: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for pair in raw.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        if let Some((name, value)) = pair.split_once('=') {
            out.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    out
}

/// What a response intends to do with a cookie, recorded on
/// `Response.session.revisions` rather than serialized immediately so a
/// later listener in the chain can still override an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieIntent {
    Set { value: String, options: CookieOptions },
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<String>,
    pub max_age: Option<i64>,
}

/// Renders one `Set-Cookie` header value. A `Remove` intent forces
/// `Max-Age=0` and the epoch `Expires` date so the client drops the
/// cookie immediately regardless of what options it was first set with.
pub fn render_set_cookie(name: &str, intent: &CookieIntent) -> String {
    match intent {
        CookieIntent::Set { value, options } => {
            let mut out = format!("{name}={value}");
            if let Some(path) = &options.path {
                out.push_str(&format!("; Path={path}"));
            }
            if let Some(domain) = &options.domain {
                out.push_str(&format!("; Domain={domain}"));
            }
            if let Some(max_age) = options.max_age {
                out.push_str(&format!("; Max-Age={max_age}"));
            }
            if let Some(same_site) = &options.same_site {
                out.push_str(&format!("; SameSite={same_site}"));
            }
            if options.secure {
                out.push_str("; Secure");
            }
            if options.http_only {
                out.push_str("; HttpOnly");
            }
            out
        }
        CookieIntent::Remove => {
            format!("{name}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT")
        }
    }
}

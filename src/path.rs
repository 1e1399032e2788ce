//! PathMatcher: compiles a path pattern (literals, `:name`, `*`, `**`) into
//! an anchored [`regex::Regex`] plus the ordered list of captures, the way
//! `lambda_lw_http_router_core::Router::register_route` turns `{param}`
//! segments into named regex groups before anchoring with `^...$`.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum ParamKind {
    Named(String),
    /// Positional wildcard (`*` or `**`); the crate indexes these `0..n`
    /// in the order they appear in the pattern.
    Positional(usize),
}

/// A compiled path pattern. Built once at `on()` time and retained for the
/// life of the router, per the spec's PathMatcher lifecycle note.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    regex: Regex,
    params: Vec<ParamKind>,
}

impl PathMatcher {
    /// A pattern string counts as a route pattern (vs. a bare event name)
    /// if it could plausibly address a path: it contains a slash, a named
    /// parameter, or a wildcard.
    pub fn is_route_pattern(pattern: &str) -> bool {
        pattern.contains('/') || pattern.contains(':') || pattern.contains('*')
    }

    pub fn compile(pattern: &str) -> Result<Self> {
        let normalized = normalize_path(pattern);
        let segments = path_segments(&normalized);

        let mut regex_parts = Vec::with_capacity(segments.len());
        let mut params = Vec::new();
        let mut positional = 0usize;
        let mut terminal_glob = false;

        for segment in segments.iter() {
            if let Some(name) = segment.strip_prefix(':') {
                regex_parts.push("([^/]+)".to_string());
                params.push(ParamKind::Named(name.to_string()));
            } else if *segment == "*" {
                regex_parts.push("([^/]+)".to_string());
                params.push(ParamKind::Positional(positional));
                positional += 1;
            } else if *segment == "**" {
                params.push(ParamKind::Positional(positional));
                positional += 1;
                terminal_glob = true;
                // `**` is greedy and terminal: nothing meaningful can
                // follow it, so later segments (if any) are dropped.
                break;
            } else {
                regex_parts.push(regex::escape(segment));
            }
        }

        let body = regex_parts.join("/");
        let anchored = if terminal_glob && !body.is_empty() {
            // Fold the separating slash into the capture group so the
            // normalized path with no segment past the literal prefix
            // (`/files` from `/files/` or `/files/**`) still matches.
            format!("^/{body}(?:/(.*))?$")
        } else if terminal_glob {
            "^/(.*)$".to_string()
        } else if body.is_empty() {
            "^/$".to_string()
        } else {
            format!("^/{body}$")
        };

        let regex = Regex::new(&anchored)
            .map_err(|e| Error::Internal(format!("invalid path pattern {pattern:?}: {e}")))?;

        Ok(Self { regex, params })
    }

    /// Matches a request path, returning the captured params on success.
    /// Named captures are keyed by name; positional (`*`/`**`) captures are
    /// keyed by their stringified index, as the spec's Match() requires.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let normalized = normalize_path(path);
        let caps = self.regex.captures(&normalized)?;

        let mut out = HashMap::with_capacity(self.params.len());
        for (idx, kind) in self.params.iter().enumerate() {
            let value = caps
                .get(idx + 1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match kind {
                ParamKind::Named(name) => {
                    out.insert(name.clone(), value);
                }
                ParamKind::Positional(i) => {
                    out.insert(i.to_string(), value);
                }
            }
        }
        Some(out)
    }
}

/// Collapses `//` runs to `/` and strips a trailing `/` (except the root),
/// exactly as the spec's path-pattern normalization rule requires.
pub fn normalize_path(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut last_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        collapsed.push(c);
    }
    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }
    if collapsed.is_empty() {
        "/".to_string()
    } else if !collapsed.starts_with('/') {
        format!("/{collapsed}")
    } else {
        collapsed
    }
}

fn path_segments(normalized: &str) -> Vec<&str> {
    if normalized == "/" {
        Vec::new()
    } else {
        normalized.trim_start_matches('/').split('/').collect()
    }
}

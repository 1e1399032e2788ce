//! ListenerTable & EventRouter: priority-ordered storage and dispatch of
//! listener entries, keyed by either a route pattern (`"GET /users/:id"`)
//! or a bare event name (`"request"`, `"error"`, …).

use crate::listener::{Action, Entry, ModuleLoader, Outcome, Pattern, SeqCounter, Listener};
use crate::path::PathMatcher;
use crate::plugin::PluginHost;
use crate::request::{Method, Request};
use crate::response::Response;
use std::sync::{Arc, RwLock};

/// Splits `"GET /users/1"` into `("GET", "/users/1")`. Bare event names
/// (no leading verb + space) pass through as the whole string with no
/// method part.
fn split_event_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once(' ') {
        Some((method, path)) if !method.is_empty() => (Some(method), path),
        _ => (None, key),
    }
}

/// Append-only (until `unbind`) store of listener entries plus the
/// sequence counter that breaks priority ties by insertion order.
#[derive(Default)]
pub struct ListenerTable {
    entries: RwLock<Vec<Arc<Entry>>>,
    seq: SeqCounter,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pattern: Pattern, action: Action, priority: i32) {
        let seq = self.seq.next();
        let mut entries = self.entries.write().unwrap();
        entries.push(Arc::new(Entry::new(pattern, action, priority, seq)));
    }

    /// Removes every entry whose `(pattern, action)` matches by identity.
    /// Returns the number removed.
    pub fn unbind(&self, pattern_key: &str, action: &Action) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|entry| !(entry_pattern_key(entry) == pattern_key && entry.matches_identity(action)));
        before - entries.len()
    }

    /// Merges every entry of `other` into `self`, re-stamping sequence
    /// numbers so the merge preserves relative order within a priority
    /// tier but always sorts after everything already in `self`.
    pub fn merge_from(&self, other: &ListenerTable) {
        let source = other.entries.read().unwrap();
        let mut target = self.entries.write().unwrap();
        for entry in source.iter() {
            let seq = self.seq.next();
            target.push(Arc::new(Entry::new(clone_pattern(&entry.pattern), clone_action(&entry.action), entry.priority, seq)));
        }
    }

    /// Entries whose pattern matches `event_key`, sorted by
    /// (priority DESC, seq ASC). For route patterns, also returns the
    /// captured path params for the winning match. Clones the matching
    /// `Arc<Entry>`s out so the caller can resolve/invoke them without
    /// holding the table lock across an `.await`.
    fn matching(&self, event_key: &str) -> Vec<(Arc<Entry>, Option<std::collections::HashMap<String, String>>)> {
        let entries = self.entries.read().unwrap();
        let (method, path) = split_event_key(event_key);

        let mut hits: Vec<(Arc<Entry>, Option<std::collections::HashMap<String, String>>)> = entries
            .iter()
            .filter_map(|entry| match &entry.pattern {
                Pattern::Route { method: entry_method, matcher, .. } => {
                    let method = method?;
                    let method_ok = entry_method.as_str() == "ALL" || entry_method.as_str() == method;
                    if !method_ok {
                        return None;
                    }
                    matcher.matches(path).map(|params| (entry.clone(), Some(params)))
                }
                Pattern::Name(name) => (name == event_key).then(|| (entry.clone(), None)),
            })
            .collect();

        hits.sort_by(|(a, _), (b, _)| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        hits
    }
}

fn entry_pattern_key(entry: &Entry) -> String {
    match &entry.pattern {
        Pattern::Route { method, raw, .. } => format!("{} {}", method.as_str(), raw),
        Pattern::Name(name) => name.clone(),
    }
}

fn clone_pattern(pattern: &Pattern) -> Pattern {
    match pattern {
        Pattern::Route { method, raw, matcher } => Pattern::Route {
            method: method.clone(),
            raw: raw.clone(),
            matcher: matcher.clone(),
        },
        Pattern::Name(name) => Pattern::Name(name.clone()),
    }
}

fn clone_action(action: &Action) -> Action {
    match action {
        Action::Callable(l) => Action::Callable(l.clone()),
        Action::EntryPath(p) => Action::EntryPath(p.clone()),
        Action::ImportThunk(t) => Action::ImportThunk(t.clone()),
        Action::ViewTemplate(p) => Action::ViewTemplate(p.clone()),
    }
}

/// Logical summary of how one `emit` call ended. Distinct from
/// `Response.code`: an abort never writes `ABORT` onto `res.code` itself
/// (that constant is never supposed to reach the wire — see
/// `status::ABORT`), callers use this to decide what to do next (the
/// dispatcher uses it to know whether the prepare stage short-circuited).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitStatus {
    Ok,
    Aborted,
    Errored,
}

/// Priority-ordered dispatcher over a `ListenerTable`. `on`/`unbind` are
/// the raw registration primitives; `ActionRouter` (see `action_router.rs`)
/// layers verb sugar on top of `on`.
pub struct EventRouter {
    table: Arc<ListenerTable>,
    loader: Option<Arc<dyn ModuleLoader>>,
    view_engine: Option<Arc<dyn crate::listener::ViewEngine>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            table: Arc::new(ListenerTable::new()),
            loader: None,
            view_engine: None,
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_view_engine(mut self, engine: Arc<dyn crate::listener::ViewEngine>) -> Self {
        self.view_engine = Some(engine);
        self
    }

    pub fn table(&self) -> &Arc<ListenerTable> {
        &self.table
    }

    /// Registers a listener under a route pattern (`"GET /users/:id"`) or
    /// bare event name (`"request"`). Route patterns are compiled
    /// immediately and retained for the router's lifetime.
    pub fn on(&self, event_key: &str, action: Action, priority: i32) -> crate::Result<()> {
        let pattern = compile_pattern(event_key)?;
        self.table.insert(pattern, action, priority);
        Ok(())
    }

    pub fn unbind(&self, event_key: &str, action: &Action) -> usize {
        self.table.unbind(event_key, action)
    }

    pub fn use_sub(&self, sub: &EventRouter) {
        self.table.merge_from(&sub.table);
    }

    /// Runs the listener chain for `event_key` against `(req, res, ctx)`:
    /// scan, sort by (priority DESC, seq ASC), run sequentially, stop on
    /// `Outcome::Abort`, reroute to `"error"` on `Err`. The returned
    /// `EmitStatus` is purely informational — it is never written onto
    /// `res.code` (see `EmitStatus`'s own doc comment).
    pub async fn emit(
        &self,
        event_key: &str,
        req: &mut Request,
        res: &mut Response,
        ctx: &PluginHost,
    ) -> EmitStatus {
        let hits = self.table.matching(event_key);
        if hits.is_empty() {
            return EmitStatus::Ok;
        }

        for (entry, params) in hits {
            if let Some(params) = params {
                req.params = params;
            }

            let listener = match entry.resolve(self.loader.clone(), self.view_engine.clone()).await {
                Ok(listener) => listener,
                Err(e) => {
                    self.run_error(req, res, ctx, e.message(), e.status_code()).await;
                    return EmitStatus::Errored;
                }
            };

            match listener.call(req, res, ctx).await {
                Ok(Outcome::Continue) => continue,
                Ok(Outcome::Abort) => return EmitStatus::Aborted,
                Err(e) => {
                    self.run_error(req, res, ctx, e.message(), e.status_code()).await;
                    return EmitStatus::Errored;
                }
            }
        }

        EmitStatus::Ok
    }

    async fn run_error(&self, req: &mut Request, res: &mut Response, ctx: &PluginHost, msg: String, code: u16) {
        res.error = Some(msg.clone());
        if res.code == 0 {
            res.set_code(code);
        }
        // Box::pin: `emit` recursing into itself for the "error" bus is an
        // `async fn` calling itself, which needs an indirection to have a
        // statically known size.
        let fut = Box::pin(self.emit("error", req, res, ctx));
        let _ = fut.await;
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_pattern(event_key: &str) -> crate::Result<Pattern> {
    let (method, path) = split_event_key(event_key);
    match method {
        Some(method) if PathMatcher::is_route_pattern(path) => Ok(Pattern::Route {
            method: Method::parse(method),
            raw: path.to_string(),
            matcher: PathMatcher::compile(path)?,
        }),
        _ => Ok(Pattern::Name(event_key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::listener;
    use crate::plugin::PluginHost;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn mk_request() -> Request {
        Request::new(
            Method::Get,
            url::Url::parse("http://localhost/users/1").unwrap(),
            crate::request::Headers::new(),
            None,
        )
    }

    #[tokio::test]
    async fn priority_desc_then_insertion_order() {
        let router = EventRouter::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let o1 = order.clone();
        router
            .on(
                "GET /x",
                Action::Callable(listener(move |_, _, _| {
                    let o1 = o1.clone();
                    Box::pin(async move {
                        o1.lock().unwrap().push("low");
                        Ok(Outcome::Continue)
                    })
                })),
                0,
            )
            .unwrap();

        let o2 = order.clone();
        router
            .on(
                "GET /x",
                Action::Callable(listener(move |_, _, _| {
                    let o2 = o2.clone();
                    Box::pin(async move {
                        o2.lock().unwrap().push("high");
                        Ok(Outcome::Continue)
                    })
                })),
                10,
            )
            .unwrap();

        let host = PluginHost::new();
        let mut req = Request::new(Method::Get, url::Url::parse("http://localhost/x").unwrap(), crate::request::Headers::new(), None);
        let mut res = Response::new(None);
        router.emit("GET /x", &mut req, &mut res, &host).await;

        assert_eq!(*order.lock().unwrap(), vec!["high", "low"]);
    }

    #[tokio::test]
    async fn abort_stops_remaining_listeners() {
        let router = EventRouter::new();
        let calls = Arc::new(AtomicU32::new(0));

        router
            .on(
                "GET /x",
                Action::Callable(listener(|_, _, _| Box::pin(async { Ok(Outcome::Abort) }))),
                10,
            )
            .unwrap();

        let c = calls.clone();
        router
            .on(
                "GET /x",
                Action::Callable(listener(move |_, _, _| {
                    let c = c.clone();
                    Box::pin(async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok(Outcome::Continue)
                    })
                })),
                0,
            )
            .unwrap();

        let host = PluginHost::new();
        let mut req = mk_request();
        let mut res = Response::new(None);
        let status = router.emit("GET /x", &mut req, &mut res, &host).await;

        assert_eq!(status, EmitStatus::Aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(res.code, 0);
    }

    #[tokio::test]
    async fn error_reroutes_to_error_bus() {
        let router = EventRouter::new();
        router
            .on(
                "GET /x",
                Action::Callable(listener(|_, _, _| {
                    Box::pin(async { Err(crate::Error::Internal("boom".into())) })
                })),
                0,
            )
            .unwrap();

        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen2 = seen.clone();
        router
            .on(
                "error",
                Action::Callable(listener(move |_, res, _| {
                    let seen2 = seen2.clone();
                    Box::pin(async move {
                        *seen2.lock().unwrap() = res.error.clone();
                        Ok(Outcome::Continue)
                    })
                })),
                0,
            )
            .unwrap();

        let host = PluginHost::new();
        let mut req = mk_request();
        let mut res = Response::new(None);
        let status = router.emit("GET /x", &mut req, &mut res, &host).await;

        assert_eq!(status, EmitStatus::Errored);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("Internal Server Error: boom"));
    }

    #[tokio::test]
    async fn use_sub_preserves_relative_order_within_priority() {
        let parent = EventRouter::new();
        let sub = EventRouter::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let o1 = order.clone();
        sub.on(
            "GET /x",
            Action::Callable(listener(move |_, _, _| {
                let o1 = o1.clone();
                Box::pin(async move {
                    o1.lock().unwrap().push("sub1");
                    Ok(Outcome::Continue)
                })
            })),
            0,
        )
        .unwrap();

        let o2 = order.clone();
        sub.on(
            "GET /x",
            Action::Callable(listener(move |_, _, _| {
                let o2 = o2.clone();
                Box::pin(async move {
                    o2.lock().unwrap().push("sub2");
                    Ok(Outcome::Continue)
                })
            })),
            0,
        )
        .unwrap();

        parent.use_sub(&sub);

        let host = PluginHost::new();
        let mut req = mk_request();
        let mut res = Response::new(None);
        parent.emit("GET /x", &mut req, &mut res, &host).await;

        assert_eq!(*order.lock().unwrap(), vec!["sub1", "sub2"]);
    }
}

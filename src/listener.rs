//! Listener entries and the `Action` tagged union.
//!
//! Mirrors the teacher's `AsyncHandler` blanket impl (`Fn(Request, Response)
//! -> Fut` boxed into a trait object) for the owned-future shapes
//! (`ImportThunk`, module resolution), but `Listener` itself takes `&mut
//! Request`/`&mut Response` that must outlive the returned future, which a
//! blanket impl over `Fn` can't express without higher-ranked trait bounds
//! on the closure's return type — so callables are wrapped explicitly via
//! [`listener`] instead of relying on a blanket impl.

use crate::plugin::PluginHost;
use crate::request::Request;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a listener tells the dispatcher to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Equivalent to a JS listener returning `undefined`/`true`.
    Continue,
    /// Equivalent to a JS listener returning the literal `false`.
    Abort,
}

/// A resolved, invocable listener.
pub trait Listener: Send + Sync {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        ctx: &'a PluginHost,
    ) -> BoxFuture<'a, crate::Result<Outcome>>;
}

struct ClosureListener<F>(F);

impl<F> Listener for ClosureListener<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, &'a PluginHost) -> BoxFuture<'a, crate::Result<Outcome>>
        + Send
        + Sync,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        ctx: &'a PluginHost,
    ) -> BoxFuture<'a, crate::Result<Outcome>> {
        (self.0)(req, res, ctx)
    }
}

/// Wraps a closure of shape `|req, res, ctx| Box::pin(async move { .. })`
/// into an `Arc<dyn Listener>` suitable for `EventRouter::on`.
pub fn listener<F>(f: F) -> Arc<dyn Listener>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, &'a PluginHost) -> BoxFuture<'a, crate::Result<Outcome>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(ClosureListener(f))
}

/// A 0-arg function returning a future that resolves an import to a
/// callable, the deferred shape used by `ImportRouter`.
pub trait ImportThunk: Send + Sync {
    fn import(&self) -> BoxFuture<'static, crate::Result<Arc<dyn Listener>>>;
}

impl<F> ImportThunk for F
where
    F: Fn() -> BoxFuture<'static, crate::Result<Arc<dyn Listener>>> + Send + Sync,
{
    fn import(&self) -> BoxFuture<'static, crate::Result<Arc<dyn Listener>>> {
        self()
    }
}

/// Resolves an absolute module path to a callable. File-system plugin
/// discovery is an external concern (§6); this is the hook a host program
/// supplies to make `EntryRouter` actions work.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, path: &str) -> BoxFuture<'_, crate::Result<Arc<dyn Listener>>>;
}

/// Renders a view template. Template engines are explicitly out of scope;
/// this is the pluggable hook `ViewRouter` delegates to.
pub trait ViewEngine: Send + Sync {
    fn render<'a>(
        &'a self,
        path: &'a str,
        req: &'a mut Request,
        res: &'a mut Response,
        ctx: &'a PluginHost,
    ) -> BoxFuture<'a, crate::Result<Outcome>>;
}

/// One of the four action shapes a listener entry can hold. All variants
/// normalize to a callable after first use.
pub enum Action {
    Callable(Arc<dyn Listener>),
    EntryPath(String),
    ImportThunk(Arc<dyn ImportThunk>),
    ViewTemplate(String),
}

impl Action {
    /// Identity used by `unbind`: two actions are the "same" registration
    /// if they point at the same underlying value.
    fn identity(&self) -> usize {
        match self {
            Action::Callable(l) => Arc::as_ptr(l) as *const () as usize,
            Action::EntryPath(p) => p.as_ptr() as usize,
            Action::ImportThunk(t) => Arc::as_ptr(t) as *const () as usize,
            Action::ViewTemplate(p) => p.as_ptr() as usize,
        }
    }
}

/// A listener registration record: `(pattern, action, priority, sequence)`.
pub struct Entry {
    pub pattern: Pattern,
    pub action: Action,
    pub priority: i32,
    pub seq: u64,
    resolved: OnceCell<Arc<dyn Listener>>,
}

/// The compiled form of a listener's event key: either a route pattern
/// (method + compiled path) or a bare event name (`"request"`, `"error"`, …).
pub enum Pattern {
    Route {
        method: crate::request::Method,
        raw: String,
        matcher: crate::path::PathMatcher,
    },
    Name(String),
}

impl Entry {
    pub fn new(pattern: Pattern, action: Action, priority: i32, seq: u64) -> Self {
        Self {
            pattern,
            action,
            priority,
            seq,
            resolved: OnceCell::new(),
        }
    }

    pub fn matches_identity(&self, action: &Action) -> bool {
        self.action.identity() == action.identity()
    }

    /// Resolves the entry's action to a callable, memoizing on first use
    /// so re-emits of the same route don't re-import or re-render.
    pub async fn resolve(
        &self,
        loader: Option<Arc<dyn ModuleLoader>>,
        view_engine: Option<Arc<dyn ViewEngine>>,
    ) -> crate::Result<Arc<dyn Listener>> {
        if let Some(existing) = self.resolved.get() {
            return Ok(existing.clone());
        }
        let resolved = match &self.action {
            Action::Callable(l) => l.clone(),
            Action::EntryPath(path) => {
                let loader = loader.ok_or_else(|| {
                    crate::Error::Internal(format!(
                        "no ModuleLoader configured to resolve entry path {path:?}"
                    ))
                })?;
                loader.load(path).await?
            }
            Action::ImportThunk(thunk) => thunk.import().await?,
            Action::ViewTemplate(path) => {
                let engine = view_engine.ok_or_else(|| {
                    crate::Error::Internal(format!(
                        "no ViewEngine configured to render template {path:?}"
                    ))
                })?;
                Arc::new(ViewTemplateListener {
                    path: path.clone(),
                    engine,
                }) as Arc<dyn Listener>
            }
        };
        // `OnceCell::set` can race across concurrent first dispatches of
        // the same route; the loser's resolved value is simply dropped,
        // the memoized winner is what every caller observes from here on.
        let _ = self.resolved.set(resolved.clone());
        Ok(resolved)
    }
}

struct ViewTemplateListener {
    path: String,
    engine: Arc<dyn ViewEngine>,
}

impl Listener for ViewTemplateListener {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        ctx: &'a PluginHost,
    ) -> BoxFuture<'a, crate::Result<Outcome>> {
        self.engine.render(&self.path, req, res, ctx)
    }
}

/// Monotonic sequence generator backing `insertionSeq` for a router.
#[derive(Default)]
pub struct SeqCounter(AtomicU64);

impl SeqCounter {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

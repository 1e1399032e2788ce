//! PluginHost: the root object a program builds, registers plugins and
//! routes onto, and bootstraps once before serving.
//!
//! Registry/config stores follow the teacher's `core/src/plugin.rs`
//! (`PluginRegistry`, priority-sorted bootstrap) generalized from a
//! fixed lifecycle-hook trait to the spec's looser "factory runs once
//! with `(host)`" model, with `NamedPlugin` folded in as an optional
//! richer shape for callers who want metadata/priority/dependencies.

use crate::action_router::ActionRouter;
use crate::config::Config;
use crate::event_router::EventRouter;
use crate::listener::{Action, BoxFuture};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A bare bootstrap factory: `Fn(&PluginHost) -> BoxFuture<Result<()>>`.
pub trait PluginFactory: Send + Sync {
    fn bootstrap<'a>(&'a self, host: &'a PluginHost) -> BoxFuture<'a, crate::Result<()>>;
}

impl<F> PluginFactory for F
where
    F: for<'a> Fn(&'a PluginHost) -> BoxFuture<'a, crate::Result<()>> + Send + Sync,
{
    fn bootstrap<'a>(&'a self, host: &'a PluginHost) -> BoxFuture<'a, crate::Result<()>> {
        self(host)
    }
}

/// Richer factory shape with metadata and priority, folded in from the
/// teacher's `Plugin` trait purely for ergonomics; bootstrap ordering and
/// once-only semantics are identical to a bare `PluginFactory`.
pub trait NamedPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        0
    }

    fn depends_on(&self) -> Vec<&str> {
        Vec::new()
    }

    fn bootstrap<'a>(&'a self, host: &'a PluginHost) -> BoxFuture<'a, crate::Result<()>>;
}

struct Registration {
    name: String,
    priority: i32,
    depends_on: Vec<String>,
    factory: RegisteredFactory,
}

enum RegisteredFactory {
    Bare(Arc<dyn PluginFactory>),
    Named(Arc<dyn NamedPlugin>),
}

impl RegisteredFactory {
    fn bootstrap<'a>(&'a self, host: &'a PluginHost) -> BoxFuture<'a, crate::Result<()>> {
        match self {
            RegisteredFactory::Bare(f) => f.bootstrap(host),
            RegisteredFactory::Named(f) => f.bootstrap(host),
        }
    }
}

/// Named-value registry. `register(name, value)` upserts; `get(name)`
/// returns the latest value. Values are type-erased and downcast on
/// read, so callers must agree on the concrete type per name.
#[derive(Default)]
struct Registry {
    values: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Registry {
    fn register<T: Any + Send + Sync>(&self, name: &str, value: T) {
        self.values
            .write()
            .unwrap()
            .insert(name.to_string(), Arc::new(value));
    }

    fn get<T: Any + Send + Sync + Clone>(&self, name: &str) -> Option<T> {
        let values = self.values.read().unwrap();
        let value = values.get(name)?;
        if (**value).type_id() != TypeId::of::<T>() {
            return None;
        }
        value.downcast_ref::<T>().cloned()
    }

    fn contains(&self, name: &str) -> bool {
        self.values.read().unwrap().contains_key(name)
    }
}

/// The root object: owns the action/event routers, the named-value
/// registry, and the config store. Shared across an entire serving
/// session via `Arc`; writes after `bootstrap()` completes must go
/// through the same locked stores reads use (§5's read-mostly model).
pub struct PluginHost {
    router: ActionRouter,
    registry: Registry,
    config: Config,
    bootstrapped: std::sync::atomic::AtomicBool,
    pending: RwLock<Vec<Registration>>,
    seq: std::sync::atomic::AtomicI64,
}

impl PluginHost {
    pub fn new() -> Self {
        Self {
            router: ActionRouter::new(),
            registry: Registry::default(),
            config: Config::new(),
            bootstrapped: std::sync::atomic::AtomicBool::new(false),
            pending: RwLock::new(Vec::new()),
            seq: std::sync::atomic::AtomicI64::new(0),
        }
    }

    pub fn router(&self) -> &EventRouter {
        self.router.events()
    }

    pub fn action_router(&self) -> &ActionRouter {
        &self.router
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Queues a bare bootstrap factory, run in registration order at
    /// `bootstrap()` time (subject to `priority` for `plugin_named`).
    pub fn plugin<F>(&self, name: impl Into<String>, factory: F)
    where
        F: for<'a> Fn(&'a PluginHost) -> BoxFuture<'a, crate::Result<()>> + Send + Sync + 'static,
    {
        self.pending.write().unwrap().push(Registration {
            name: name.into(),
            priority: 0,
            depends_on: Vec::new(),
            factory: RegisteredFactory::Bare(Arc::new(factory)),
        });
    }

    pub fn plugin_named(&self, plugin: Arc<dyn NamedPlugin>) {
        let name = plugin.name().to_string();
        let priority = plugin.priority();
        let depends_on = plugin.depends_on().into_iter().map(str::to_string).collect();
        self.pending.write().unwrap().push(Registration {
            name,
            priority,
            depends_on,
            factory: RegisteredFactory::Named(plugin),
        });
    }

    /// Upserts a named value in the registry. Not copied: later readers
    /// observe the same value until overwritten.
    pub fn register<T: Any + Send + Sync>(&self, name: &str, value: T) {
        self.registry.register(name, value);
    }

    pub fn value<T: Any + Send + Sync + Clone>(&self, name: &str) -> Option<T> {
        self.registry.get(name)
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Installs a sub-router's listeners into the host's root router.
    pub fn use_router(&self, sub: &EventRouter) {
        self.router.events().use_sub(sub);
    }

    pub fn on(&self, event_key: &str, action: Action, priority: i32) -> crate::Result<()> {
        self.router.events().on(event_key, action, priority)
    }

    /// Runs every queued factory exactly once, ordered by (priority DESC,
    /// registration order), validates `depends_on` for named plugins
    /// first, then emits `"config"` and `"route"` with empty request
    /// state. A second call is a no-op.
    pub async fn bootstrap(&self) -> crate::Result<()> {
        if self
            .bootstrapped
            .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            return Ok(());
        }

        let mut registrations = self.pending.write().unwrap().drain(..).collect::<Vec<_>>();
        let names: Vec<String> = registrations.iter().map(|r| r.name.clone()).collect();
        for reg in &registrations {
            for dep in &reg.depends_on {
                if !names.contains(dep) {
                    return Err(crate::Error::Plugin(format!(
                        "plugin '{}' depends on '{}' which is not registered",
                        reg.name, dep
                    )));
                }
            }
        }
        registrations.sort_by(|a, b| b.priority.cmp(&a.priority));

        for reg in &registrations {
            crate::log!("[plugin] bootstrapping {}", reg.name);
            reg.factory.bootstrap(self).await.map_err(|e| {
                crate::Error::Plugin(format!("plugin '{}' failed to bootstrap: {}", reg.name, e))
            })?;
        }

        self.emit_lifecycle("config").await;
        self.emit_lifecycle("route").await;
        Ok(())
    }

    async fn emit_lifecycle(&self, event: &str) {
        let mut req = crate::request::Request::new(
            crate::request::Method::Other(String::new()),
            url::Url::parse("ingest://lifecycle").unwrap(),
            crate::request::Headers::new(),
            None,
        );
        let mut res = crate::response::Response::new(None);
        self.router.events().emit(event, &mut req, &mut res, self).await;
    }

    pub fn next_seq(&self) -> i64 {
        self.seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new()
    }
}

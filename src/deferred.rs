//! EntryRouter / ImportRouter / ViewRouter: thin `ActionRouter`
//! specializations where the action variant is fixed per router kind.

use crate::listener::{Action, ImportThunk};
use crate::action_router::ActionRouter;

/// Routes whose action is an absolute module path, resolved at first
/// dispatch via the host's `ModuleLoader` and expected to yield a
/// default callable.
#[derive(Default)]
pub struct EntryRouter(ActionRouter);

macro_rules! entry_verb_method {
    ($name:ident, $method:literal) => {
        pub fn $name(&self, pattern: &str, module_path: &str, priority: i32) -> crate::Result<()> {
            self.0.events().on(
                &format!("{} {}", $method, pattern),
                Action::EntryPath(module_path.to_string()),
                priority,
            )
        }
    };
}

impl EntryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn router(&self) -> &ActionRouter {
        &self.0
    }

    entry_verb_method!(get, "GET");
    entry_verb_method!(post, "POST");
    entry_verb_method!(put, "PUT");
    entry_verb_method!(patch, "PATCH");
    entry_verb_method!(delete, "DELETE");
    entry_verb_method!(all, "ALL");
}

/// Routes whose action is a 0-arg import thunk, awaited at first dispatch.
#[derive(Default)]
pub struct ImportRouter(ActionRouter);

macro_rules! import_verb_method {
    ($name:ident, $method:literal) => {
        pub fn $name(&self, pattern: &str, thunk: std::sync::Arc<dyn ImportThunk>, priority: i32) -> crate::Result<()> {
            self.0.events().on(
                &format!("{} {}", $method, pattern),
                Action::ImportThunk(thunk),
                priority,
            )
        }
    };
}

impl ImportRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn router(&self) -> &ActionRouter {
        &self.0
    }

    import_verb_method!(get, "GET");
    import_verb_method!(post, "POST");
    import_verb_method!(put, "PUT");
    import_verb_method!(patch, "PATCH");
    import_verb_method!(delete, "DELETE");
    import_verb_method!(all, "ALL");
}

/// Routes whose action is a template file path, handed to the pluggable
/// `ViewEngine` at first dispatch. `render` exposes the same rendering
/// path for use outside the dispatcher (e.g. a listener that wants to
/// render a partial into its own response body).
#[derive(Default)]
pub struct ViewRouter(ActionRouter);

macro_rules! view_verb_method {
    ($name:ident, $method:literal) => {
        pub fn $name(&self, pattern: &str, template_path: &str, priority: i32) -> crate::Result<()> {
            self.0.events().on(
                &format!("{} {}", $method, pattern),
                Action::ViewTemplate(template_path.to_string()),
                priority,
            )
        }
    };
}

impl ViewRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn router(&self) -> &ActionRouter {
        &self.0
    }

    view_verb_method!(get, "GET");
    view_verb_method!(post, "POST");
    view_verb_method!(put, "PUT");
    view_verb_method!(patch, "PATCH");
    view_verb_method!(delete, "DELETE");
    view_verb_method!(all, "ALL");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{listener, BoxFuture, Outcome};
    use crate::listener::{ModuleLoader, ViewEngine};
    use crate::plugin::PluginHost;
    use crate::request::{Headers, Method, Request};
    use crate::response::Response;
    use std::sync::Arc;

    struct StubLoader;
    impl ModuleLoader for StubLoader {
        fn load(&self, path: &str) -> BoxFuture<'_, crate::Result<Arc<dyn crate::listener::Listener>>> {
            let path = path.to_string();
            Box::pin(async move {
                Ok(listener(move |_, res, _| {
                    let path = path.clone();
                    Box::pin(async move {
                        res.set_html(format!("loaded {path}"));
                        Ok(Outcome::Continue)
                    })
                }))
            })
        }
    }

    #[tokio::test]
    async fn entry_router_resolves_module_path_on_dispatch() {
        let entries = EntryRouter::new();
        entries.get("/about", "routes/about", 0).unwrap();

        let events = entries.router().events();
        let router = crate::event_router::EventRouter::new().with_loader(Arc::new(StubLoader));
        router.table().merge_from(events.table());

        let host = PluginHost::new();
        let mut req = Request::new(Method::Get, url::Url::parse("http://localhost/about").unwrap(), Headers::new(), None);
        let mut res = Response::new(None);
        router.emit("GET /about", &mut req, &mut res, &host).await;

        assert_eq!(res.code, 200);
    }

    struct StubViewEngine;
    impl ViewEngine for StubViewEngine {
        fn render<'a>(
            &'a self,
            path: &'a str,
            _req: &'a mut Request,
            res: &'a mut Response,
            _ctx: &'a PluginHost,
        ) -> BoxFuture<'a, crate::Result<Outcome>> {
            Box::pin(async move {
                res.set_html(format!("rendered {path}"));
                Ok(Outcome::Continue)
            })
        }
    }

    #[tokio::test]
    async fn view_router_renders_via_engine() {
        let views = ViewRouter::new();
        views.get("/home", "templates/home.html", 0).unwrap();

        let router = crate::event_router::EventRouter::new().with_view_engine(Arc::new(StubViewEngine));
        router.table().merge_from(views.router().events().table());

        let host = PluginHost::new();
        let mut req = Request::new(Method::Get, url::Url::parse("http://localhost/home").unwrap(), Headers::new(), None);
        let mut res = Response::new(None);
        router.emit("GET /home", &mut req, &mut res, &host).await;

        assert_eq!(res.code, 200);
    }
}

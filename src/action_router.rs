//! ActionRouter: HTTP verb sugar over `EventRouter::on`.

use crate::event_router::EventRouter;
use crate::listener::Action;

/// Wraps an `EventRouter`, offering `get`/`post`/etc. as thin wrappers
/// around `on("METHOD pattern", ...)`. `EntryRouter`/`ImportRouter`/
/// `ViewRouter` (see `deferred.rs`) build on this the same way.
pub struct ActionRouter {
    events: EventRouter,
}

macro_rules! verb_method {
    ($name:ident, $method:literal) => {
        pub fn $name(&self, pattern: &str, action: Action, priority: i32) -> crate::Result<()> {
            self.events
                .on(&format!("{} {}", $method, pattern), action, priority)
        }
    };
}

impl ActionRouter {
    pub fn new() -> Self {
        Self {
            events: EventRouter::new(),
        }
    }

    pub fn events(&self) -> &EventRouter {
        &self.events
    }

    verb_method!(get, "GET");
    verb_method!(post, "POST");
    verb_method!(put, "PUT");
    verb_method!(patch, "PATCH");
    verb_method!(delete, "DELETE");
    verb_method!(head, "HEAD");
    verb_method!(options, "OPTIONS");
    verb_method!(connect, "CONNECT");
    verb_method!(trace, "TRACE");
    verb_method!(all, "ALL");

    pub fn on(&self, event_key: &str, action: Action, priority: i32) -> crate::Result<()> {
        self.events.on(event_key, action, priority)
    }

    pub fn unbind(&self, event_key: &str, action: &Action) -> usize {
        self.events.unbind(event_key, action)
    }

    pub fn use_sub(&self, sub: &EventRouter) {
        self.events.use_sub(sub)
    }
}

impl Default for ActionRouter {
    fn default() -> Self {
        Self::new()
    }
}

//! Ingest: a pluggable, event-driven HTTP server framework. A single
//! priority-ordered event bus backs route dispatch, lifecycle hooks, and
//! plugin wiring, so a native socket server, a fetch-style serverless
//! handler, and a build-time route-file generator can all sit on top of
//! the same core without duplicating routing logic.

pub mod action_router;
pub mod adapter;
pub mod config;
pub mod cookie;
pub mod deferred;
pub mod dispatcher;
pub mod error;
pub mod event_router;
pub mod listener;
pub mod log;
pub mod macros;
pub mod path;
pub mod plugin;
pub mod request;
pub mod response;
pub mod status;


pub use action_router::ActionRouter;
pub use config::{Config, ServerConfig};
pub use deferred::{EntryRouter, ImportRouter, ViewRouter};
pub use error::{Error, Result};
pub use event_router::{EmitStatus, EventRouter, ListenerTable};
pub use listener::{Action, ImportThunk, Listener, ModuleLoader, Outcome, ViewEngine};
pub use plugin::{NamedPlugin, PluginFactory, PluginHost};
pub use request::{Method, Request};
pub use response::Response;

#[cfg(any(test, feature = "testing"))]
pub use test::{TestClient, TestRequest, TestResponse};

/// Common imports for an embedding program: `use ingest::prelude::*;`
/// pulls in the core router/plugin/request/response types plus the
/// response-building macros.
pub mod prelude {
    pub use crate::{
        Action, ActionRouter, Config, EntryRouter, Error, EventRouter, ImportRouter, Listener,
        Method, ModuleLoader, NamedPlugin, Outcome, PluginHost, Request, Response, Result,
        ServerConfig, ViewEngine, ViewRouter,
    };
    pub use crate::listener::listener;

    #[cfg(any(test, feature = "testing"))]
    pub use crate::{TestClient, TestRequest, TestResponse};
}

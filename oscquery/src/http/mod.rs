//! HTTP side of an OSCQuery service.
//!
//! Every request runs through a [`MiddlewarePipeline`] of three ordered
//! stages. The pre stage answers `HOST_INFO` queries. The user stage holds
//! whatever the host program registered. The post stage serves the favicon
//! and the explorer page and finally looks the request path up in the
//! parameter tree.

pub mod middleware;
pub(crate) mod server;

pub use middleware::{
    ExplorerResponder, FaviconResponder, Flow, FnMiddleware, HostInfoResponder, HttpContext,
    Middleware, MiddlewarePipeline, TreeNodeResponder, middleware_fn,
};
pub use server::HttpServer;

pub(crate) const NOT_FOUND_BODY: &str = "OSC Path not found";

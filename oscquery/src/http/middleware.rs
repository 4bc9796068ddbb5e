use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures_util::FutureExt;
use hyper::header::{CONTENT_TYPE, HeaderValue, PRAGMA};
use hyper::http::request::Parts;
use hyper::{Body, HeaderMap, Method, Request, Response, StatusCode, Uri};

use crate::attributes::{EXPLORER, HOST_INFO};
use crate::host_info::HostInfo;
use crate::http::NOT_FOUND_BODY;
use crate::tree::OscQueryTree;

const FAVICON: &str = "favicon.ico";
const EXPLORER_PAGE: &str = "OSCQueryExplorer.html";

/// What a middleware decided about a request.
#[derive(Debug)]
pub enum Flow {
    /// Fall through to the next middleware.
    Next,
    /// Stop the pipeline and send this response.
    Respond(Response<Body>),
}

/// Request data handed to each middleware.
#[derive(Debug, Clone)]
pub struct HttpContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
    path: String,
}

impl HttpContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        let path = percent_decode(uri.path());
        HttpContext {
            method,
            uri,
            headers,
            remote_addr: None,
            path,
        }
    }

    pub(crate) fn from_parts(parts: Parts, remote_addr: SocketAddr) -> Self {
        let mut ctx = HttpContext::new(parts.method, parts.uri, parts.headers);
        ctx.remote_addr = Some(remote_addr);
        ctx
    }

    /// Percent-decoded request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw request target, path and query as sent.
    pub fn raw_target(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    /// Query part including its leading `?`, empty when there is none.
    pub fn raw_query(&self) -> &str {
        let target = self.raw_target();
        target.find('?').map(|i| &target[i..]).unwrap_or_default()
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2]))
        {
            out.push(hi << 4 | lo);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// One step of the request pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &HttpContext) -> Flow;
}

/// Adapts a synchronous closure into a [`Middleware`].
pub struct FnMiddleware<F>(F);

/// Wraps `f` so it can be registered as user middleware.
///
/// ```rust
/// use oscquery::http::{Flow, middleware_fn};
///
/// let _log_all = middleware_fn(|ctx| {
///     println!("{} {}", ctx.method, ctx.raw_target());
///     Flow::Next
/// });
/// ```
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&HttpContext) -> Flow + Send + Sync,
{
    FnMiddleware(f)
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&HttpContext) -> Flow + Send + Sync,
{
    async fn handle(&self, ctx: &HttpContext) -> Flow {
        (self.0)(ctx)
    }
}

pub(crate) fn respond(status: StatusCode, content_type: &'static str, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn respond_dynamic(json: String) -> Response<Body> {
    let mut response = respond(StatusCode::OK, "application/json", Body::from(json));
    response
        .headers_mut()
        .insert(PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

pub(crate) fn not_found() -> Response<Body> {
    respond(StatusCode::NOT_FOUND, "text/plain", Body::from(NOT_FOUND_BODY))
}

pub(crate) fn internal_error() -> Response<Body> {
    respond(
        StatusCode::INTERNAL_SERVER_ERROR,
        "text/plain",
        Body::from("Internal Server Error"),
    )
}

/// Answers any request whose target contains `HOST_INFO`.
pub struct HostInfoResponder {
    host_info: Arc<RwLock<HostInfo>>,
}

impl HostInfoResponder {
    pub fn new(host_info: Arc<RwLock<HostInfo>>) -> Self {
        HostInfoResponder { host_info }
    }
}

#[async_trait]
impl Middleware for HostInfoResponder {
    async fn handle(&self, ctx: &HttpContext) -> Flow {
        if !ctx.raw_target().contains(HOST_INFO) {
            return Flow::Next;
        }

        let json = match self.host_info.read() {
            Ok(host_info) => serde_json::to_string(&*host_info),
            Err(err) => {
                log::error!("Could not read Host Info: {err}");
                return Flow::Respond(internal_error());
            }
        };
        match json {
            Ok(json) => Flow::Respond(respond_dynamic(json)),
            Err(err) => {
                log::error!("Could not construct and send Host Info: {err}");
                Flow::Respond(internal_error())
            }
        }
    }
}

async fn serve_static(path: PathBuf, content_type: &'static str) -> Flow {
    match tokio::fs::read(&path).await {
        Ok(bytes) => Flow::Respond(respond(StatusCode::OK, content_type, Body::from(bytes))),
        Err(err) => {
            log::error!("Cannot find file at {} to serve: {err}", path.display());
            Flow::Next
        }
    }
}

/// Serves `favicon.ico` from the resources directory.
pub struct FaviconResponder {
    resources_dir: PathBuf,
}

impl FaviconResponder {
    pub fn new(resources_dir: impl Into<PathBuf>) -> Self {
        FaviconResponder {
            resources_dir: resources_dir.into(),
        }
    }
}

#[async_trait]
impl Middleware for FaviconResponder {
    async fn handle(&self, ctx: &HttpContext) -> Flow {
        if !ctx.raw_target().contains(FAVICON) {
            return Flow::Next;
        }
        serve_static(self.resources_dir.join(FAVICON), "image/x-icon").await
    }
}

/// Serves the explorer page for queries containing `?explorer`.
pub struct ExplorerResponder {
    resources_dir: PathBuf,
}

impl ExplorerResponder {
    pub fn new(resources_dir: impl Into<PathBuf>) -> Self {
        ExplorerResponder {
            resources_dir: resources_dir.into(),
        }
    }
}

#[async_trait]
impl Middleware for ExplorerResponder {
    async fn handle(&self, ctx: &HttpContext) -> Flow {
        if !ctx.raw_query().contains(EXPLORER) {
            return Flow::Next;
        }
        serve_static(self.resources_dir.join(EXPLORER_PAGE), "text/html").await
    }
}

/// Terminal stage: serializes the node at the request path.
pub struct TreeNodeResponder {
    tree: Arc<RwLock<OscQueryTree>>,
}

impl TreeNodeResponder {
    pub fn new(tree: Arc<RwLock<OscQueryTree>>) -> Self {
        TreeNodeResponder { tree }
    }
}

#[async_trait]
impl Middleware for TreeNodeResponder {
    async fn handle(&self, ctx: &HttpContext) -> Flow {
        let node = match self.tree.read() {
            Ok(tree) => tree.get_node_with_path(ctx.path()),
            Err(err) => {
                log::error!("Parameter tree unavailable: {err}");
                return Flow::Respond(internal_error());
            }
        };
        let Some(node) = node else {
            log::debug!("No node at {}", ctx.path());
            return Flow::Respond(not_found());
        };

        match serde_json::to_string(&node) {
            Ok(json) => Flow::Respond(respond_dynamic(json)),
            Err(err) => {
                log::error!("Could not serialize node {}: {err}", node.full_path);
                Flow::Respond(internal_error())
            }
        }
    }
}

/// The three middleware stages, run in order until one responds.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    pre: Vec<Arc<dyn Middleware>>,
    user: Vec<Arc<dyn Middleware>>,
    post: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard pipeline around `user` middleware.
    pub fn standard(
        host_info: Arc<RwLock<HostInfo>>,
        tree: Arc<RwLock<OscQueryTree>>,
        resources_dir: PathBuf,
        user: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        MiddlewarePipeline {
            pre: vec![Arc::new(HostInfoResponder::new(host_info))],
            user,
            post: vec![
                Arc::new(FaviconResponder::new(resources_dir.clone())),
                Arc::new(ExplorerResponder::new(resources_dir)),
                Arc::new(TreeNodeResponder::new(tree)),
            ],
        }
    }

    pub fn with_pre(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.pre.push(middleware);
        self
    }

    pub fn with_user(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.user.push(middleware);
        self
    }

    pub fn with_post(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.post.push(middleware);
        self
    }

    /// Runs the stages over `ctx`; 404 when every middleware passes.
    pub async fn run(&self, ctx: &HttpContext) -> Response<Body> {
        for middleware in self.pre.iter().chain(&self.user).chain(&self.post) {
            if let Flow::Respond(response) = middleware.handle(ctx).await {
                return response;
            }
        }
        not_found()
    }

    /// Runs the pipeline for one request. A panicking middleware yields a
    /// 500 response instead of tearing down the connection.
    pub(crate) async fn serve(&self, req: Request<Body>, remote_addr: SocketAddr) -> Response<Body> {
        let (parts, _body) = req.into_parts();
        let ctx = HttpContext::from_parts(parts, remote_addr);
        log::trace!("{} {} from {remote_addr}", ctx.method, ctx.raw_target());

        match AssertUnwindSafe(self.run(&ctx)).catch_unwind().await {
            Ok(response) => response,
            Err(_) => {
                log::error!("Middleware panicked serving {}", ctx.raw_target());
                internal_error()
            }
        }
    }
}

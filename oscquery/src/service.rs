//! The service orchestrator: one parameter tree, one HTTP server and one
//! discovery instance behind a single façade.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use mdns::{MdnsConfig, MdnsEvent, ServiceProfile, ServiceType};
use shared::error::{Error, Result};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::attributes::{AccessValues, OscTyped};
use crate::discovery::{Discovery, MdnsDiscovery};
use crate::host_info::HostInfo;
use crate::http::{HttpServer, Middleware, MiddlewarePipeline};
use crate::node::OscQueryNode;
use crate::tree::OscQueryTree;
use crate::value::{OscValue, ValueProvider, is_supported_tag, parse_values, value_tags};

pub const DEFAULT_SERVICE_NAME: &str = "OSCQueryService";
pub const DEFAULT_PORT_HTTP: u16 = 8080;
pub const DEFAULT_PORT_OSC: u16 = 9000;
pub const DEFAULT_HOST_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

const EVENT_CAPACITY: usize = 64;

type ProfileCallback = Arc<dyn Fn(&ServiceProfile) + Send + Sync>;

#[derive(Default)]
struct Observers {
    osc_added: Vec<ProfileCallback>,
    oscquery_added: Vec<ProfileCallback>,
    osc_removed: Vec<ProfileCallback>,
    oscquery_removed: Vec<ProfileCallback>,
}

impl Observers {
    fn for_event(&self, event: &MdnsEvent) -> (Vec<ProfileCallback>, ServiceProfile) {
        let (list, profile) = match event {
            MdnsEvent::OscServiceAdded(p) => (&self.osc_added, p),
            MdnsEvent::OscQueryServiceAdded(p) => (&self.oscquery_added, p),
            MdnsEvent::OscServiceRemoved(p) => (&self.osc_removed, p),
            MdnsEvent::OscQueryServiceRemoved(p) => (&self.oscquery_removed, p),
        };
        (list.clone(), profile.clone())
    }
}

/// Default location of static assets: `resources/` next to the running
/// binary, falling back to the working directory.
pub fn default_resources_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("resources")))
        .unwrap_or_else(|| PathBuf::from("resources"))
}

/// Configuration for an [`OscQueryService`].
///
/// ```rust,no_run
/// use oscquery::OscQueryServiceBuilder;
///
/// # #[tokio::main]
/// # async fn main() {
/// let service = OscQueryServiceBuilder::new()
///     .with_service_name("Synth")
///     .with_tcp_port(8085)
///     .with_udp_port(9005)
///     .with_defaults()
///     .build();
/// assert!(service.http_local_addr().is_some());
/// # }
/// ```
pub struct OscQueryServiceBuilder {
    service_name: String,
    tcp_port: u16,
    udp_port: u16,
    host_ip: IpAddr,
    osc_ip: Option<IpAddr>,
    discovery: Option<Arc<dyn Discovery>>,
    middleware: Vec<Arc<dyn Middleware>>,
    resources_dir: Option<PathBuf>,
    start_http: bool,
    advertise_osc: bool,
    advertise_oscquery: bool,
}

impl Default for OscQueryServiceBuilder {
    fn default() -> Self {
        OscQueryServiceBuilder {
            service_name: DEFAULT_SERVICE_NAME.to_owned(),
            tcp_port: DEFAULT_PORT_HTTP,
            udp_port: DEFAULT_PORT_OSC,
            host_ip: DEFAULT_HOST_IP,
            osc_ip: None,
            discovery: None,
            middleware: vec![],
            resources_dir: None,
            start_http: false,
            advertise_osc: false,
            advertise_oscquery: false,
        }
    }
}

impl OscQueryServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service_name(mut self, name: &str) -> Self {
        self.service_name = name.to_owned();
        self
    }

    /// Port of the HTTP server; 0 picks a free one.
    pub fn with_tcp_port(mut self, port: u16) -> Self {
        self.tcp_port = port;
        self
    }

    /// Port of the OSC transport announced to peers.
    pub fn with_udp_port(mut self, port: u16) -> Self {
        self.udp_port = port;
        self
    }

    /// Address the HTTP server binds and advertises.
    pub fn with_host_ip(mut self, ip: IpAddr) -> Self {
        self.host_ip = ip;
        self
    }

    /// Address of the OSC transport, the host IP when unset.
    pub fn with_osc_ip(mut self, ip: IpAddr) -> Self {
        self.osc_ip = Some(ip);
        self
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Adds user middleware, run after host info and before static assets
    /// and tree lookup.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resources_dir = Some(dir.into());
        self
    }

    /// Serve HTTP and advertise both service types.
    pub fn with_defaults(self) -> Self {
        self.start_http_server()
            .advertise_oscquery_service()
            .advertise_osc_service()
    }

    pub fn start_http_server(mut self) -> Self {
        self.start_http = true;
        self
    }

    pub fn advertise_osc_service(mut self) -> Self {
        self.advertise_osc = true;
        self
    }

    pub fn advertise_oscquery_service(mut self) -> Self {
        self.advertise_oscquery = true;
        self
    }

    /// Builds the service and runs the requested start actions.
    ///
    /// Needs a tokio runtime for HTTP and discovery; without one both are
    /// disabled and only the parameter tree is usable. Start failures are
    /// logged and disable the failing part.
    pub fn build(self) -> OscQueryService {
        let runtime = match Handle::try_current() {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::error!("No tokio runtime, HTTP and discovery disabled: {err}");
                None
            }
        };

        let osc_ip = self.osc_ip.unwrap_or(self.host_ip);
        let discovery = match (self.discovery, &runtime) {
            (Some(discovery), _) => Some(discovery),
            (None, Some(runtime)) => {
                let config = MdnsConfig::new().with_local_ip(self.host_ip);
                match MdnsDiscovery::new(config, runtime) {
                    Ok(discovery) => Some(Arc::new(discovery) as Arc<dyn Discovery>),
                    Err(err) => {
                        log::error!("mDNS discovery unavailable: {err}");
                        None
                    }
                }
            }
            (None, None) => None,
        };

        let host_info = HostInfo::new(&self.service_name, &osc_ip.to_string(), self.udp_port)
            .with_ws(&self.host_ip.to_string(), self.tcp_port);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let service = OscQueryService {
            service_name: self.service_name,
            tcp_port: self.tcp_port,
            udp_port: self.udp_port,
            host_ip: self.host_ip,
            osc_ip,
            resources_dir: self.resources_dir.unwrap_or_else(default_resources_dir),
            middleware: self.middleware,
            tree: Arc::new(RwLock::new(OscQueryTree::new())),
            host_info: Arc::new(RwLock::new(host_info)),
            discovery,
            http: Mutex::new(None),
            observers: Arc::new(Mutex::new(Observers::default())),
            events,
            dispatcher: Mutex::new(None),
            advertised: Mutex::new(vec![]),
            runtime,
            disposed: AtomicBool::new(false),
        };
        service.start_dispatcher();

        if self.start_http
            && let Err(err) = service.start_http_server()
        {
            log::error!("HTTP server disabled: {err}");
        }
        if self.advertise_oscquery
            && let Err(err) = service.advertise_oscquery_service()
        {
            log::error!("Could not advertise OSCQuery service: {err}");
        }
        if self.advertise_osc
            && let Err(err) = service.advertise_osc_service()
        {
            log::error!("Could not advertise OSC service: {err}");
        }
        service
    }
}

/// A running OSCQuery service.
///
/// All methods take `&self`; the service can be shared across threads in
/// an `Arc`. Dropping it disposes it.
pub struct OscQueryService {
    service_name: String,
    tcp_port: u16,
    udp_port: u16,
    host_ip: IpAddr,
    osc_ip: IpAddr,
    resources_dir: PathBuf,
    middleware: Vec<Arc<dyn Middleware>>,

    tree: Arc<RwLock<OscQueryTree>>,
    host_info: Arc<RwLock<HostInfo>>,
    discovery: Option<Arc<dyn Discovery>>,
    http: Mutex<Option<HttpServer>>,

    observers: Arc<Mutex<Observers>>,
    events: broadcast::Sender<MdnsEvent>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    advertised: Mutex<Vec<ServiceProfile>>,

    runtime: Option<Handle>,
    disposed: AtomicBool,
}

impl OscQueryService {
    pub fn builder() -> OscQueryServiceBuilder {
        OscQueryServiceBuilder::new()
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn tcp_port(&self) -> u16 {
        self.tcp_port
    }

    pub fn osc_port(&self) -> u16 {
        self.udp_port
    }

    pub fn host_ip(&self) -> IpAddr {
        self.host_ip
    }

    pub fn osc_ip(&self) -> IpAddr {
        self.osc_ip
    }

    fn ensure_open(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(Error::ErrConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Moves discovery events from the engine to observers and
    /// subscribers, outside of the discovery driver.
    fn start_dispatcher(&self) {
        let (Some(discovery), Some(runtime)) = (&self.discovery, &self.runtime) else {
            return;
        };
        let Some(mut events_rx) = discovery.take_events() else {
            log::warn!("Discovery events already taken, peer events disabled");
            return;
        };

        let observers = Arc::clone(&self.observers);
        let events = self.events.clone();
        let handle = runtime.spawn(async move {
            while let Some(event) = events_rx.recv().await {
                dispatch(&observers, &events, event);
            }
            log::debug!("Discovery event stream ended");
        });
        if let Ok(mut dispatcher) = self.dispatcher.lock() {
            *dispatcher = Some(handle);
        }
    }

    /// Binds the HTTP server on the host IP and TCP port.
    ///
    /// A bind failure leaves HTTP disabled for this instance.
    pub fn start_http_server(&self) -> Result<()> {
        self.ensure_open()?;
        let runtime = self.runtime.as_ref().ok_or(Error::Http(
            "no tokio runtime to run the HTTP server on".to_owned(),
        ))?;

        let mut http = self.http.lock()?;
        if http.is_some() {
            return Err(Error::ErrHttpServerStarted);
        }

        let pipeline = Arc::new(MiddlewarePipeline::standard(
            Arc::clone(&self.host_info),
            Arc::clone(&self.tree),
            self.resources_dir.clone(),
            self.middleware.clone(),
        ));
        let server = HttpServer::start(
            SocketAddr::new(self.host_ip, self.tcp_port),
            pipeline,
            runtime,
        )?;

        let port = server.local_addr().port();
        if let Ok(mut host_info) = self.host_info.write() {
            host_info.ws_port = Some(port);
        }
        *http = Some(server);
        Ok(())
    }

    /// Local address of the HTTP server while it runs.
    pub fn http_local_addr(&self) -> Option<SocketAddr> {
        self.http.lock().ok()?.as_ref().map(|server| server.local_addr())
    }

    fn advertise(&self, profile: ServiceProfile) -> Result<()> {
        self.ensure_open()?;
        let discovery = self
            .discovery
            .as_ref()
            .ok_or(Error::Other("discovery is not available".to_owned()))?;
        discovery.advertise(profile.clone())?;

        let mut advertised = self.advertised.lock()?;
        advertised.retain(|p| p.service_type != profile.service_type);
        advertised.push(profile);
        Ok(())
    }

    /// Announces the HTTP server as `_oscjson._tcp`.
    pub fn advertise_oscquery_service(&self) -> Result<()> {
        let port = self
            .http_local_addr()
            .map(|addr| addr.port())
            .unwrap_or(self.tcp_port);
        self.advertise(ServiceProfile::new(
            &self.service_name,
            self.host_ip,
            port,
            ServiceType::OscQuery,
        ))
    }

    /// Announces the OSC transport as `_osc._udp`.
    pub fn advertise_osc_service(&self) -> Result<()> {
        self.advertise(ServiceProfile::new(
            &self.service_name,
            self.osc_ip,
            self.udp_port,
            ServiceType::Osc,
        ))
    }

    /// Profiles this service currently advertises.
    pub fn advertised_services(&self) -> Vec<ServiceProfile> {
        self.advertised
            .lock()
            .map(|advertised| advertised.clone())
            .unwrap_or_default()
    }

    /// Registers an endpoint with an optional initial value given as text.
    ///
    /// Returns false, with a log line, for a path not starting with `/`, an
    /// unsupported type tag or an already registered path.
    pub fn add_endpoint(
        &self,
        path: &str,
        osc_type: &str,
        access: AccessValues,
        initial_value: Option<&str>,
        description: Option<&str>,
    ) -> bool {
        if let Some(tag) = value_tags(osc_type).into_iter().find(|t| !is_supported_tag(*t)) {
            log::error!("Cannot add endpoint {path}: unsupported OSC type '{tag}'");
            return false;
        }
        let value = match initial_value.map(|v| parse_values(Some(osc_type), v)).transpose() {
            Ok(value) => value,
            Err(err) => {
                log::error!("Cannot add endpoint {path}: {err}");
                return false;
            }
        };
        self.insert_endpoint(path, Some(osc_type), access, value, description, None)
    }

    /// Registers an endpoint whose type tag follows from `T`.
    pub fn add_endpoint_typed<T: OscTyped>(
        &self,
        path: &str,
        access: AccessValues,
        initial_value: Option<T>,
        description: Option<&str>,
    ) -> bool {
        let value = initial_value.map(|v| vec![v.to_osc_value()]);
        self.insert_endpoint(path, Some(T::OSC_TYPE), access, value, description, None)
    }

    /// Registers an endpoint whose value is computed by `getter` each time
    /// it is served.
    pub fn add_endpoint_with_getter<F>(
        &self,
        path: &str,
        osc_type: &str,
        access: AccessValues,
        getter: F,
    ) -> bool
    where
        F: Fn() -> Vec<OscValue> + Send + Sync + 'static,
    {
        self.insert_endpoint(
            path,
            Some(osc_type),
            access,
            None,
            None,
            Some(ValueProvider::new(getter)),
        )
    }

    fn insert_endpoint(
        &self,
        path: &str,
        osc_type: Option<&str>,
        access: AccessValues,
        value: Option<Vec<OscValue>>,
        description: Option<&str>,
        getter: Option<ValueProvider>,
    ) -> bool {
        if !path.starts_with('/') {
            log::error!("An OSC path must start with a '/', your path {path} does not");
            return false;
        }
        // Empty attributes are left out of the JSON, same as absent ones.
        let osc_type = osc_type.filter(|t| !t.is_empty());
        let description = description.filter(|d| !d.is_empty());
        let mut tree = match self.tree.write() {
            Ok(tree) => tree,
            Err(err) => {
                log::error!("Parameter tree unavailable: {err}");
                return false;
            }
        };

        let result = tree
            .add_node(path, access, osc_type, value, description)
            .and_then(|node| match getter {
                Some(getter) => tree.set_getter(&node.full_path, getter),
                None => Ok(()),
            });
        match result {
            Ok(()) => {
                log::debug!("Added endpoint {path}");
                true
            }
            Err(Error::ErrPathExists(_)) => {
                log::warn!("Path already exists, skipping: {path}");
                false
            }
            Err(err) => {
                log::error!("Cannot add endpoint {path}: {err}");
                false
            }
        }
    }

    /// Removes an endpoint and everything below it.
    pub fn remove_endpoint(&self, path: &str) -> bool {
        match self.tree.write() {
            Ok(mut tree) => {
                let removed = tree.remove_node(path);
                if !removed {
                    log::warn!("No endpoint at {path} to remove");
                }
                removed
            }
            Err(err) => {
                log::error!("Parameter tree unavailable: {err}");
                false
            }
        }
    }

    /// Sets a value from text, parsed against the endpoint's type. Unknown
    /// paths get a bare untyped node.
    pub fn set_value(&self, path: &str, value: &str) -> Result<()> {
        let mut tree = self.tree.write()?;
        let osc_type = tree.osc_type(path);
        let values = parse_values(osc_type.as_deref(), value)?;
        tree.set_value(path, values)
    }

    /// Sets already typed values.
    pub fn set_values(&self, path: &str, values: Vec<OscValue>) -> Result<()> {
        self.tree.write()?.set_value(path, values)
    }

    /// Snapshot of the node at `path`, getters evaluated.
    pub fn get_node(&self, path: &str) -> Option<OscQueryNode> {
        self.tree.read().ok()?.get_node_with_path(path)
    }

    pub fn root_node(&self) -> OscQueryNode {
        self.tree
            .read()
            .map(|tree| tree.root())
            .unwrap_or_else(|_| OscQueryNode::new("/"))
    }

    /// Shared handle on the parameter tree.
    pub fn tree(&self) -> Arc<RwLock<OscQueryTree>> {
        Arc::clone(&self.tree)
    }

    pub fn host_info(&self) -> Option<HostInfo> {
        self.host_info.read().ok().map(|info| info.clone())
    }

    /// Replaces the host info; only allowed before HTTP serving starts.
    pub fn set_host_info(&self, host_info: HostInfo) -> Result<()> {
        if self.http_local_addr().is_some() {
            return Err(Error::ErrHttpServerStarted);
        }
        *self.host_info.write()? = host_info;
        Ok(())
    }

    /// Asks peers to announce themselves.
    pub fn refresh_services(&self) {
        match &self.discovery {
            Some(discovery) => discovery.refresh_services(),
            None => log::debug!("No discovery, nothing to refresh"),
        }
    }

    /// Discovered OSC peers.
    pub fn osc_services(&self) -> Vec<ServiceProfile> {
        self.discovery
            .as_ref()
            .map(|d| d.osc_services())
            .unwrap_or_default()
    }

    /// Discovered OSCQuery peers.
    pub fn oscquery_services(&self) -> Vec<ServiceProfile> {
        self.discovery
            .as_ref()
            .map(|d| d.oscquery_services())
            .unwrap_or_default()
    }

    fn observe(&self, f: impl FnOnce(&mut Observers)) {
        match self.observers.lock() {
            Ok(mut observers) => f(&mut observers),
            Err(err) => log::error!("Cannot register observer: {err}"),
        }
    }

    pub fn on_osc_service_added<F>(&self, callback: F)
    where
        F: Fn(&ServiceProfile) + Send + Sync + 'static,
    {
        self.observe(|o| o.osc_added.push(Arc::new(callback)));
    }

    pub fn on_oscquery_service_added<F>(&self, callback: F)
    where
        F: Fn(&ServiceProfile) + Send + Sync + 'static,
    {
        self.observe(|o| o.oscquery_added.push(Arc::new(callback)));
    }

    pub fn on_osc_service_removed<F>(&self, callback: F)
    where
        F: Fn(&ServiceProfile) + Send + Sync + 'static,
    {
        self.observe(|o| o.osc_removed.push(Arc::new(callback)));
    }

    pub fn on_oscquery_service_removed<F>(&self, callback: F)
    where
        F: Fn(&ServiceProfile) + Send + Sync + 'static,
    {
        self.observe(|o| o.oscquery_removed.push(Arc::new(callback)));
    }

    /// A stream of every discovery event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<MdnsEvent> {
        self.events.subscribe()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Stops HTTP, withdraws advertisements and closes discovery.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("Disposing service {}", self.service_name);

        if let Ok(mut http) = self.http.lock()
            && let Some(mut server) = http.take()
        {
            server.shutdown();
        }

        if let Some(discovery) = &self.discovery {
            let advertised = match self.advertised.lock() {
                Ok(mut advertised) => std::mem::take(&mut *advertised),
                Err(_) => vec![],
            };
            for profile in &advertised {
                discovery.unadvertise(profile);
            }
            discovery.close();
        }

        if let Ok(mut dispatcher) = self.dispatcher.lock()
            && let Some(handle) = dispatcher.take()
        {
            handle.abort();
        }
    }
}

impl Drop for OscQueryService {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn dispatch(
    observers: &Mutex<Observers>,
    events: &broadcast::Sender<MdnsEvent>,
    event: MdnsEvent,
) {
    log::info!("{}", describe(&event));
    let (callbacks, profile) = match observers.lock() {
        Ok(observers) => observers.for_event(&event),
        Err(err) => {
            log::error!("Observers unavailable: {err}");
            return;
        }
    };
    for callback in callbacks {
        callback(&profile);
    }
    // no subscribers is fine
    let _ = events.send(event);
}

fn describe(event: &MdnsEvent) -> String {
    match event {
        MdnsEvent::OscServiceAdded(p) => format!("Found OSC service {p}"),
        MdnsEvent::OscQueryServiceAdded(p) => format!("Found OSCQuery service {p}"),
        MdnsEvent::OscServiceRemoved(p) => format!("Lost OSC service {p}"),
        MdnsEvent::OscQueryServiceRemoved(p) => format!("Lost OSCQuery service {p}"),
    }
}


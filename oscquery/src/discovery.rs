//! Peer discovery behind a trait, with an mDNS implementation that drives
//! the sans-I/O [`Mdns`] engine on a tokio multicast socket.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mdns::{Mdns, MdnsConfig, MdnsEvent, MulticastSocket, ServiceProfile};
use sansio::Protocol;
use shared::error::Result;
use shared::TaggedBytesMut;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::{Notify, mpsc, oneshot};

/// Receiving end of the discovery event stream.
pub type DiscoveryEvents = mpsc::UnboundedReceiver<MdnsEvent>;

const RECV_BUFFER_SIZE: usize = 9000;
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// Advertises local services and tracks peers.
///
/// Events are delivered through the receiver handed out once by
/// [`Discovery::take_events`].
pub trait Discovery: Send + Sync {
    fn advertise(&self, profile: ServiceProfile) -> Result<()>;

    /// Withdraws a previously advertised profile; false when unknown.
    fn unadvertise(&self, profile: &ServiceProfile) -> bool;

    fn refresh_services(&self);

    fn osc_services(&self) -> Vec<ServiceProfile>;

    fn oscquery_services(&self) -> Vec<ServiceProfile>;

    fn take_events(&self) -> Option<DiscoveryEvents>;

    /// Withdraws all advertisements and stops; later calls are no-ops.
    fn close(&self);
}

/// mDNS discovery over a multicast UDP socket.
pub struct MdnsDiscovery {
    engine: Arc<Mutex<Mdns>>,
    wake: Arc<Notify>,
    events: Mutex<Option<DiscoveryEvents>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl MdnsDiscovery {
    /// Joins the mDNS group on the default interface and starts the driver
    /// task on `runtime`.
    pub fn new(config: MdnsConfig, runtime: &Handle) -> Result<Self> {
        let socket = MulticastSocket::new().into_std()?;
        Self::with_socket(config, socket, runtime)
    }

    /// Runs discovery on an already configured socket.
    pub fn with_socket(
        config: MdnsConfig,
        socket: std::net::UdpSocket,
        runtime: &Handle,
    ) -> Result<Self> {
        let socket = {
            let _guard = runtime.enter();
            UdpSocket::from_std(socket)?
        };
        let local_addr = socket.local_addr()?;

        let engine = Arc::new(Mutex::new(Mdns::new(config)));
        let wake = Arc::new(Notify::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        runtime.spawn(run_driver(
            Arc::clone(&engine),
            socket,
            local_addr,
            Arc::clone(&wake),
            events_tx,
            shutdown_rx,
        ));
        log::debug!("mDNS discovery running on {local_addr}");

        Ok(MdnsDiscovery {
            engine,
            wake,
            events: Mutex::new(Some(events_rx)),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
        })
    }

    fn with_engine<R>(&self, f: impl FnOnce(&mut Mdns) -> R) -> Result<R> {
        let mut engine = self.engine.lock()?;
        Ok(f(&mut engine))
    }
}

impl Discovery for MdnsDiscovery {
    fn advertise(&self, profile: ServiceProfile) -> Result<()> {
        self.with_engine(|engine| engine.advertise(profile))??;
        self.wake.notify_one();
        Ok(())
    }

    fn unadvertise(&self, profile: &ServiceProfile) -> bool {
        match self.with_engine(|engine| engine.unadvertise(profile)) {
            Ok(removed) => {
                self.wake.notify_one();
                removed
            }
            Err(err) => {
                log::error!("Failed to unadvertise {profile}: {err}");
                false
            }
        }
    }

    fn refresh_services(&self) {
        match self.with_engine(|engine| engine.refresh_services()) {
            Ok(()) => self.wake.notify_one(),
            Err(err) => log::error!("Failed to refresh services: {err}"),
        }
    }

    fn osc_services(&self) -> Vec<ServiceProfile> {
        self.with_engine(|engine| engine.osc_services())
            .unwrap_or_default()
    }

    fn oscquery_services(&self) -> Vec<ServiceProfile> {
        self.with_engine(|engine| engine.oscquery_services())
            .unwrap_or_default()
    }

    fn take_events(&self) -> Option<DiscoveryEvents> {
        self.events.lock().ok()?.take()
    }

    fn close(&self) {
        let shutdown_tx = match self.shutdown_tx.lock() {
            Ok(mut shutdown_tx) => shutdown_tx.take(),
            Err(err) => {
                log::error!("Failed to close discovery: {err}");
                None
            }
        };
        if let Some(tx) = shutdown_tx {
            log::debug!("Closing mDNS discovery");
            let _ = tx.send(());
        }
    }
}

impl Drop for MdnsDiscovery {
    fn drop(&mut self) {
        self.close();
    }
}

async fn flush(engine: &Mutex<Mdns>, socket: &UdpSocket) {
    let packets: Vec<TaggedBytesMut> = match engine.lock() {
        Ok(mut engine) => std::iter::from_fn(|| engine.poll_write()).collect(),
        Err(err) => {
            log::error!("mDNS engine unavailable: {err}");
            return;
        }
    };
    for packet in packets {
        log::trace!(
            "Sending {} bytes to {}",
            packet.message.len(),
            packet.transport.peer_addr
        );
        if let Err(err) = socket
            .send_to(&packet.message, packet.transport.peer_addr)
            .await
        {
            log::warn!("Failed to send mDNS packet: {err}");
        }
    }
}

fn forward_events(engine: &Mutex<Mdns>, events_tx: &mpsc::UnboundedSender<MdnsEvent>) {
    let events: Vec<MdnsEvent> = match engine.lock() {
        Ok(mut engine) => std::iter::from_fn(|| engine.poll_event()).collect(),
        Err(_) => return,
    };
    for event in events {
        if events_tx.send(event).is_err() {
            log::trace!("Discovery event dropped, nobody is listening");
        }
    }
}

async fn run_driver(
    engine: Arc<Mutex<Mdns>>,
    socket: UdpSocket,
    local_addr: SocketAddr,
    wake: Arc<Notify>,
    events_tx: mpsc::UnboundedSender<MdnsEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        flush(&engine, &socket).await;
        forward_events(&engine, &events_tx);

        let wait = engine
            .lock()
            .ok()
            .and_then(|mut engine| engine.poll_timeout())
            .map(|t| t.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);

        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = wake.notified() => {}
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, peer_addr)) => {
                        log::trace!("Received {len} bytes from {peer_addr}");
                        let msg = TaggedBytesMut::datagram(
                            Instant::now(),
                            local_addr,
                            peer_addr,
                            &buf[..len],
                        );
                        if let Ok(mut engine) = engine.lock()
                            && let Err(err) = engine.handle_read(msg)
                        {
                            log::trace!("Ignoring mDNS packet from {peer_addr}: {err}");
                        }
                    }
                    Err(err) => log::warn!("mDNS socket recv error: {err}"),
                }
            }
            _ = tokio::time::sleep(wait) => {
                if let Ok(mut engine) = engine.lock()
                    && let Err(err) = engine.handle_timeout(Instant::now())
                {
                    log::warn!("mDNS timeout handling failed: {err}");
                }
            }
        }
    }

    // Say goodbye before the socket goes away.
    if let Ok(mut engine) = engine.lock() {
        engine.unadvertise_all();
    }
    flush(&engine, &socket).await;
    forward_events(&engine, &events_tx);
    if let Ok(mut engine) = engine.lock()
        && let Err(err) = engine.close()
    {
        log::warn!("Failed to close mDNS engine: {err}");
    }
    log::debug!("mDNS discovery on {local_addr} stopped");
}

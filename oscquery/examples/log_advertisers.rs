//! Logs every OSC and OSCQuery service found on the local network and
//! prints the parameter tree of each OSCQuery peer.
//!
//! ```
//! cargo run --package oscquery --example log_advertisers -- --debug
//! ```

use std::io::Write;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use oscquery::client::get_osc_tree;
use oscquery::{MdnsEvent, OscQueryServiceBuilder};
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "log_advertisers")]
#[command(version = "0.1.0")]
#[command(about = "Logs OSC and OSCQuery services advertised on the network", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = format!("OSCQueryLogger"))]
    name: String,
    #[arg(long, default_value_t = format!("127.0.0.1"))]
    host: String,
    #[arg(long, default_value_t = 8080)]
    tcp_port: u16,
    #[arg(long, default_value_t = 9000)]
    udp_port: u16,
    /// Seconds between browse queries
    #[arg(long, default_value_t = 10)]
    refresh: u64,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    if cli.debug {
        env_logger::Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let host_ip = IpAddr::from_str(&cli.host)?;
    let service = OscQueryServiceBuilder::new()
        .with_service_name(&cli.name)
        .with_host_ip(host_ip)
        .with_tcp_port(cli.tcp_port)
        .with_udp_port(cli.udp_port)
        .with_resources_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/resources"))
        .with_defaults()
        .build();
    let mut events = service.subscribe();

    let (stop_tx, mut stop_rx) = broadcast::channel::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;
    info!("Press Ctrl-C to stop");

    let mut refresh = tokio::time::interval(Duration::from_secs(cli.refresh.max(1)));
    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = refresh.tick() => service.refresh_services(),
            event = events.recv() => match event {
                Ok(MdnsEvent::OscQueryServiceAdded(profile)) => {
                    println!("OSCQuery Service Found: {profile}");
                    if profile.name == service.service_name() {
                        continue;
                    }
                    info!("Requesting tree from {}", profile.name);
                    match get_osc_tree(profile.address, profile.port).await {
                        Ok(tree) => match tree.to_json() {
                            Ok(json) => println!("{}:\n {json}", profile.name),
                            Err(err) => error!("Cannot print tree of {}: {err}", profile.name),
                        },
                        Err(err) => warn!("Cannot fetch tree of {}: {err}", profile.name),
                    }
                }
                Ok(MdnsEvent::OscServiceAdded(profile)) => {
                    println!("OSC Service Found: {profile}");
                }
                Ok(MdnsEvent::OscQueryServiceRemoved(profile) | MdnsEvent::OscServiceRemoved(profile)) => {
                    println!("Service Gone: {profile}");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Missed {n} discovery events"),
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    service.dispose();
    Ok(())
}

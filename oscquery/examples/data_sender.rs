//! Hosts an OSCQuery service with a handful of parameters whose values
//! change over time.
//!
//! ```
//! cargo run --package oscquery --example data_sender -- --params 5
//! ```
//!
//! Browse the tree at `http://127.0.0.1:8080/` or the explorer page at
//! `http://127.0.0.1:8080/?explorer`.

use std::net::IpAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use oscquery::{AccessValues, OscQueryServiceBuilder, OscValue};
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "data_sender")]
#[command(version = "0.1.0")]
#[command(about = "Hosts OSCQuery parameters with changing values", long_about = None)]
struct Cli {
    #[arg(long, default_value_t = format!("OSCQueryService"))]
    name: String,
    #[arg(long, default_value_t = format!("127.0.0.1"))]
    host: String,
    #[arg(long, default_value_t = 8080)]
    tcp_port: u16,
    #[arg(long, default_value_t = 9000)]
    udp_port: u16,
    /// Number of integer parameters to host
    #[arg(long, default_value_t = 10)]
    params: usize,
    /// Milliseconds between value updates
    #[arg(long, default_value_t = 500)]
    interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let service = OscQueryServiceBuilder::new()
        .with_service_name(&cli.name)
        .with_host_ip(IpAddr::from_str(&cli.host)?)
        .with_tcp_port(cli.tcp_port)
        .with_udp_port(cli.udp_port)
        .with_resources_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/resources"))
        .with_defaults()
        .build();

    let names: Vec<String> = (0..cli.params).map(|i| format!("param{i}")).collect();
    for name in &names {
        if !service.add_endpoint_typed::<i32>(&format!("/{name}"), AccessValues::ReadOnly, Some(0), None) {
            warn!("Could not add /{name}");
        }
    }

    // Values computed only when a peer asks for them.
    let started = Instant::now();
    service.add_endpoint_with_getter("/uptime", "d", AccessValues::ReadOnly, move || {
        vec![OscValue::Float(started.elapsed().as_secs_f64())]
    });
    service.add_endpoint_with_getter("/clock", "s", AccessValues::ReadOnly, || {
        vec![OscValue::String(
            chrono::Local::now().format("%H:%M:%S").to_string(),
        )]
    });

    let (stop_tx, mut stop_rx) = broadcast::channel::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;
    if let Some(addr) = service.http_local_addr() {
        info!("Serving {} parameters on http://{addr}/?explorer", names.len());
    }
    info!("Press Ctrl-C to stop");

    let mut tick: i64 = 0;
    let mut interval = tokio::time::interval(Duration::from_millis(cli.interval.max(10)));
    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = interval.tick() => {
                tick += 1;
                for (i, name) in names.iter().enumerate() {
                    let value = (tick + i as i64 * 7) % 100;
                    if let Err(err) = service.set_value(&format!("/{name}"), &value.to_string()) {
                        warn!("Could not update /{name}: {err}");
                    }
                }
            }
        }
    }

    service.dispose();
    Ok(())
}

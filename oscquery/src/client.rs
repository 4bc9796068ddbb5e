//! Fetching a peer's host info and parameter tree over HTTP.

use std::net::{IpAddr, SocketAddr};

use hyper::{Client, StatusCode, Uri};
use shared::error::{Error, Result};

use crate::attributes::HOST_INFO;
use crate::host_info::HostInfo;
use crate::tree::OscQueryTree;

async fn get_text(uri: String) -> Result<String> {
    let uri: Uri = uri.parse().map_err(|e: hyper::http::uri::InvalidUri| Error::Http(e.to_string()))?;
    log::debug!("GET {uri}");

    let response = Client::new()
        .get(uri)
        .await
        .map_err(|e| Error::Http(e.to_string()))?;
    if response.status() != StatusCode::OK {
        return Err(Error::ErrHttpStatus(response.status().as_u16()));
    }

    let body = hyper::body::to_bytes(response.into_body())
        .await
        .map_err(|e| Error::Http(e.to_string()))?;
    Ok(String::from_utf8(body.to_vec())?)
}

/// Fetches the `HOST_INFO` document of the service at `address:port`.
pub async fn get_host_info(address: IpAddr, port: u16) -> Result<HostInfo> {
    let json = get_text(format!("http://{}/?{HOST_INFO}", SocketAddr::new(address, port))).await?;
    Ok(serde_json::from_str(&json)?)
}

/// Fetches the full parameter tree of the service at `address:port`.
pub async fn get_osc_tree(address: IpAddr, port: u16) -> Result<OscQueryTree> {
    let json = get_text(format!("http://{}/", SocketAddr::new(address, port))).await?;
    OscQueryTree::from_json(&json)
}

//! Network interface helpers.

use anyhow::{Context, Result};
use std::net::UdpSocket;

/// Best-effort LAN IP discovery for the share URL display.
/// No packets are sent; connecting a UDP socket just picks the route.
pub fn get_local_ip() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("failed to bind socket for IP detection")?;

    socket
        .connect("8.8.8.8:80")
        .context("failed to connect socket for IP detection")?;

    let local_addr = socket
        .local_addr()
        .context("failed to get local address")?;

    Ok(local_addr.ip().to_string())
}

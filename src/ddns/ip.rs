//! WAN address discovery: DHCP hook environment, interface address, remote echo service.

use std::net::{IpAddr, Ipv4Addr};

use local_ip_address::list_afinet_netifas;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Set by dhcpcd/NetworkManager hooks.
pub const DHCP_IP_ENV: &str = "DHCP4_IP_ADDRESS";

/// First IPv4 address bound to `interface`.
pub fn interface_ipv4(interface: &str) -> Result<Ipv4Addr> {
    let interfaces = list_afinet_netifas()
        .map_err(|e| Error::Unknown(format!("failed to enumerate network interfaces: {}", e)))?;
    pick_ipv4(interface, interfaces)
}

fn pick_ipv4(interface: &str, interfaces: Vec<(String, IpAddr)>) -> Result<Ipv4Addr> {
    interfaces
        .into_iter()
        .find_map(|(name, ip)| match ip {
            IpAddr::V4(v4) if name == interface => Some(v4),
            _ => None,
        })
        .ok_or_else(|| Error::Unknown(format!("no IPv4 address on interface {}", interface)))
}

/// WAN address as seen locally: the DHCP hook value, or the interface address.
pub fn local_wan_ip(interface: &str, dhcp_value: Option<String>) -> Result<String> {
    if let Some(ip) = dhcp_value.filter(|v| !v.trim().is_empty()) {
        return Ok(ip.trim().to_string());
    }

    warn!("Environment variable {} was not found", DHCP_IP_ENV);
    let ip = interface_ipv4(interface)?;
    info!("Collected Local IP address: {} [{}]", ip, interface);
    Ok(ip.to_string())
}

#[derive(Debug, Deserialize)]
struct RemoteIp {
    ip: String,
}

/// Address from an echo service reply: JSON `{"ip": ...}` or the plain body.
pub fn parse_remote_ip(content_type: Option<&str>, body: &str) -> Result<String> {
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        let parsed: RemoteIp = serde_json::from_str(body)?;
        return Ok(parsed.ip);
    }
    Ok(body.trim().to_string())
}

/// Ask the echo service which address our traffic comes from.
pub async fn remote_ip(http: &Client, url: &str) -> Result<String> {
    let response = http.get(url).send().await?.error_for_status()?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await?;
    parse_remote_ip(content_type.as_deref(), &body)
}

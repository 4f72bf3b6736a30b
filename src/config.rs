use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::num::ParseIntError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BuilderError;
use crate::sys::{IFNAMSIZ, NFT_NAME_MAXLEN};
use crate::ProtocolFamily;

pub const GATEWAY_IP_VAR: &str = "GATEWAY_IP";
pub const GATEWAY_PORT_VAR: &str = "GATEWAY_PORT";
pub const EGRESS_IFACE_VAR: &str = "OIFName";

pub const DEFAULT_EGRESS_IFACE: &str = "eth0";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("The environment variable {name} is not set")]
    MissingVariable { name: &'static str },

    #[error("The environment variable {name} is empty")]
    EmptyVariable { name: &'static str },

    #[error("{value:?} is not a valid port for {name}")]
    InvalidPort {
        name: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Unable to resolve the gateway address {host}:{port}")]
    UnresolvableAddress {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("The gateway address {host}:{port} has no IPv4 address")]
    NoIpv4Address { host: String, port: u16 },
}

/// Names and family of the nf_tables objects owned by a [`Firewall`].
///
/// Deserializing a partial document keeps the defaults for the missing fields.
///
/// [`Firewall`]: crate::Firewall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    pub table_name: String,
    pub table_family: ProtocolFamily,
    pub input_chain_name: String,
    pub output_chain_name: String,
    pub forward_chain_name: String,
    /// Interface of the tunnel, allowed by the optional tunnel rule of the blackhole policy.
    pub tun_iface_name: String,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        FirewallConfig {
            table_name: "routesentry".to_string(),
            table_family: ProtocolFamily::Inet,
            input_chain_name: "routesentry_input".to_string(),
            output_chain_name: "routesentry_output".to_string(),
            forward_chain_name: "routesentry_forward".to_string(),
            tun_iface_name: "wg0".to_string(),
        }
    }
}

fn check_object_name(name: &str) -> Result<(), BuilderError> {
    if name.is_empty() || name.len() >= NFT_NAME_MAXLEN {
        return Err(BuilderError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl FirewallConfig {
    pub fn validate(&self) -> Result<(), BuilderError> {
        check_object_name(&self.table_name)?;

        let mut seen = HashSet::new();
        for chain in [
            self.input_chain_name.as_str(),
            self.output_chain_name.as_str(),
            self.forward_chain_name.as_str(),
        ]
        .iter()
        {
            check_object_name(chain)?;
            if !seen.insert(*chain) {
                return Err(BuilderError::DuplicateChainName(chain.to_string()));
            }
        }

        let tun = &self.tun_iface_name;
        if tun.is_empty() || tun.len() >= IFNAMSIZ || tun.as_bytes().contains(&0) {
            return Err(BuilderError::InvalidInterfaceName(tun.clone()));
        }
        Ok(())
    }
}

/// Where the tunnel handshake goes, and through which interface it leaves the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub addr: SocketAddrV4,
    pub egress_iface: String,
}

impl GatewayConfig {
    /// Reads `GATEWAY_IP`, `GATEWAY_PORT` and `OIFName` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](GatewayConfig::from_env), reading the variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| match lookup(name) {
            None => Err(ConfigError::MissingVariable { name }),
            Some(value) if value.is_empty() => Err(ConfigError::EmptyVariable { name }),
            Some(value) => Ok(value),
        };

        let host = required(GATEWAY_IP_VAR)?;
        let raw_port = required(GATEWAY_PORT_VAR)?;
        let port = raw_port
            .parse::<u16>()
            .map_err(|source| ConfigError::InvalidPort {
                name: GATEWAY_PORT_VAR,
                value: raw_port.clone(),
                source,
            })?;

        let egress_iface = lookup(EGRESS_IFACE_VAR)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_EGRESS_IFACE.to_string());

        let addr = resolve_ipv4(&host, port)?;
        debug!("Gateway {}:{} resolved to {}", host, port, addr);

        Ok(GatewayConfig { addr, egress_iface })
    }

    pub fn ip(&self) -> IpAddr {
        IpAddr::V4(*self.addr.ip())
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddrV4, ConfigError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ConfigError::UnresolvableAddress {
            host: host.to_string(),
            port,
            source,
        })?;

    addrs
        .filter_map(|addr| match addr {
            SocketAddr::V4(addr) => Some(addr),
            SocketAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| ConfigError::NoIpv4Address {
            host: host.to_string(),
            port,
        })
}

// Copyright (c) 2024 GPL the routesentry developers
//
// This file is free software: you may copy, redistribute and/or modify it
// under the terms of the GNU General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This file is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see the LICENSE file.

//! Brings a host into a locked-down ("kill switch") state before a tunnel is established.
//!
//! Two things happen, once, at process start:
//!
//! 1. a /32 host route toward the tunnel gateway is added on the egress interface (see
//!    [`RouteManager`]), so that the handshake can leave the host outside the tunnel;
//! 2. a default-deny nf_tables policy is installed (see [`Firewall`]): one table, three base
//!    chains (input, output, forward) with a drop policy, and a small set of allow rules built
//!    with a [`RuleBuilder`].
//!
//! The policy is sent to the kernel as a single nfnetlink batch, so the kernel either applies
//! the whole of it or none of it. The previous ruleset of the host is discarded in that same
//! batch: this crate assumes it owns the packet filter.
//!
//! Everything is synchronous and talks netlink directly through `nix` sockets. The kernel
//! facing parts sit behind the [`RulesetTransport`] and [`RouteTransport`] traits.
//!
//! ```no_run
//! use killswitch::{configure_blackhole, BlackholePolicy, Firewall, FirewallConfig};
//! use killswitch::{GatewayConfig, RouteManager};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = GatewayConfig::from_env()?;
//! RouteManager::new()?.add_host_route(&gateway.egress_iface, gateway.ip())?;
//!
//! let mut firewall = Firewall::new(FirewallConfig::default())?;
//! configure_blackhole(&mut firewall, &BlackholePolicy::default(), &gateway)?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

#[macro_use]
extern crate log;

pub mod sys;

mod error;
pub use error::{BuilderError, DecodeError, QueryError};

pub mod nlmsg;
pub mod parser;

mod batch;
pub use batch::{default_batch_page_size, Batch, FinalizedBatch};

pub mod query;

mod table;
pub use table::Table;

mod chain;
pub use chain::{Chain, ChainPolicy, ChainPriority, ChainType, Hook, HookClass, FILTER_PRIORITY};

mod rule;
pub use rule::Rule;

pub mod expr;

mod rule_builder;
pub use rule_builder::{
    htons, IfaceDirection, L4Proto, Load, MatchExpression, MatchStep, RuleBuilder, ToData,
};

mod transport;
pub use transport::{NetlinkTransport, RulesetTransport};

mod config;
pub use config::{
    ConfigError, FirewallConfig, GatewayConfig, DEFAULT_EGRESS_IFACE, EGRESS_IFACE_VAR,
    GATEWAY_IP_VAR, GATEWAY_PORT_VAR,
};

mod firewall;
pub use firewall::{ChainSelector, Firewall, FirewallError};

mod route;
pub use route::{
    host_route, new_route_message, Link, RouteError, RouteManager, RouteTransport, RtNetlink,
};

mod bringup;
pub use bringup::{
    bring_up, configure_blackhole, BlackholePolicy, BringUpError, LOOPBACK_IFACE_NAME,
};

#[cfg(test)]
mod tests;

/// The type of the message as it's sent to netfilter. A message consists of an object, such as a
/// [`Table`], [`Chain`] or [`Rule`] for example, and a [`MsgType`] to describe what to do with
/// that object. If a [`Table`] object is sent with `MsgType::Add` then that table will be added
/// to netfilter, if sent with `MsgType::Del` it will be removed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MsgType {
    /// Add the object to netfilter.
    Add,
    /// Remove the object from netfilter.
    Del,
}

/// Denotes a protocol. Used to specify which protocol a table belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ProtocolFamily {
    Unspec = sys::NFPROTO_UNSPEC,
    /// Inet - Means both IPv4 and IPv6
    Inet = sys::NFPROTO_INET,
    Ipv4 = sys::NFPROTO_IPV4,
    Arp = sys::NFPROTO_ARP,
    NetDev = sys::NFPROTO_NETDEV,
    Bridge = sys::NFPROTO_BRIDGE,
    Ipv6 = sys::NFPROTO_IPV6,
}

impl Default for ProtocolFamily {
    fn default() -> Self {
        Self::Unspec
    }
}

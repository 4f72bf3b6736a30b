use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, GatewayConfig};
use crate::error::BuilderError;
use crate::expr::{ConnTrackState, VerdictKind};
use crate::firewall::{ChainSelector, Firewall, FirewallError};
use crate::route::{RouteError, RouteManager, RouteTransport};
use crate::rule_builder::L4Proto;
use crate::transport::RulesetTransport;

pub const LOOPBACK_IFACE_NAME: &str = "lo";

#[derive(Error, Debug)]
pub enum BringUpError {
    #[error("Invalid configuration")]
    Config(#[from] ConfigError),

    #[error("Unable to add the gateway route")]
    Route(#[from] RouteError),

    #[error("Unable to set up the firewall")]
    Firewall(#[from] FirewallError),

    #[error("Unable to build a blackhole rule")]
    Rule(#[from] BuilderError),
}

/// The allow rules added to the blackhole ruleset on top of the loopback one. None of them is
/// enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlackholePolicy {
    /// Let everything out through the tunnel interface.
    pub allow_tunnel: bool,
    /// Let the UDP handshake out to the gateway through the egress interface.
    pub allow_handshake: bool,
    /// Let in the packets of established and related connections.
    pub allow_established: bool,
}

/// Fills `firewall` with the blackhole ruleset and applies it: everything is dropped except the
/// traffic sent to the loopback interface, and whatever `policy` additionally allows.
pub fn configure_blackhole<T: RulesetTransport>(
    firewall: &mut Firewall<T>,
    policy: &BlackholePolicy,
    gateway: &GatewayConfig,
) -> Result<(), BringUpError> {
    let loopback = firewall
        .new_rule_builder(ChainSelector::Output)
        .match_oif_name(LOOPBACK_IFACE_NAME)
        .verdict(VerdictKind::Accept)
        .build()?;
    firewall.add_rule(loopback);

    if policy.allow_tunnel {
        let tunnel = firewall
            .new_rule_builder(ChainSelector::Output)
            .match_oif_name(firewall.tun_iface_name())
            .verdict(VerdictKind::Accept)
            .build()?;
        firewall.add_rule(tunnel);
    }

    if policy.allow_handshake {
        let handshake = firewall
            .new_rule_builder(ChainSelector::Output)
            .match_oif_name(gateway.egress_iface.as_str())
            .match_l4proto(L4Proto::UDP)
            .match_destination_ip(gateway.ip())
            .match_udp_dest_port(gateway.port())
            .verdict(VerdictKind::Accept)
            .build()?;
        firewall.add_rule(handshake);
    }

    if policy.allow_established {
        let established = firewall
            .new_rule_builder(ChainSelector::Input)
            .ct_state_in(ConnTrackState::ESTABLISHED | ConnTrackState::RELATED)
            .verdict(VerdictKind::Accept)
            .build()?;
        firewall.add_rule(established);
    }

    firewall.flush()?;
    Ok(())
}

/// The whole bring-up: reads the gateway configuration through `lookup`, connects to the routing
/// table with `make_routes` and routes the gateway through the egress interface, then creates the
/// firewall with `make_firewall` and applies the blackhole ruleset.
///
/// Each step only runs once the previous one succeeded: an incomplete configuration opens no
/// socket and changes nothing, and a missing egress interface leaves the packet filter untouched.
pub fn bring_up<L, R, T, FR, FF>(
    lookup: L,
    make_routes: FR,
    policy: &BlackholePolicy,
    make_firewall: FF,
) -> Result<(RouteManager<R>, Firewall<T>), BringUpError>
where
    L: Fn(&str) -> Option<String>,
    R: RouteTransport,
    T: RulesetTransport,
    FR: FnOnce() -> Result<RouteManager<R>, RouteError>,
    FF: FnOnce() -> Result<Firewall<T>, FirewallError>,
{
    let gateway = GatewayConfig::from_lookup(lookup)?;

    let mut routes = make_routes()?;
    info!(
        "Routing gateway {} through {}",
        gateway.addr, gateway.egress_iface
    );
    routes.add_host_route(&gateway.egress_iface, gateway.ip())?;

    let mut firewall = make_firewall()?;
    configure_blackhole(&mut firewall, policy, &gateway)?;
    info!("Blackhole ruleset applied");
    Ok((routes, firewall))
}

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::os::unix::prelude::FromRawFd;

use ipnetwork::Ipv4Network;
use netlink_packet_core::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST};
use nix::errno::Errno;
use nix::unistd::close;

use crate::parser::get_nlmsghdr;
use crate::{
    new_route_message, Link, QueryError, RouteError, RouteManager, RouteTransport, RtNetlink,
};

use super::{
    has_pending_datagram, raw_nlmsgerr, send_replies, socket_pair, FakeRoutes, NetlinkExpr,
};

const RTM_NEWROUTE: u16 = 24;
const RTA_DST: u16 = 1;
const RTA_OIF: u16 = 4;

fn eth0() -> Link {
    Link {
        name: "eth0".to_string(),
        index: 2,
    }
}

fn gateway_route() -> Ipv4Network {
    Ipv4Network::from(Ipv4Addr::new(192, 0, 2, 1))
}

/// Adds the gateway route over a socket pair, with `replies` already queued by the kernel side.
fn add_route_with_replies(replies: &[Vec<u8>]) -> Result<(), RouteError> {
    let (sock, kernel) = socket_pair();
    send_replies(kernel, replies);

    let mut rtnl = unsafe { RtNetlink::from_raw_fd(sock) };
    let res = rtnl.add_route(&eth0(), gateway_route());

    // the request reached the kernel side
    assert!(has_pending_datagram(kernel));
    drop(rtnl);
    close(kernel).unwrap();
    res
}

#[test]
fn route_message_layout() {
    let buf = new_route_message(&eth0(), gateway_route(), 7);

    let hdr = get_nlmsghdr(&buf).unwrap();
    assert_eq!(hdr.nlmsg_len, 44);
    assert_eq!(hdr.nlmsg_len as usize, buf.len());
    assert_eq!(hdr.nlmsg_type, RTM_NEWROUTE);
    assert_eq!(
        hdr.nlmsg_flags,
        NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL
    );
    assert_eq!(hdr.nlmsg_seq, 7);

    // family, /32, main table, boot protocol, link scope, unicast
    assert_eq!(&buf[16..28], &[2, 32, 0, 0, 254, 3, 253, 1, 0, 0, 0, 0]);

    assert_eq!(
        &buf[28..],
        NetlinkExpr::List(vec![
            NetlinkExpr::Final(RTA_DST, vec![192, 0, 2, 1]),
            NetlinkExpr::Final(RTA_OIF, 2u32.to_ne_bytes().to_vec()),
        ])
        .to_raw()
        .as_slice()
    );
}

#[test]
fn host_route_is_added_once() {
    let mut routes = RouteManager::with_transport(FakeRoutes::with_links(&["lo", "eth0"]));
    let gateway = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 4));

    routes.add_host_route("eth0", gateway).unwrap();
    // the second call hits the existing route and still succeeds
    routes.add_host_route("eth0", gateway).unwrap();

    let transport = routes.transport();
    assert_eq!(transport.add_attempts, 2);
    assert_eq!(
        transport.routes,
        vec![(
            Link {
                name: "eth0".to_string(),
                index: 2,
            },
            Ipv4Network::new(Ipv4Addr::new(198, 51, 100, 4), 32).unwrap(),
        )]
    );
}

#[test]
fn unknown_interface() {
    let mut routes = RouteManager::with_transport(FakeRoutes::with_links(&["lo"]));
    match routes.add_host_route("eth0", IpAddr::V4(Ipv4Addr::new(198, 51, 100, 4))) {
        Err(RouteError::LinkNotFound { name, .. }) => assert_eq!(name, "eth0"),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(routes.transport().add_attempts, 0);
}

#[test]
fn ipv6_gateway_is_rejected() {
    let mut routes = RouteManager::with_transport(FakeRoutes::with_links(&["eth0"]));
    let gateway = IpAddr::V6(Ipv6Addr::LOCALHOST);
    match routes.add_host_route("eth0", gateway) {
        Err(RouteError::NotIpv4(addr)) => assert_eq!(addr, gateway),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(routes.transport().routes.is_empty());
}

#[test]
fn acknowledged_route() {
    add_route_with_replies(&[raw_nlmsgerr(1, 0)]).unwrap();
}

#[test]
fn existing_route_is_reported() {
    match add_route_with_replies(&[raw_nlmsgerr(1, libc::EEXIST)]) {
        Err(RouteError::AlreadyExists) => {}
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn rejected_route() {
    match add_route_with_replies(&[raw_nlmsgerr(1, libc::ENETUNREACH)]) {
        Err(RouteError::AddRoute {
            destination,
            iface,
            source,
        }) => {
            assert_eq!(destination, gateway_route());
            assert_eq!(iface, "eth0");
            assert!(matches!(
                source,
                QueryError::NetlinkError {
                    seq: 1,
                    errno: Errno::ENETUNREACH
                }
            ));
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn answers_to_other_requests_are_skipped() {
    let res = add_route_with_replies(&[raw_nlmsgerr(5, libc::EINVAL), raw_nlmsgerr(1, 0)]);
    res.unwrap();
}

use std::net::IpAddr;
use std::os::unix::prelude::{FromRawFd, RawFd};

use ipnetwork::Ipv4Network;
use netlink_packet_core::{
    NetlinkMessage, NetlinkPayload, NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST,
};
use netlink_packet_route::route::{
    RouteAddress, RouteAttribute, RouteMessage, RouteProtocol, RouteScope, RouteType,
};
use netlink_packet_route::{AddressFamily, RouteNetlinkMessage};
use nix::errno::Errno;
use nix::sys::socket::{self, MsgFlags, SockProtocol};
use thiserror::Error;

use crate::error::QueryError;
use crate::parser::{nft_nlmsg_maxsize, pad_netlink_object_with_variable_size};
use crate::query::{open_socket, send_all};

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Unable to connect to the routing subsystem")]
    Connect(#[source] QueryError),

    #[error("Network interface {name:?} not found")]
    LinkNotFound {
        name: String,
        #[source]
        source: Errno,
    },

    #[error("Only IPv4 gateways are supported, got {0}")]
    NotIpv4(IpAddr),

    #[error("The route already exists")]
    AlreadyExists,

    #[error("Unable to add the route to {destination} via {iface:?}")]
    AddRoute {
        destination: Ipv4Network,
        iface: String,
        #[source]
        source: QueryError,
    },
}

/// A network interface, resolved to its kernel index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub name: String,
    pub index: u32,
}

/// Access to the kernel routing table.
pub trait RouteTransport {
    fn resolve_link(&mut self, name: &str) -> Result<Link, RouteError>;

    /// Adds a route to `destination` through `link`. Fails with [`RouteError::AlreadyExists`] when
    /// the route is already there.
    fn add_route(&mut self, link: &Link, destination: Ipv4Network) -> Result<(), RouteError>;
}

const RT_TABLE_MAIN: u8 = 254;

/// A link scoped unicast route to `destination` through `link`, in the main table.
pub fn host_route(link: &Link, destination: Ipv4Network) -> RouteMessage {
    let mut route = RouteMessage::default();
    route.header.address_family = AddressFamily::Inet;
    route.header.destination_prefix_length = destination.prefix();
    route.header.table = RT_TABLE_MAIN;
    route.header.protocol = RouteProtocol::Boot;
    route.header.scope = RouteScope::Link;
    route.header.kind = RouteType::Unicast;
    route
        .attributes
        .push(RouteAttribute::Destination(RouteAddress::Inet(destination.ip())));
    route.attributes.push(RouteAttribute::Oif(link.index));
    route
}

/// Serializes a `RTM_NEWROUTE` request for [`host_route`]. The request fails if the route exists.
pub fn new_route_message(link: &Link, destination: Ipv4Network, seq: u32) -> Vec<u8> {
    let mut msg = NetlinkMessage::from(RouteNetlinkMessage::NewRoute(host_route(
        link,
        destination,
    )));
    msg.header.flags = NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL;
    msg.header.sequence_number = seq;
    msg.finalize();

    let mut buf = vec![0; msg.buffer_len()];
    msg.serialize(&mut buf);
    buf
}

/// [`RouteTransport`] over a `NETLINK_ROUTE` socket.
#[derive(Debug)]
pub struct RtNetlink {
    sock: RawFd,
    seq: u32,
}

impl RtNetlink {
    pub fn connect() -> Result<Self, QueryError> {
        let sock = open_socket(SockProtocol::NetlinkRoute)?;
        debug!("Opened rtnetlink socket {}", sock);
        Ok(RtNetlink { sock, seq: 0 })
    }

    /// Waits for the answer to request `seq`: `None` when it was acknowledged, the errno the
    /// kernel rejected it with otherwise.
    fn recv_ack(&self, seq: u32) -> Result<Option<Errno>, QueryError> {
        let mut msg_buffer = vec![0; nft_nlmsg_maxsize() as usize];

        loop {
            let nb_recv = socket::recv(self.sock, &mut msg_buffer, MsgFlags::empty())
                .map_err(QueryError::NetlinkRecvError)?;
            if nb_recv == 0 {
                return Err(QueryError::UnexpectedEof);
            }

            let mut pos = 0;
            while pos < nb_recv {
                let msg = NetlinkMessage::<RouteNetlinkMessage>::deserialize(
                    &msg_buffer[pos..nb_recv],
                )
                .map_err(|e| QueryError::InvalidReply(e.to_string()))?;
                let len = msg.header.length as usize;
                if len == 0 {
                    break;
                }

                if msg.header.sequence_number != seq {
                    trace!("Ignoring reply to seq {}", msg.header.sequence_number);
                } else if let NetlinkPayload::Error(err) = msg.payload {
                    return Ok(err.code.map(|code| Errno::from_i32(code.get().abs())));
                }
                pos += pad_netlink_object_with_variable_size(len);
            }
        }
    }
}

impl FromRawFd for RtNetlink {
    /// Takes ownership of an already connected rtnetlink socket.
    unsafe fn from_raw_fd(sock: RawFd) -> Self {
        RtNetlink { sock, seq: 0 }
    }
}

impl RouteTransport for RtNetlink {
    fn resolve_link(&mut self, name: &str) -> Result<Link, RouteError> {
        let index = nix::net::if_::if_nametoindex(name).map_err(|source| {
            RouteError::LinkNotFound {
                name: name.to_string(),
                source,
            }
        })?;
        Ok(Link {
            name: name.to_string(),
            index,
        })
    }

    fn add_route(&mut self, link: &Link, destination: Ipv4Network) -> Result<(), RouteError> {
        self.seq += 1;
        let seq = self.seq;
        let msg = new_route_message(link, destination, seq);
        trace!("Sending RTM_NEWROUTE with seq {}", seq);

        let add_error = |source| RouteError::AddRoute {
            destination,
            iface: link.name.clone(),
            source,
        };
        send_all(self.sock, &msg).map_err(add_error)?;
        match self.recv_ack(seq).map_err(add_error)? {
            None => Ok(()),
            Some(Errno::EEXIST) => Err(RouteError::AlreadyExists),
            Some(errno) => Err(add_error(QueryError::NetlinkError { seq, errno })),
        }
    }
}

impl Drop for RtNetlink {
    fn drop(&mut self) {
        if let Err(e) = nix::unistd::close(self.sock) {
            warn!("Couldn't close the rtnetlink socket: {}", e);
        }
    }
}

/// Adds the host route that lets the tunnel handshake reach its gateway outside the tunnel.
#[derive(Debug)]
pub struct RouteManager<T: RouteTransport = RtNetlink> {
    transport: T,
}

impl RouteManager<RtNetlink> {
    pub fn new() -> Result<Self, RouteError> {
        let transport = RtNetlink::connect().map_err(RouteError::Connect)?;
        Ok(RouteManager { transport })
    }
}

impl<T: RouteTransport> RouteManager<T> {
    pub fn with_transport(transport: T) -> Self {
        RouteManager { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Routes `gateway`/32 through `iface`. Succeeds when the route already exists.
    pub fn add_host_route(&mut self, iface: &str, gateway: IpAddr) -> Result<(), RouteError> {
        let link = self.transport.resolve_link(iface)?;

        let gateway = match gateway {
            IpAddr::V4(addr) => addr,
            IpAddr::V6(_) => return Err(RouteError::NotIpv4(gateway)),
        };
        let destination = Ipv4Network::from(gateway);

        match self.transport.add_route(&link, destination) {
            Ok(()) => {
                info!("Added route to {} via {}", destination, link.name);
                Ok(())
            }
            Err(RouteError::AlreadyExists) => {
                info!("Route to {} via {} already exists", destination, link.name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

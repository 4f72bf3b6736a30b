use std::net::IpAddr;

use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("The buffer is too small to hold a valid message")]
    BufTooSmall,

    #[error("The message is too small")]
    NlMsgTooSmall,

    #[error("Invalid subsystem, expected NFTABLES")]
    InvalidSubsystem(u8),

    #[error("Invalid version, expected NFNETLINK_V0")]
    InvalidVersion(u8),

    #[error("The generation number was bumped in the kernel while the operation was running, interrupting it")]
    ConcurrentGenerationUpdate,

    #[error("Unsupported message type")]
    UnsupportedType(u16),
}

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("The length of the arguments are not compatible with each other")]
    IncompatibleLength,

    #[error("The name {0:?} is empty or longer than the kernel accepts")]
    InvalidName(String),

    #[error("The chains of a table must have distinct names, {0:?} is used twice")]
    DuplicateChainName(String),

    #[error("The interface name {0:?} does not fit in IFNAMSIZ or contains a NUL byte")]
    InvalidInterfaceName(String),

    #[error("Only IPv4 addresses can be matched, got {0}")]
    NotIpv4(IpAddr),

    #[error("The rule has no verdict")]
    MissingVerdict,

    #[error("Missing name for the chain or the table it belongs to")]
    MissingChainInformation,

    #[error("Match step {step} reads register {read:?} but loads into {loaded:?}")]
    RegisterMismatch {
        step: usize,
        loaded: crate::expr::Register,
        read: crate::expr::Register,
    },

    #[error("Match step {step} compares {compared} bytes against a {loaded} bytes field")]
    DataLengthMismatch {
        step: usize,
        loaded: usize,
        compared: usize,
    },
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unable to open netlink socket to netfilter")]
    NetlinkOpenError(#[source] nix::Error),

    #[error("Unable to send netlink command to netfilter")]
    NetlinkSendError(#[source] nix::Error),

    #[error("Error while reading from netlink socket")]
    NetlinkRecvError(#[source] nix::Error),

    #[error("Error while processing an incoming netlink message")]
    ProcessNetlinkError(#[from] DecodeError),

    #[error("Error received from the kernel for message {seq}")]
    NetlinkError {
        seq: u32,
        #[source]
        errno: Errno,
    },

    #[error("Only a part of the message was sent")]
    TruncatedSend,

    #[error("The socket was closed before all the acknowledgements were received")]
    UnexpectedEof,

    #[error("Unable to decode a netlink reply: {0}")]
    InvalidReply(String),
}

impl QueryError {
    /// The errno the kernel answered with, if the kernel rejected the request.
    pub fn kernel_errno(&self) -> Option<Errno> {
        match self {
            QueryError::NetlinkError { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

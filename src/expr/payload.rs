use super::{Expression, Register};
use crate::create_wrapper_type;
use crate::sys::{self, NFT_PAYLOAD_NETWORK_HEADER, NFT_PAYLOAD_TRANSPORT_HEADER};

create_wrapper_type!(
    /// Loads `len` bytes found at `offset` in one of the packet headers into `dreg`.
    nested : Payload,
    [
        (get_dreg, set_dreg, with_dreg, sys::NFTA_PAYLOAD_DREG, dreg, Register),
        (get_base, set_base, with_base, sys::NFTA_PAYLOAD_BASE, base, u32),
        (get_offset, set_offset, with_offset, sys::NFTA_PAYLOAD_OFFSET, offset, u32),
        (get_len, set_len, with_len, sys::NFTA_PAYLOAD_LEN, len, u32),
    ]
);

impl Expression for Payload {
    fn get_name() -> &'static str {
        "payload"
    }
}

/// A header field, named instead of located by hand.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HighLevelPayload {
    Network(NetworkHeaderField),
    Transport(TransportHeaderField),
}

impl HighLevelPayload {
    /// The payload expression loading the field into `Reg1`.
    pub fn build(&self) -> Payload {
        let (base, (offset, len)) = match self {
            HighLevelPayload::Network(field) => (NFT_PAYLOAD_NETWORK_HEADER, field.span()),
            HighLevelPayload::Transport(field) => (NFT_PAYLOAD_TRANSPORT_HEADER, field.span()),
        };
        Payload::default()
            .with_dreg(Register::Reg1)
            .with_base(base)
            .with_offset(offset)
            .with_len(len)
    }
}

pub trait HeaderField {
    /// Offset and length of the field, in bytes from the start of its header.
    fn span(&self) -> (u32, u32);
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum NetworkHeaderField {
    IPv4(IPv4HeaderField),
}

impl HeaderField for NetworkHeaderField {
    fn span(&self) -> (u32, u32) {
        match self {
            NetworkHeaderField::IPv4(field) => field.span(),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum IPv4HeaderField {
    Saddr,
    Daddr,
}

impl HeaderField for IPv4HeaderField {
    fn span(&self) -> (u32, u32) {
        match self {
            IPv4HeaderField::Saddr => (12, 4),
            IPv4HeaderField::Daddr => (16, 4),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum TransportHeaderField {
    Udp(UDPHeaderField),
}

impl HeaderField for TransportHeaderField {
    fn span(&self) -> (u32, u32) {
        match self {
            TransportHeaderField::Udp(field) => field.span(),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum UDPHeaderField {
    Dport,
}

impl HeaderField for UDPHeaderField {
    fn span(&self) -> (u32, u32) {
        match self {
            UDPHeaderField::Dport => (2, 2),
        }
    }
}

use super::{Expression, Register};
use crate::create_wrapper_type;
use crate::nlmsg::NfNetlinkAttribute;
use crate::sys;

/// A meta expression refers to meta data associated with a packet.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
#[non_exhaustive]
pub enum MetaType {
    /// Packet length.
    Len = sys::NFT_META_LEN,
    /// Packet ethertype protocol (skb->protocol), invalid in OUTPUT.
    Protocol = sys::NFT_META_PROTOCOL,
    /// Packet mark.
    Mark = sys::NFT_META_MARK,
    /// Packet input interface index (dev->ifindex).
    Iif = sys::NFT_META_IIF,
    /// Packet output interface index (dev->ifindex).
    Oif = sys::NFT_META_OIF,
    /// Packet input interface name (dev->name).
    IifName = sys::NFT_META_IIFNAME,
    /// Packet output interface name (dev->name).
    OifName = sys::NFT_META_OIFNAME,
    /// Netfilter protocol (Transport layer protocol).
    NfProto = sys::NFT_META_NFPROTO,
    /// Layer 4 protocol number.
    L4Proto = sys::NFT_META_L4PROTO,
}

impl MetaType {
    /// Number of bytes the kernel writes in the destination register for this key.
    pub fn data_len(&self) -> usize {
        match *self {
            MetaType::IifName | MetaType::OifName => sys::IFNAMSIZ,
            MetaType::NfProto | MetaType::L4Proto => 1,
            MetaType::Protocol => 2,
            MetaType::Len | MetaType::Mark | MetaType::Iif | MetaType::Oif => 4,
        }
    }
}

impl NfNetlinkAttribute for MetaType {
    fn get_size(&self) -> usize {
        (*self as u32).get_size()
    }

    fn write_payload(&self, buf: &mut [u8]) {
        (*self as u32).write_payload(buf);
    }
}

create_wrapper_type!(
    nested : Meta,
    [
        (get_dreg, set_dreg, with_dreg, sys::NFTA_META_DREG, dreg, Register),
        (get_key, set_key, with_key, sys::NFTA_META_KEY, key, MetaType),
        (get_sreg, set_sreg, with_sreg, sys::NFTA_META_SREG, sreg, Register),
    ]
);

impl Meta {
    /// Loads the `key` property of the packet into the first register.
    pub fn new(key: MetaType) -> Self {
        Meta::default().with_dreg(Register::Reg1).with_key(key)
    }
}

impl Expression for Meta {
    fn get_name() -> &'static str {
        "meta"
    }
}

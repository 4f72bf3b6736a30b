use crate::create_wrapper_type;
use crate::nlmsg::NfNetlinkAttribute;
use crate::sys::{
    NFTA_CT_DIRECTION, NFTA_CT_DREG, NFTA_CT_KEY, NFT_CT_DIRECTION, NFT_CT_MARK, NFT_CT_STATE,
    NFT_CT_STATUS,
};

use super::{Expression, Register};

bitflags::bitflags! {
    /// The conntrack states a `ct state` match can test, as the kernel lays them out in the
    /// 32-bit `ct state` value.
    pub struct ConnTrackState: u32 {
        const INVALID = 1;
        const ESTABLISHED = 2;
        const RELATED = 4;
        const NEW = 8;
        const UNTRACKED = 64;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ConntrackKey {
    State = NFT_CT_STATE,
    Direction = NFT_CT_DIRECTION,
    Status = NFT_CT_STATUS,
    Mark = NFT_CT_MARK,
}

impl ConntrackKey {
    /// Number of bytes the kernel writes in the destination register for this key.
    pub fn data_len(&self) -> usize {
        match *self {
            ConntrackKey::Direction => 1,
            ConntrackKey::State | ConntrackKey::Status | ConntrackKey::Mark => 4,
        }
    }
}

impl NfNetlinkAttribute for ConntrackKey {
    fn get_size(&self) -> usize {
        (*self as u32).get_size()
    }

    fn write_payload(&self, buf: &mut [u8]) {
        (*self as u32).write_payload(buf);
    }
}

create_wrapper_type!(
    nested : Conntrack,
    [
        (get_dreg, set_dreg, with_dreg, NFTA_CT_DREG, dreg, Register),
        (get_key, set_key, with_key, NFTA_CT_KEY, key, ConntrackKey),
        (get_direction, set_direction, with_direction, NFTA_CT_DIRECTION, direction, u8),
    ]
);

impl Expression for Conntrack {
    fn get_name() -> &'static str {
        "ct"
    }
}

impl Conntrack {
    pub fn new(key: ConntrackKey) -> Self {
        Self::default().with_dreg(Register::Reg1).with_key(key)
    }
}

use serde::{Deserialize, Serialize};

use crate::create_wrapper_type;
use crate::nlmsg::NfNetlinkAttribute;
use crate::sys::{
    NFTA_VERDICT_CHAIN, NFTA_VERDICT_CODE, NFT_BREAK, NFT_CONTINUE, NFT_GOTO, NFT_JUMP,
    NFT_RETURN, NF_ACCEPT, NF_DROP, NF_QUEUE,
};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(i32)]
pub enum VerdictType {
    Drop = NF_DROP,
    Accept = NF_ACCEPT,
    Queue = NF_QUEUE,
    Continue = NFT_CONTINUE,
    Break = NFT_BREAK,
    Jump = NFT_JUMP,
    Goto = NFT_GOTO,
    Return = NFT_RETURN,
}

impl NfNetlinkAttribute for VerdictType {
    fn get_size(&self) -> usize {
        (*self as i32).get_size()
    }

    fn write_payload(&self, buf: &mut [u8]) {
        (*self as i32).write_payload(buf);
    }
}

create_wrapper_type!(
    nested : Verdict,
    [
        (get_code, set_code, with_code, NFTA_VERDICT_CODE, code, VerdictType),
        (get_chain, set_chain, with_chain, NFTA_VERDICT_CHAIN, chain, String),
    ]
);

/// The action applied to a packet matched by a rule.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    /// Silently drop the packet.
    Drop,
    /// Accept the packet and let it pass.
    Accept,
    Queue,
    Continue,
    Break,
    Jump {
        chain: String,
    },
    Goto {
        chain: String,
    },
    Return,
}

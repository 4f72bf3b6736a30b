use serde::{Deserialize, Serialize};

use crate::nlmsg::{NfNetlinkAttribute, NfNetlinkObject};
use crate::sys::{
    NFTA_CHAIN_HOOK, NFTA_CHAIN_NAME, NFTA_CHAIN_POLICY, NFTA_CHAIN_TABLE, NFTA_CHAIN_TYPE,
    NFTA_HOOK_HOOKNUM, NFTA_HOOK_PRIORITY, NFT_MSG_DELCHAIN, NFT_MSG_NEWCHAIN, NF_ACCEPT, NF_DROP,
    NF_INET_FORWARD, NF_INET_LOCAL_IN, NF_INET_LOCAL_OUT, NF_INET_POST_ROUTING,
    NF_INET_PRE_ROUTING,
};
use crate::{create_wrapper_type, ProtocolFamily, Table};

pub type ChainPriority = i32;

/// Priority of the `filter` hooks, `NF_IP_PRI_FILTER`.
pub const FILTER_PRIORITY: ChainPriority = 0;

/// The netfilter event hooks a chain can register for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum HookClass {
    /// Hook into the pre-routing stage of netfilter. Corresponds to `NF_INET_PRE_ROUTING`.
    PreRouting = NF_INET_PRE_ROUTING,
    /// Hook into the input stage of netfilter. Corresponds to `NF_INET_LOCAL_IN`.
    In = NF_INET_LOCAL_IN,
    /// Hook into the forward stage of netfilter. Corresponds to `NF_INET_FORWARD`.
    Forward = NF_INET_FORWARD,
    /// Hook into the output stage of netfilter. Corresponds to `NF_INET_LOCAL_OUT`.
    Out = NF_INET_LOCAL_OUT,
    /// Hook into the post-routing stage of netfilter. Corresponds to `NF_INET_POST_ROUTING`.
    PostRouting = NF_INET_POST_ROUTING,
}

create_wrapper_type!(
    nested : Hook,
    [
        (get_class, set_class, with_class, NFTA_HOOK_HOOKNUM, class, u32),
        (get_priority, set_priority, with_priority, NFTA_HOOK_PRIORITY, priority, u32),
    ]
);

impl Hook {
    pub fn new(class: HookClass, priority: ChainPriority) -> Self {
        Hook::default()
            .with_class(class as u32)
            .with_priority(priority as u32)
    }
}

/// A chain policy. Decides what to do with a packet that was processed by the chain but did not
/// match any rules.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ChainPolicy {
    /// Accept the packet.
    Accept = NF_ACCEPT,
    /// Drop the packet.
    Drop = NF_DROP,
}

impl NfNetlinkAttribute for ChainPolicy {
    fn get_size(&self) -> usize {
        (*self as i32).get_size()
    }

    fn write_payload(&self, buf: &mut [u8]) {
        (*self as i32).write_payload(buf);
    }
}

/// Base chain type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ChainType {
    /// Used to filter packets.
    /// Supported protocols: ip, ip6, inet, arp, and bridge tables.
    Filter,
    /// Used to reroute packets if IP headers or packet marks are modified.
    /// Supported protocols: ip, and ip6 tables.
    Route,
    /// Used to perform NAT.
    /// Supported protocols: ip, and ip6 tables.
    Nat,
}

impl ChainType {
    fn as_str(&self) -> &'static str {
        match *self {
            ChainType::Filter => "filter",
            ChainType::Route => "route",
            ChainType::Nat => "nat",
        }
    }
}

impl NfNetlinkAttribute for ChainType {
    fn get_size(&self) -> usize {
        self.as_str().len() + 1
    }

    fn write_payload(&self, buf: &mut [u8]) {
        self.as_str().to_string().write_payload(buf);
    }
}

create_wrapper_type!(
    /// Abstraction of a `nftnl_chain`. Chains reside inside [`Table`]s and they hold [`Rule`]s.
    ///
    /// A chain with a [`Hook`] is a "base chain": netfilter feeds it packets directly, and its
    /// policy decides the fate of the packets no rule matched.
    ///
    /// [`Rule`]: crate::Rule
    object : Chain,
    [
        (get_table, set_table, with_table, NFTA_CHAIN_TABLE, table, String),
        (get_name, set_name, with_name, NFTA_CHAIN_NAME, name, String),
        (get_hook, set_hook, with_hook, NFTA_CHAIN_HOOK, hook, Hook),
        (get_policy, set_policy, with_policy, NFTA_CHAIN_POLICY, policy, ChainPolicy),
        (get_type, set_type, with_type, NFTA_CHAIN_TYPE, chain_type, ChainType),
    ]
);

impl Chain {
    /// Creates a new chain instance inside the given [`Table`].
    pub fn new(table: &Table) -> Chain {
        let mut chain = Chain::default().with_family(table.get_family());

        if let Some(table_name) = table.get_name() {
            chain.set_table(table_name.as_str());
        }

        chain
    }

    /// A filter base chain registered on `class` at the filter priority, with the given policy.
    pub fn new_base(table: &Table, name: &str, class: HookClass, policy: ChainPolicy) -> Chain {
        Chain::new(table)
            .with_name(name)
            .with_hook(Hook::new(class, FILTER_PRIORITY))
            .with_type(ChainType::Filter)
            .with_policy(policy)
    }
}

impl NfNetlinkObject for Chain {
    const MSG_TYPE_ADD: u16 = NFT_MSG_NEWCHAIN;
    const MSG_TYPE_DEL: u16 = NFT_MSG_DELCHAIN;

    fn get_family(&self) -> ProtocolFamily {
        self.family
    }
}

use crate::nlmsg::NfNetlinkObject;
use crate::sys::{NFTA_TABLE_FLAGS, NFTA_TABLE_NAME, NFT_MSG_DELTABLE, NFT_MSG_NEWTABLE};
use crate::{create_wrapper_type, ProtocolFamily};

create_wrapper_type!(
    /// Abstraction of a `nftnl_table`, the top level container in netfilter. A table has a
    /// protocol family and contains [`Chain`]s that in turn hold the rules.
    ///
    /// A table with no name and the `Unspec` family, sent with [`MsgType::Del`], deletes every
    /// table of the host (this is what `nft flush ruleset` does).
    ///
    /// [`Chain`]: crate::Chain
    /// [`MsgType::Del`]: crate::MsgType::Del
    object : Table,
    [
        (get_name, set_name, with_name, NFTA_TABLE_NAME, name, String),
        (get_flags, set_flags, with_flags, NFTA_TABLE_FLAGS, flags, u32),
    ]
);

impl Table {
    /// Creates a new table instance with the given protocol family. Name it with
    /// [`with_name`](Table::with_name).
    pub fn new(family: ProtocolFamily) -> Table {
        Table::default().with_family(family)
    }

    /// The object that wipes out the whole ruleset once deleted.
    pub fn whole_ruleset() -> Table {
        Table::new(ProtocolFamily::Unspec)
    }
}

impl NfNetlinkObject for Table {
    const MSG_TYPE_ADD: u16 = NFT_MSG_NEWTABLE;
    const MSG_TYPE_DEL: u16 = NFT_MSG_DELTABLE;

    fn get_family(&self) -> ProtocolFamily {
        self.family
    }
}

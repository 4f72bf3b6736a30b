use std::os::unix::prelude::RawFd;

use nix::sys::socket::SockProtocol;

use crate::batch::Batch;
use crate::error::QueryError;
use crate::query::open_socket;
use crate::{Chain, MsgType, Rule, Table};

/// Stages nf_tables objects and applies them to the kernel in one transaction.
///
/// Nothing reaches the kernel before [`commit`](RulesetTransport::commit), and a failed commit
/// leaves the kernel ruleset as it was. Either way the staged objects are discarded.
pub trait RulesetTransport {
    /// Stages the removal of every table of every family.
    fn flush_ruleset(&mut self);

    fn add_table(&mut self, table: &Table);

    fn add_chain(&mut self, chain: &Chain);

    /// Stages a rule, appended after the rules already in its chain.
    fn add_rule(&mut self, rule: &Rule);

    fn commit(&mut self) -> Result<(), QueryError>;
}

/// [`RulesetTransport`] over a `NETLINK_NETFILTER` socket: the staged objects form one nfnetlink
/// batch.
#[derive(Debug)]
pub struct NetlinkTransport {
    sock: RawFd,
    batch: Batch,
}

impl NetlinkTransport {
    pub fn connect() -> Result<Self, QueryError> {
        let sock = open_socket(SockProtocol::NetlinkNetFilter)?;
        debug!("Opened nfnetlink socket {}", sock);
        Ok(NetlinkTransport {
            sock,
            batch: Batch::new(),
        })
    }
}

impl RulesetTransport for NetlinkTransport {
    fn flush_ruleset(&mut self) {
        self.batch.add(&Table::whole_ruleset(), MsgType::Del);
    }

    fn add_table(&mut self, table: &Table) {
        self.batch.add(table, MsgType::Add);
    }

    fn add_chain(&mut self, chain: &Chain) {
        self.batch.add(chain, MsgType::Add);
    }

    fn add_rule(&mut self, rule: &Rule) {
        self.batch.add(rule, MsgType::Add);
    }

    fn commit(&mut self) -> Result<(), QueryError> {
        let batch = std::mem::replace(&mut self.batch, Batch::new());
        batch.finalize().send_on(self.sock)
    }
}

impl Drop for NetlinkTransport {
    fn drop(&mut self) {
        if let Err(e) = nix::unistd::close(self.sock) {
            warn!("Couldn't close the nfnetlink socket: {}", e);
        }
    }
}

use thiserror::Error;

use crate::chain::{ChainPolicy, HookClass};
use crate::config::FirewallConfig;
use crate::error::{BuilderError, QueryError};
use crate::transport::{NetlinkTransport, RulesetTransport};
use crate::{Chain, Rule, RuleBuilder, Table};

#[derive(Error, Debug)]
pub enum FirewallError {
    #[error("Unable to connect to netfilter")]
    Connect(#[source] QueryError),

    #[error("Invalid firewall configuration")]
    InvalidConfig(#[from] BuilderError),

    #[error("Unable to apply the ruleset of table {table:?}")]
    Flush {
        table: String,
        #[source]
        source: QueryError,
    },
}

/// Designates one of the three base chains of a [`Firewall`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ChainSelector {
    Input,
    Output,
    Forward,
}

/// Owner of one nf_tables table and of its input, output and forward base chains, all with a
/// drop policy.
///
/// Creating the firewall stages the removal of the whole host ruleset followed by the table and
/// chain declarations. Rules are kept in memory until [`flush`](Firewall::flush) sends everything
/// staged in a single transaction.
#[derive(Debug)]
pub struct Firewall<T: RulesetTransport = NetlinkTransport> {
    transport: T,
    table: Table,
    input: Chain,
    output: Chain,
    forward: Chain,
    tun_iface_name: String,
    pending: Vec<Rule>,
    // the table and chains are in the kernel, a ruleset reset must not be sent again
    declared: bool,
    // the declarations are waiting in the transport for the next commit
    declarations_staged: bool,
}

impl Firewall<NetlinkTransport> {
    pub fn new(config: FirewallConfig) -> Result<Self, FirewallError> {
        config.validate()?;
        let transport = NetlinkTransport::connect().map_err(FirewallError::Connect)?;
        Firewall::with_transport(config, transport)
    }
}

impl<T: RulesetTransport> Firewall<T> {
    pub fn with_transport(config: FirewallConfig, transport: T) -> Result<Self, FirewallError> {
        config.validate()?;

        let table = Table::new(config.table_family).with_name(config.table_name.as_str());
        let input = Chain::new_base(
            &table,
            &config.input_chain_name,
            HookClass::In,
            ChainPolicy::Drop,
        );
        let output = Chain::new_base(
            &table,
            &config.output_chain_name,
            HookClass::Out,
            ChainPolicy::Drop,
        );
        let forward = Chain::new_base(
            &table,
            &config.forward_chain_name,
            HookClass::Forward,
            ChainPolicy::Drop,
        );

        let mut firewall = Firewall {
            transport,
            table,
            input,
            output,
            forward,
            tun_iface_name: config.tun_iface_name,
            pending: Vec::new(),
            declared: false,
            declarations_staged: false,
        };
        firewall.stage_declarations();
        info!(
            "Staged table {} with drop policy chains {}, {} and {}",
            config.table_name,
            config.input_chain_name,
            config.output_chain_name,
            config.forward_chain_name
        );
        Ok(firewall)
    }

    fn stage_declarations(&mut self) {
        self.transport.flush_ruleset();
        self.transport.add_table(&self.table);
        for chain in &[&self.input, &self.output, &self.forward] {
            self.transport.add_chain(chain);
        }
        self.declarations_staged = true;
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn chain(&self, selector: ChainSelector) -> &Chain {
        match selector {
            ChainSelector::Input => &self.input,
            ChainSelector::Output => &self.output,
            ChainSelector::Forward => &self.forward,
        }
    }

    pub fn tun_iface_name(&self) -> &str {
        &self.tun_iface_name
    }

    /// The rules added since the last successful flush.
    pub fn pending_rules(&self) -> &[Rule] {
        &self.pending
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a builder for a rule of the selected chain of this firewall's table.
    pub fn new_rule_builder(&self, selector: ChainSelector) -> RuleBuilder {
        let chain = self.chain(selector);
        RuleBuilder::new(
            self.table.get_family(),
            self.table.get_name().map(String::as_str).unwrap_or_default(),
            chain.get_name().map(String::as_str).unwrap_or_default(),
        )
    }

    /// Queues a rule for the next flush. Nothing is sent to the kernel.
    pub fn add_rule(&mut self, rule: Rule) {
        self.pending.push(rule);
    }

    /// Applies the staged declarations and the pending rules in one transaction.
    ///
    /// On failure the kernel ruleset is left untouched and the pending rules are kept for another
    /// attempt. The declarations are sent again only as long as no flush went through, so a retry
    /// never resets rules applied by an earlier flush.
    pub fn flush(&mut self) -> Result<(), FirewallError> {
        if !self.declared && !self.declarations_staged {
            self.stage_declarations();
        }
        for rule in &self.pending {
            self.transport.add_rule(rule);
        }

        let res = self.transport.commit();
        // the transport drops what it staged, whatever the outcome
        self.declarations_staged = false;
        match res {
            Ok(()) => {
                info!(
                    "Applied {} rules to table {:?}",
                    self.pending.len(),
                    self.table.get_name()
                );
                self.pending.clear();
                self.declared = true;
                Ok(())
            }
            Err(source) => {
                error!("Failed to apply the ruleset: {}", source);
                Err(FirewallError::Flush {
                    table: self.table.get_name().cloned().unwrap_or_default(),
                    source,
                })
            }
        }
    }
}

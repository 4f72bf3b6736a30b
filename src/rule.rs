use crate::chain::Chain;
use crate::error::BuilderError;
use crate::expr::ExpressionList;
use crate::nlmsg::NfNetlinkObject;
use crate::sys::{
    NFTA_RULE_CHAIN, NFTA_RULE_EXPRESSIONS, NFTA_RULE_TABLE, NFT_MSG_DELRULE, NFT_MSG_NEWRULE,
    NLM_F_APPEND, NLM_F_CREATE,
};
use crate::{create_wrapper_type, ProtocolFamily};

create_wrapper_type!(
    /// A nftables firewall rule.
    object : Rule,
    [
        (get_table, set_table, with_table, NFTA_RULE_TABLE, table, String),
        (get_chain, set_chain, with_chain, NFTA_RULE_CHAIN, chain, String),
        (get_expressions, set_expressions, with_expressions, NFTA_RULE_EXPRESSIONS, expressions, ExpressionList),
    ]
);

impl Rule {
    /// Creates a new rule object in the given [`Chain`].
    pub fn new(chain: &Chain) -> Result<Rule, BuilderError> {
        let table = chain.get_table().ok_or(BuilderError::MissingChainInformation)?;
        let name = chain.get_name().ok_or(BuilderError::MissingChainInformation)?;
        Ok(Rule::default()
            .with_family(chain.get_family())
            .with_table(table.as_str())
            .with_chain(name.as_str()))
    }
}

impl NfNetlinkObject for Rule {
    const MSG_TYPE_ADD: u16 = NFT_MSG_NEWRULE;
    const MSG_TYPE_DEL: u16 = NFT_MSG_DELRULE;

    fn get_family(&self) -> ProtocolFamily {
        self.family
    }

    // append at the end of the chain, instead of the beginning
    fn get_add_flags(&self) -> u16 {
        NLM_F_CREATE | NLM_F_APPEND
    }
}

use crate::parser::get_operation_from_nlmsghdr_type;
use crate::sys::*;
use crate::{BuilderError, Chain, MsgType, Rule};

use super::{
    get_test_nlmsg, get_test_nlmsg_with_msg_type, get_test_rule, get_test_table, strz,
    NetlinkExpr, CHAIN_NAME, TABLE_NAME,
};

#[test]
fn new_empty_rule() {
    let rule = get_test_rule();
    let mut buf = Vec::new();
    let (nlmsghdr, _nfgenmsg, raw_expr) = get_test_nlmsg(&mut buf, &rule);
    assert_eq!(
        get_operation_from_nlmsghdr_type(nlmsghdr.nlmsg_type),
        NFT_MSG_NEWRULE as u8
    );
    // rules are appended at the end of their chain
    assert_eq!(
        nlmsghdr.nlmsg_flags,
        NLM_F_REQUEST | NLM_F_CREATE | NLM_F_APPEND | NLM_F_ACK
    );
    assert_eq!(nlmsghdr.nlmsg_len, 52);

    assert_eq!(
        raw_expr,
        NetlinkExpr::List(vec![
            NetlinkExpr::Final(NFTA_RULE_TABLE, strz(TABLE_NAME)),
            NetlinkExpr::Final(NFTA_RULE_CHAIN, strz(CHAIN_NAME)),
        ])
        .to_raw()
    );
}

#[test]
fn delete_empty_rule() {
    let rule = get_test_rule();
    let mut buf = Vec::new();
    let (nlmsghdr, _nfgenmsg, _raw_expr) =
        get_test_nlmsg_with_msg_type(&mut buf, &rule, MsgType::Del);
    assert_eq!(
        get_operation_from_nlmsghdr_type(nlmsghdr.nlmsg_type),
        NFT_MSG_DELRULE as u8
    );
    assert_eq!(nlmsghdr.nlmsg_flags, NLM_F_REQUEST | NLM_F_ACK);
    assert_eq!(nlmsghdr.nlmsg_len, 52);
}

#[test]
fn rule_needs_named_chain() {
    let chain = Chain::new(&get_test_table());
    match Rule::new(&chain) {
        Err(BuilderError::MissingChainInformation) => {}
        other => panic!("unexpected result {:?}", other),
    }
}

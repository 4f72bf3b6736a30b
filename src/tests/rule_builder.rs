use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::expr::{
    Cmp, CmpOp, ConnTrackState, HighLevelPayload, IPv4HeaderField, MetaType, NetworkHeaderField,
    Payload, Register, VerdictKind,
};
use crate::rule_builder::{htons, IfaceDirection, L4Proto, Load, MatchExpression, MatchStep, ToData};
use crate::{BuilderError, ProtocolFamily, RuleBuilder};

use super::{CHAIN_NAME, TABLE_NAME};

fn test_builder() -> RuleBuilder {
    RuleBuilder::new(ProtocolFamily::Inet, TABLE_NAME, CHAIN_NAME)
}

fn loaded_meta_keys(builder: &RuleBuilder) -> Vec<MetaType> {
    builder
        .steps()
        .unwrap()
        .iter()
        .map(|step| match &step.load {
            Load::Meta(meta) => *meta.get_key().unwrap(),
            other => panic!("unexpected load {:?}", other),
        })
        .collect()
}

#[test]
fn matches_keep_call_order() {
    let builder = test_builder()
        .match_l4proto(L4Proto::UDP)
        .match_oif_name("eth0")
        .match_l4proto(L4Proto::UDP)
        .verdict(VerdictKind::Accept);

    assert_eq!(
        builder.matches(),
        &[
            MatchExpression::L4ProtocolEquals(L4Proto::UDP),
            MatchExpression::InterfaceNameEquals(IfaceDirection::Output, "eth0".to_string()),
            MatchExpression::L4ProtocolEquals(L4Proto::UDP),
        ][..]
    );
    assert_eq!(
        loaded_meta_keys(&builder),
        vec![MetaType::L4Proto, MetaType::OifName, MetaType::L4Proto]
    );
    // one load and one compare per match, then the verdict
    assert_eq!(builder.build().unwrap().get_expressions().unwrap().len(), 7);
}

#[test]
fn built_rule_is_a_snapshot() {
    let builder = test_builder()
        .match_oif_name("lo")
        .verdict(VerdictKind::Accept);
    let rule = builder.build().unwrap();
    let snapshot = rule.clone();

    let builder = builder
        .match_l4proto(L4Proto::TCP)
        .verdict(VerdictKind::Drop);
    let other = builder.build().unwrap();

    assert_eq!(rule, snapshot);
    assert_ne!(rule, other);
    assert_eq!(rule.get_expressions().unwrap().len(), 3);
    assert_eq!(other.get_expressions().unwrap().len(), 5);
}

#[test]
fn rule_is_bound_to_builder_chain() {
    let rule = test_builder().verdict(VerdictKind::Accept).build().unwrap();
    assert_eq!(rule.get_table().unwrap(), TABLE_NAME);
    assert_eq!(rule.get_chain().unwrap(), CHAIN_NAME);
    assert_eq!(rule.get_family(), ProtocolFamily::Inet);
}

#[test]
fn l4proto_is_one_byte() {
    for code in 0..=255u8 {
        assert_eq!(L4Proto(code).to_data(), vec![code]);
    }
    assert_eq!(L4Proto::TCP.to_data(), vec![6]);
    assert_eq!(L4Proto::UDP.to_data(), vec![17]);
}

#[test]
fn port_is_big_endian() {
    assert_eq!(htons(51820), [0xCA, 0x6C]);

    let step = MatchExpression::TransportDstPortEquals(51820).lower().unwrap();
    assert_eq!(
        step.compare.get_data().unwrap().get_value().unwrap(),
        &vec![0xCA, 0x6C]
    );
}

#[test]
fn ct_state_step_is_masked() {
    let step = MatchExpression::ConnectionStateIntersects(ConnTrackState::ESTABLISHED)
        .lower()
        .unwrap();
    let mask = step.mask.as_ref().unwrap();
    assert_eq!(mask.get_len(), Some(&4));
    assert_eq!(
        mask.get_mask().unwrap().get_value().unwrap(),
        &2u32.to_ne_bytes().to_vec()
    );
    assert_eq!(step.compare.get_op(), Some(&CmpOp::Neq));
}

#[test]
fn missing_verdict() {
    match test_builder().match_oif_name("lo").build() {
        Err(BuilderError::MissingVerdict) => {}
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn last_verdict_wins() {
    let names = test_builder()
        .verdict(VerdictKind::Drop)
        .verdict(VerdictKind::Accept)
        .build()
        .unwrap();
    let accept = test_builder().verdict(VerdictKind::Accept).build().unwrap();
    assert_eq!(names, accept);
}

#[test]
fn ipv6_addresses_are_rejected() {
    let addr = IpAddr::V6(Ipv6Addr::LOCALHOST);
    match test_builder()
        .match_destination_ip(addr)
        .verdict(VerdictKind::Accept)
        .build()
    {
        Err(BuilderError::NotIpv4(a)) => assert_eq!(a, addr),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn interface_names_must_fit_ifnamsiz() {
    let fifteen = "a".repeat(15);
    assert!(test_builder()
        .match_oif_name(fifteen.as_str())
        .verdict(VerdictKind::Accept)
        .build()
        .is_ok());

    for name in &["a".repeat(16), "".to_string(), "et\0h0".to_string()] {
        match test_builder()
            .match_iif_name(name.as_str())
            .verdict(VerdictKind::Accept)
            .build()
        {
            Err(BuilderError::InvalidInterfaceName(n)) => assert_eq!(&n, name),
            other => panic!("unexpected result {:?}", other),
        }
    }
}

fn daddr() -> Payload {
    HighLevelPayload::Network(NetworkHeaderField::IPv4(IPv4HeaderField::Daddr)).build()
}

#[test]
fn compare_must_read_loaded_register() {
    let step = MatchStep::new(
        Load::Payload(daddr()),
        Cmp::new(CmpOp::Eq, Ipv4Addr::new(192, 0, 2, 1).to_data()).with_sreg(Register::Reg2),
    );
    match step.validate(3) {
        Err(BuilderError::RegisterMismatch { step, loaded, read }) => {
            assert_eq!(step, 3);
            assert_eq!(loaded, Register::Reg1);
            assert_eq!(read, Register::Reg2);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn compare_must_fit_loaded_field() {
    let step = MatchStep::new(
        Load::Payload(daddr()),
        Cmp::new(CmpOp::Eq, vec![192, 0, 2, 1, 0]),
    );
    match step.validate(0) {
        Err(BuilderError::DataLengthMismatch { step, loaded, compared }) => {
            assert_eq!(step, 0);
            assert_eq!(loaded, 4);
            assert_eq!(compared, 5);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn every_lowered_match_is_valid() {
    let exprs = vec![
        MatchExpression::InterfaceNameEquals(IfaceDirection::Input, "eth0".to_string()),
        MatchExpression::L4ProtocolEquals(L4Proto::TCP),
        MatchExpression::NetworkSrcAddressEquals(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        MatchExpression::NetworkDstAddressEquals(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        MatchExpression::TransportDstPortEquals(53),
        MatchExpression::ConnectionStateIntersects(ConnTrackState::all()),
    ];
    for (i, expr) in exprs.iter().enumerate() {
        let step = expr.lower().unwrap();
        step.validate(i).unwrap();
        assert_eq!(step.load.dreg(), Some(Register::Reg1));
    }
}

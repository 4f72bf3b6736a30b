use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::error::BuilderError;
use crate::expr::{
    Bitwise, Cmp, CmpOp, ConnTrackState, Conntrack, ConntrackKey, ExpressionList,
    HighLevelPayload, IPv4HeaderField, Immediate, Meta, MetaType, NetworkHeaderField, Payload,
    Register, TransportHeaderField, UDPHeaderField, VerdictKind,
};
use crate::sys::IFNAMSIZ;
use crate::{ProtocolFamily, Rule};

/// Serializes a match operand to the bytes the kernel compares the register against.
pub trait ToData {
    fn to_data(&self) -> Vec<u8>;
}

/// Host to network byte order. The result does not depend on the endianness of the host.
pub fn htons(port: u16) -> [u8; 2] {
    port.to_be_bytes()
}

/// A layer 4 protocol number, as found in the IPv4 `protocol` field.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct L4Proto(pub u8);

impl L4Proto {
    pub const TCP: L4Proto = L4Proto(libc::IPPROTO_TCP as u8);
    pub const UDP: L4Proto = L4Proto(libc::IPPROTO_UDP as u8);
}

impl ToData for L4Proto {
    fn to_data(&self) -> Vec<u8> {
        vec![self.0]
    }
}

impl ToData for Ipv4Addr {
    fn to_data(&self) -> Vec<u8> {
        self.octets().to_vec()
    }
}

impl ToData for ConnTrackState {
    // the ct state register is a host order u32
    fn to_data(&self) -> Vec<u8> {
        self.bits().to_ne_bytes().to_vec()
    }
}

/// Which interface of the packet an interface name match looks at.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IfaceDirection {
    /// The interface the packet came in from (`iifname`).
    Input,
    /// The interface the packet leaves through (`oifname`).
    Output,
}

impl IfaceDirection {
    fn meta_type(&self) -> MetaType {
        match *self {
            IfaceDirection::Input => MetaType::IifName,
            IfaceDirection::Output => MetaType::OifName,
        }
    }
}

/// A single test on one field of a packet. The tests of a rule are evaluated in order and all of
/// them must succeed for the verdict to apply.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum MatchExpression {
    InterfaceNameEquals(IfaceDirection, String),
    L4ProtocolEquals(L4Proto),
    NetworkSrcAddressEquals(IpAddr),
    NetworkDstAddressEquals(IpAddr),
    TransportDstPortEquals(u16),
    /// Matches when at least one of the states of the mask is set on the connection.
    ConnectionStateIntersects(ConnTrackState),
}

fn ipv4_of(addr: &IpAddr) -> Result<Ipv4Addr, BuilderError> {
    match addr {
        IpAddr::V4(addr) => Ok(*addr),
        IpAddr::V6(_) => Err(BuilderError::NotIpv4(*addr)),
    }
}

fn iface_name_data(name: &str) -> Result<Vec<u8>, BuilderError> {
    // the name is compared with its NUL terminator, which must fit in IFNAMSIZ
    if name.is_empty() || name.len() >= IFNAMSIZ || name.as_bytes().contains(&0) {
        return Err(BuilderError::InvalidInterfaceName(name.to_string()));
    }
    let mut data = name.as_bytes().to_vec();
    data.push(0);
    Ok(data)
}

impl MatchExpression {
    /// Translates the test into its load/compare form.
    pub fn lower(&self) -> Result<MatchStep, BuilderError> {
        Ok(match self {
            MatchExpression::InterfaceNameEquals(direction, name) => MatchStep::new(
                Load::Meta(Meta::new(direction.meta_type())),
                Cmp::new(CmpOp::Eq, iface_name_data(name)?),
            ),
            MatchExpression::L4ProtocolEquals(proto) => MatchStep::new(
                Load::Meta(Meta::new(MetaType::L4Proto)),
                Cmp::new(CmpOp::Eq, proto.to_data()),
            ),
            MatchExpression::NetworkSrcAddressEquals(addr) => MatchStep::new(
                Load::Payload(
                    HighLevelPayload::Network(NetworkHeaderField::IPv4(IPv4HeaderField::Saddr))
                        .build(),
                ),
                Cmp::new(CmpOp::Eq, ipv4_of(addr)?.to_data()),
            ),
            MatchExpression::NetworkDstAddressEquals(addr) => MatchStep::new(
                Load::Payload(
                    HighLevelPayload::Network(NetworkHeaderField::IPv4(IPv4HeaderField::Daddr))
                        .build(),
                ),
                Cmp::new(CmpOp::Eq, ipv4_of(addr)?.to_data()),
            ),
            MatchExpression::TransportDstPortEquals(port) => MatchStep::new(
                Load::Payload(
                    HighLevelPayload::Transport(TransportHeaderField::Udp(UDPHeaderField::Dport))
                        .build(),
                ),
                Cmp::new(CmpOp::Eq, htons(*port).to_vec()),
            ),
            MatchExpression::ConnectionStateIntersects(states) => {
                let mask = Bitwise::new(states.to_data(), vec![0u8; 4])?;
                MatchStep::new(
                    Load::Conntrack(Conntrack::new(ConntrackKey::State)),
                    Cmp::new(CmpOp::Neq, vec![0u8; 4]),
                )
                .with_mask(mask)
            }
        })
    }
}

/// The expression that brings a packet property into a register.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Load {
    Meta(Meta),
    Payload(Payload),
    Conntrack(Conntrack),
}

impl Load {
    /// The register the property is loaded into.
    pub fn dreg(&self) -> Option<Register> {
        match self {
            Load::Meta(meta) => meta.get_dreg().copied(),
            Load::Payload(payload) => payload.get_dreg().copied(),
            Load::Conntrack(ct) => ct.get_dreg().copied(),
        }
    }

    /// Number of meaningful bytes in the register after the load.
    pub fn data_len(&self) -> usize {
        match self {
            Load::Meta(meta) => meta.get_key().map(MetaType::data_len).unwrap_or(0),
            Load::Payload(payload) => payload.get_len().copied().unwrap_or(0) as usize,
            Load::Conntrack(ct) => ct.get_key().map(ConntrackKey::data_len).unwrap_or(0),
        }
    }

    fn append_to(&self, exprs: &mut ExpressionList) {
        match self {
            Load::Meta(meta) => exprs.add_expression(meta.clone()),
            Load::Payload(payload) => exprs.add_expression(payload.clone()),
            Load::Conntrack(ct) => exprs.add_expression(ct.clone()),
        }
    }
}

/// One test of a rule in register machine form: a load, an optional in-place mask and the
/// comparison that ends the rule evaluation on mismatch.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MatchStep {
    pub load: Load,
    pub mask: Option<Bitwise>,
    pub compare: Cmp,
}

impl MatchStep {
    pub fn new(load: Load, compare: Cmp) -> Self {
        MatchStep {
            load,
            mask: None,
            compare,
        }
    }

    pub fn with_mask(mut self, mask: Bitwise) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Checks that the mask and the comparison read the register the load wrote, and that they
    /// do not look past the loaded bytes. `step` is the position of the test in its rule.
    pub fn validate(&self, step: usize) -> Result<(), BuilderError> {
        let loaded = self.load.dreg().unwrap_or(Register::Verdict);
        let check_reg = |read: Option<&Register>| {
            let read = read.copied().unwrap_or(Register::Verdict);
            if loaded == Register::Verdict || read != loaded {
                Err(BuilderError::RegisterMismatch {
                    step,
                    loaded,
                    read,
                })
            } else {
                Ok(())
            }
        };

        let mut available = self.load.data_len();
        if let Some(mask) = &self.mask {
            check_reg(mask.get_sreg())?;
            check_reg(mask.get_dreg())?;
            let masked = mask.get_len().copied().unwrap_or(0) as usize;
            if masked == 0 || masked > available {
                return Err(BuilderError::DataLengthMismatch {
                    step,
                    loaded: available,
                    compared: masked,
                });
            }
            available = masked;
        }

        check_reg(self.compare.get_sreg())?;
        let compared = self.compare.data_len();
        if compared == 0 || compared > available {
            return Err(BuilderError::DataLengthMismatch {
                step,
                loaded: available,
                compared,
            });
        }
        Ok(())
    }

    fn append_to(&self, exprs: &mut ExpressionList) {
        self.load.append_to(exprs);
        if let Some(mask) = &self.mask {
            exprs.add_expression(mask.clone());
        }
        exprs.add_expression(self.compare.clone());
    }
}

/// Accumulates the tests and the verdict of a rule bound to one table and one chain.
///
/// Every method consumes the builder and hands it back, the tests keep the order of the calls:
///
/// ```
/// use killswitch::{ProtocolFamily, RuleBuilder};
/// use killswitch::expr::VerdictKind;
///
/// let rule = RuleBuilder::new(ProtocolFamily::Inet, "routesentry", "routesentry_output")
///     .match_oif_name("lo")
///     .verdict(VerdictKind::Accept)
///     .build()
///     .unwrap();
/// assert_eq!(rule.get_chain().unwrap(), "routesentry_output");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleBuilder {
    family: ProtocolFamily,
    table: String,
    chain: String,
    matches: Vec<MatchExpression>,
    verdict: Option<VerdictKind>,
}

impl RuleBuilder {
    pub fn new(family: ProtocolFamily, table: impl Into<String>, chain: impl Into<String>) -> Self {
        RuleBuilder {
            family,
            table: table.into(),
            chain: chain.into(),
            matches: Vec::new(),
            verdict: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// The tests added so far, in call order.
    pub fn matches(&self) -> &[MatchExpression] {
        &self.matches
    }

    pub fn with_match(mut self, expr: MatchExpression) -> Self {
        self.matches.push(expr);
        self
    }

    pub fn match_oif_name(self, name: impl Into<String>) -> Self {
        self.with_match(MatchExpression::InterfaceNameEquals(
            IfaceDirection::Output,
            name.into(),
        ))
    }

    pub fn match_iif_name(self, name: impl Into<String>) -> Self {
        self.with_match(MatchExpression::InterfaceNameEquals(
            IfaceDirection::Input,
            name.into(),
        ))
    }

    pub fn match_l4proto(self, proto: L4Proto) -> Self {
        self.with_match(MatchExpression::L4ProtocolEquals(proto))
    }

    pub fn match_source_ip(self, addr: IpAddr) -> Self {
        self.with_match(MatchExpression::NetworkSrcAddressEquals(addr))
    }

    pub fn match_destination_ip(self, addr: IpAddr) -> Self {
        self.with_match(MatchExpression::NetworkDstAddressEquals(addr))
    }

    /// Matches the destination port of the transport header. The port sits at the same offset
    /// in TCP and UDP headers, pair it with [`match_l4proto`](RuleBuilder::match_l4proto).
    pub fn match_udp_dest_port(self, port: u16) -> Self {
        self.with_match(MatchExpression::TransportDstPortEquals(port))
    }

    pub fn ct_state_in(self, states: ConnTrackState) -> Self {
        self.with_match(MatchExpression::ConnectionStateIntersects(states))
    }

    /// Sets the verdict of the rule. Calling it again replaces the previous verdict.
    pub fn verdict(mut self, verdict: VerdictKind) -> Self {
        self.verdict = Some(verdict);
        self
    }

    /// The register machine form of the tests, validated.
    pub fn steps(&self) -> Result<Vec<MatchStep>, BuilderError> {
        self.matches
            .iter()
            .enumerate()
            .map(|(i, expr)| {
                let step = expr.lower()?;
                step.validate(i)?;
                Ok(step)
            })
            .collect()
    }

    /// Packages the tests and the verdict in a [`Rule`]. The rule is a snapshot: using the builder
    /// afterwards does not alter it.
    pub fn build(&self) -> Result<Rule, BuilderError> {
        let verdict = self.verdict.clone().ok_or(BuilderError::MissingVerdict)?;

        let mut exprs = ExpressionList::builder();
        for step in self.steps()? {
            step.append_to(&mut exprs);
        }
        exprs.add_expression(Immediate::new_verdict(verdict));

        Ok(Rule::default()
            .with_family(self.family)
            .with_table(self.table.as_str())
            .with_chain(self.chain.as_str())
            .with_expressions(exprs))
    }
}

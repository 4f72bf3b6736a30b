use std::collections::HashMap;
use std::os::unix::prelude::RawFd;

use ipnetwork::Ipv4Network;
use nix::errno::Errno;
use nix::sys::socket::{self, AddressFamily, MsgFlags, SockFlag, SockType};

use crate::nlmsg::{NfNetlinkObject, NfNetlinkWriter};
use crate::parser::{parse_nlmsg, Nfgenmsg, NlMsg};
use crate::route::{Link, RouteError, RouteTransport};
use crate::transport::RulesetTransport;
use crate::{sys::*, Chain, MsgType, ProtocolFamily, QueryError, Rule, Table};

mod route;
mod rule;
mod rule_builder;

pub const TABLE_NAME: &str = "mocktable";
pub const CHAIN_NAME: &str = "mockchain";

type NetLinkType = u16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetlinkExpr {
    Nested(NetLinkType, Vec<NetlinkExpr>),
    Final(NetLinkType, Vec<u8>),
    List(Vec<NetlinkExpr>),
}

impl NetlinkExpr {
    /// Renders the attributes in the order they are listed.
    pub fn to_raw(self) -> Vec<u8> {
        match self {
            NetlinkExpr::Final(ty, val) => {
                let len = val.len() + 4;
                let mut res = Vec::with_capacity(len);

                res.extend(&(len as u16).to_ne_bytes());
                res.extend(&ty.to_ne_bytes());
                res.extend(val);
                // alignment
                while res.len() % 4 != 0 {
                    res.push(0);
                }

                res
            }
            NetlinkExpr::Nested(ty, exprs) => {
                let mut sub = Vec::with_capacity(exprs.len() * 50);

                for expr in exprs {
                    sub.append(&mut expr.to_raw());
                }

                let len = sub.len() + 4;
                let mut res = Vec::with_capacity(len);

                // set the "NESTED" flag
                res.extend(&(len as u16).to_ne_bytes());
                res.extend(&(ty | NLA_F_NESTED).to_ne_bytes());
                res.extend(sub);

                res
            }
            NetlinkExpr::List(exprs) => {
                let mut list = Vec::with_capacity(exprs.len() * 50);

                for expr in exprs {
                    list.append(&mut expr.to_raw());
                }

                list
            }
        }
    }
}

/// A NUL-terminated string attribute value.
pub fn strz(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}

/// One expression of a rule, as the kernel receives it.
pub fn raw_expr(name: &str, data: Vec<NetlinkExpr>) -> NetlinkExpr {
    NetlinkExpr::Nested(
        NFTA_LIST_ELEM,
        vec![
            NetlinkExpr::Final(NFTA_EXPR_NAME, strz(name)),
            NetlinkExpr::Nested(NFTA_EXPR_DATA, data),
        ],
    )
}

pub fn raw_data_value(attr: u16, value: Vec<u8>) -> NetlinkExpr {
    NetlinkExpr::Nested(attr, vec![NetlinkExpr::Final(NFTA_DATA_VALUE, value)])
}

pub fn raw_cmp(op: u32, value: Vec<u8>) -> NetlinkExpr {
    raw_expr(
        "cmp",
        vec![
            NetlinkExpr::Final(NFTA_CMP_SREG, NFT_REG_1.to_be_bytes().to_vec()),
            NetlinkExpr::Final(NFTA_CMP_OP, op.to_be_bytes().to_vec()),
            raw_data_value(NFTA_CMP_DATA, value),
        ],
    )
}

pub fn raw_meta(key: u32) -> NetlinkExpr {
    raw_expr(
        "meta",
        vec![
            NetlinkExpr::Final(NFTA_META_DREG, NFT_REG_1.to_be_bytes().to_vec()),
            NetlinkExpr::Final(NFTA_META_KEY, key.to_be_bytes().to_vec()),
        ],
    )
}

pub fn raw_payload(base: u32, offset: u32, len: u32) -> NetlinkExpr {
    raw_expr(
        "payload",
        vec![
            NetlinkExpr::Final(NFTA_PAYLOAD_DREG, NFT_REG_1.to_be_bytes().to_vec()),
            NetlinkExpr::Final(NFTA_PAYLOAD_BASE, base.to_be_bytes().to_vec()),
            NetlinkExpr::Final(NFTA_PAYLOAD_OFFSET, offset.to_be_bytes().to_vec()),
            NetlinkExpr::Final(NFTA_PAYLOAD_LEN, len.to_be_bytes().to_vec()),
        ],
    )
}

pub fn raw_verdict(code: i32) -> NetlinkExpr {
    raw_expr(
        "immediate",
        vec![
            NetlinkExpr::Final(NFTA_IMMEDIATE_DREG, NFT_REG_VERDICT.to_be_bytes().to_vec()),
            NetlinkExpr::Nested(
                NFTA_IMMEDIATE_DATA,
                vec![NetlinkExpr::Nested(
                    NFTA_DATA_VERDICT,
                    vec![NetlinkExpr::Final(
                        NFTA_VERDICT_CODE,
                        code.to_be_bytes().to_vec(),
                    )],
                )],
            ),
        ],
    )
}

/// The attributes of a rule of the test chain holding `exprs`.
pub fn raw_rule(exprs: Vec<NetlinkExpr>) -> NetlinkExpr {
    NetlinkExpr::List(vec![
        NetlinkExpr::Final(NFTA_RULE_TABLE, strz(TABLE_NAME)),
        NetlinkExpr::Final(NFTA_RULE_CHAIN, strz(CHAIN_NAME)),
        NetlinkExpr::Nested(NFTA_RULE_EXPRESSIONS, exprs),
    ])
}

pub fn get_test_table() -> Table {
    Table::new(ProtocolFamily::Inet)
        .with_name(TABLE_NAME)
        .with_flags(0u32)
}

pub fn get_test_chain() -> Chain {
    Chain::new(&get_test_table()).with_name(CHAIN_NAME)
}

pub fn get_test_rule() -> Rule {
    Rule::new(&get_test_chain()).unwrap()
}

pub fn get_test_nlmsg_with_msg_type<'a>(
    buf: &'a mut Vec<u8>,
    obj: &impl NfNetlinkObject,
    msg_type: MsgType,
) -> (nlmsghdr, Nfgenmsg, &'a [u8]) {
    let mut writer = NfNetlinkWriter::new(buf);
    obj.add_or_remove(&mut writer, msg_type, 0);

    let (hdr, msg) = parse_nlmsg(buf.as_slice()).expect("Couldn't parse the message");

    let (nfgenmsg, raw_value) = match msg {
        NlMsg::NfGenMsg(nfgenmsg, raw_value) => (nfgenmsg, raw_value),
        _ => panic!("Invalid return value type, expected a valid message"),
    };

    // sanity checks on the global message (this should be very similar/factorisable for the
    // most part in other tests)
    assert_eq!(nfgenmsg.res_id, 0);
    assert_eq!(hdr.nlmsg_len as usize, buf.len());

    (hdr, nfgenmsg, raw_value)
}

pub fn get_test_nlmsg<'a>(
    buf: &'a mut Vec<u8>,
    obj: &impl NfNetlinkObject,
) -> (nlmsghdr, Nfgenmsg, &'a [u8]) {
    get_test_nlmsg_with_msg_type(buf, obj, MsgType::Add)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged {
    FlushRuleset,
    Table(Table),
    Chain(Chain),
    Rule(Rule),
}

/// Records what a [`Firewall`](crate::Firewall) stages and commits. The commit attempts listed
/// in `failing_attempts` (counted from 1) are rejected, like a kernel refusing the batch.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub staged: Vec<Staged>,
    pub committed: Vec<Vec<Staged>>,
    pub failing_attempts: Vec<usize>,
    pub commit_attempts: usize,
}

impl RecordingTransport {
    pub fn failing_on(attempts: &[usize]) -> Self {
        RecordingTransport {
            failing_attempts: attempts.to_vec(),
            ..Default::default()
        }
    }

    /// Every object the kernel would hold after the successful commits.
    pub fn applied(&self) -> Vec<&Staged> {
        self.committed.iter().flatten().collect()
    }

    pub fn applied_rules(&self) -> Vec<&Rule> {
        self.applied()
            .into_iter()
            .filter_map(|s| match s {
                Staged::Rule(rule) => Some(rule),
                _ => None,
            })
            .collect()
    }

    pub fn applied_chains(&self) -> Vec<&Chain> {
        self.applied()
            .into_iter()
            .filter_map(|s| match s {
                Staged::Chain(chain) => Some(chain),
                _ => None,
            })
            .collect()
    }
}

impl RulesetTransport for RecordingTransport {
    fn flush_ruleset(&mut self) {
        self.staged.push(Staged::FlushRuleset);
    }

    fn add_table(&mut self, table: &Table) {
        self.staged.push(Staged::Table(table.clone()));
    }

    fn add_chain(&mut self, chain: &Chain) {
        self.staged.push(Staged::Chain(chain.clone()));
    }

    fn add_rule(&mut self, rule: &Rule) {
        self.staged.push(Staged::Rule(rule.clone()));
    }

    fn commit(&mut self) -> Result<(), QueryError> {
        self.commit_attempts += 1;
        let batch = std::mem::take(&mut self.staged);
        if self.failing_attempts.contains(&self.commit_attempts) {
            return Err(QueryError::NetlinkError {
                seq: 1,
                errno: Errno::EPERM,
            });
        }
        self.committed.push(batch);
        Ok(())
    }
}

/// An in-memory routing table with a fixed set of interfaces.
#[derive(Debug, Default)]
pub struct FakeRoutes {
    pub links: HashMap<String, u32>,
    pub routes: Vec<(Link, Ipv4Network)>,
    pub add_attempts: usize,
}

impl FakeRoutes {
    pub fn with_links(names: &[&str]) -> Self {
        FakeRoutes {
            links: names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.to_string(), i as u32 + 1))
                .collect(),
            ..Default::default()
        }
    }
}

impl RouteTransport for FakeRoutes {
    fn resolve_link(&mut self, name: &str) -> Result<Link, RouteError> {
        match self.links.get(name) {
            Some(&index) => Ok(Link {
                name: name.to_string(),
                index,
            }),
            None => Err(RouteError::LinkNotFound {
                name: name.to_string(),
                source: Errno::ENODEV,
            }),
        }
    }

    fn add_route(&mut self, link: &Link, destination: Ipv4Network) -> Result<(), RouteError> {
        self.add_attempts += 1;
        if self.routes.iter().any(|(_, dst)| *dst == destination) {
            return Err(RouteError::AlreadyExists);
        }
        self.routes.push((link.clone(), destination));
        Ok(())
    }
}

/// A `NLMSG_ERROR` answer to message `seq`, an acknowledgement when `errno` is 0.
pub fn raw_nlmsgerr(seq: u32, errno: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(36);
    buf.extend_from_slice(&36u32.to_ne_bytes());
    buf.extend_from_slice(&NLMSG_ERROR.to_ne_bytes());
    buf.extend_from_slice(&0u16.to_ne_bytes());
    buf.extend_from_slice(&seq.to_ne_bytes());
    buf.extend_from_slice(&0u32.to_ne_bytes());
    buf.extend_from_slice(&(-errno).to_ne_bytes());
    // header of the rejected request
    buf.extend_from_slice(&[0; 16]);
    buf
}

/// A connected pair of datagram sockets standing in for a netlink socket and the kernel.
pub fn socket_pair() -> (RawFd, RawFd) {
    socket::socketpair(
        AddressFamily::Unix,
        SockType::Datagram,
        None,
        SockFlag::empty(),
    )
    .unwrap()
}

/// Sends `replies` on `kernel` as a single datagram.
pub fn send_replies(kernel: RawFd, replies: &[Vec<u8>]) {
    let buf = replies.concat();
    assert_eq!(
        socket::send(kernel, &buf, MsgFlags::empty()).unwrap(),
        buf.len()
    );
}

/// Whether a datagram is waiting on `sock`.
pub fn has_pending_datagram(sock: RawFd) -> bool {
    let mut buf = [0u8; 64];
    match socket::recv(sock, &mut buf, MsgFlags::MSG_DONTWAIT) {
        Ok(_) => true,
        Err(Errno::EAGAIN) => false,
        Err(e) => panic!("unexpected error {}", e),
    }
}

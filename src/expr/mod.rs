//! A module with all the nftables expressions that can be added to [`Rule`]s to build up how
//! they match against packets.
//!
//! Expressions are the instructions of the nf_tables register machine: a load expression
//! ([`Meta`], [`Payload`], [`Conntrack`]) copies a packet property into a register, a [`Bitwise`]
//! expression transforms it in place, a [`Cmp`] expression ends the evaluation of the rule when
//! the register does not match, and an [`Immediate`] verdict decides the fate of the packet.
//!
//! [`Rule`]: crate::Rule

use crate::create_wrapper_type;
use crate::nlmsg::NfNetlinkAttribute;
use crate::parser::{attribute_size, write_attribute};
use crate::sys;

mod bitwise;
pub use self::bitwise::Bitwise;

mod cmp;
pub use self::cmp::{Cmp, CmpOp};

mod ct;
pub use self::ct::{ConnTrackState, Conntrack, ConntrackKey};

mod immediate;
pub use self::immediate::Immediate;

mod meta;
pub use self::meta::{Meta, MetaType};

mod payload;
pub use self::payload::{
    HeaderField, HighLevelPayload, IPv4HeaderField, NetworkHeaderField, Payload,
    TransportHeaderField, UDPHeaderField,
};

mod register;
pub use self::register::Register;

mod verdict;
pub use self::verdict::{Verdict, VerdictKind, VerdictType};

pub trait Expression {
    fn get_name() -> &'static str;
}

create_wrapper_type!(
    /// The `nft_data` union: either raw bytes or a verdict.
    nested : ExpressionData,
    [
        (get_value, set_value, with_value, sys::NFTA_DATA_VALUE, value, Vec<u8>),
        (get_verdict, set_verdict, with_verdict, sys::NFTA_DATA_VERDICT, verdict, Verdict),
    ]
);

macro_rules! create_expr_variant {
    ($enum:ident $(, [$name:ident, $type:ty])+) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $enum {
            $(
                $name($type),
            )+
        }

        impl $enum {
            /// The name the kernel registered the expression under.
            pub fn get_name(&self) -> &'static str {
                match self {
                    $(
                        $enum::$name(_) => <$type as Expression>::get_name(),
                    )+
                }
            }
        }

        impl NfNetlinkAttribute for $enum {
            fn is_nested(&self) -> bool {
                true
            }

            fn get_size(&self) -> usize {
                match self {
                    $(
                        $enum::$name(val) => val.get_size(),
                    )+
                }
            }

            fn write_payload(&self, buf: &mut [u8]) {
                match self {
                    $(
                        $enum::$name(val) => val.write_payload(buf),
                    )+
                }
            }
        }

        $(
            impl From<$type> for $enum {
                fn from(val: $type) -> Self {
                    $enum::$name(val)
                }
            }
        )+
    };
}

create_expr_variant!(
    ExpressionVariant,
    [Bitwise, Bitwise],
    [Cmp, Cmp],
    [Conntrack, Conntrack],
    [Immediate, Immediate],
    [Meta, Meta],
    [Payload, Payload]
);

create_wrapper_type!(
    /// One element of a rule's expression list: the expression name and its attributes.
    nested : RawExpression,
    [
        (get_name, set_name, with_name, sys::NFTA_EXPR_NAME, name, String),
        (get_data, set_data, with_data, sys::NFTA_EXPR_DATA, data, ExpressionVariant),
    ]
);

impl RawExpression {
    pub fn new<T>(expr: T) -> Self
    where
        T: Expression,
        ExpressionVariant: From<T>,
    {
        RawExpression::default()
            .with_name(T::get_name())
            .with_data(ExpressionVariant::from(expr))
    }
}

/// The ordered expressions of a rule. The kernel evaluates them in this order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpressionList {
    exprs: Vec<RawExpression>,
}

impl ExpressionList {
    pub fn builder() -> Self {
        Self { exprs: Vec::new() }
    }

    pub fn add_expression<T>(&mut self, e: T)
    where
        T: Expression,
        ExpressionVariant: From<T>,
    {
        self.exprs.push(RawExpression::new(e));
    }

    pub fn with_expression<T>(mut self, e: T) -> Self
    where
        T: Expression,
        ExpressionVariant: From<T>,
    {
        self.add_expression(e);
        self
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}

impl NfNetlinkAttribute for ExpressionList {
    fn is_nested(&self) -> bool {
        true
    }

    fn get_size(&self) -> usize {
        // one nlattr LIST_ELEM per object
        self.exprs.iter().map(attribute_size).sum()
    }

    fn write_payload(&self, buf: &mut [u8]) {
        let mut pos = 0;
        for item in &self.exprs {
            pos += write_attribute(sys::NFTA_LIST_ELEM, item, &mut buf[pos..]);
        }
    }
}

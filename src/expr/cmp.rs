use crate::create_wrapper_type;
use crate::nlmsg::NfNetlinkAttribute;
use crate::sys::{
    NFTA_CMP_DATA, NFTA_CMP_OP, NFTA_CMP_SREG, NFT_CMP_EQ, NFT_CMP_GT, NFT_CMP_GTE, NFT_CMP_LT,
    NFT_CMP_LTE, NFT_CMP_NEQ,
};

use super::{Expression, ExpressionData, Register};

/// Comparison operator.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum CmpOp {
    /// Equals.
    Eq = NFT_CMP_EQ,
    /// Not equal.
    Neq = NFT_CMP_NEQ,
    /// Less than.
    Lt = NFT_CMP_LT,
    /// Less than, or equal.
    Lte = NFT_CMP_LTE,
    /// Greater than.
    Gt = NFT_CMP_GT,
    /// Greater than, or equal.
    Gte = NFT_CMP_GTE,
}

impl NfNetlinkAttribute for CmpOp {
    fn get_size(&self) -> usize {
        (*self as u32).get_size()
    }

    fn write_payload(&self, buf: &mut [u8]) {
        (*self as u32).write_payload(buf);
    }
}

create_wrapper_type!(
    /// Comparator expression. Allows comparing the content of the netfilter register with any
    /// value.
    nested : Cmp,
    [
        (get_sreg, set_sreg, with_sreg, NFTA_CMP_SREG, sreg, Register),
        (get_op, set_op, with_op, NFTA_CMP_OP, op, CmpOp),
        (get_data, set_data, with_data, NFTA_CMP_DATA, data, ExpressionData),
    ]
);

impl Cmp {
    /// Returns a new comparison expression comparing the value loaded in the register with the
    /// data in `data` using the comparison operator `op`.
    pub fn new(op: CmpOp, data: impl Into<Vec<u8>>) -> Self {
        Cmp::default()
            .with_sreg(Register::Reg1)
            .with_op(op)
            .with_data(ExpressionData::default().with_value(data.into()))
    }

    /// Number of bytes compared.
    pub fn data_len(&self) -> usize {
        self.get_data()
            .and_then(|data| data.get_value())
            .map(|value| value.len())
            .unwrap_or(0)
    }
}

impl Expression for Cmp {
    fn get_name() -> &'static str {
        "cmp"
    }
}

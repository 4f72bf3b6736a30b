use super::{Expression, ExpressionData, Register, Verdict, VerdictKind, VerdictType};
use crate::create_wrapper_type;
use crate::sys::{NFTA_IMMEDIATE_DATA, NFTA_IMMEDIATE_DREG};

create_wrapper_type!(
    nested : Immediate,
    [
        (get_dreg, set_dreg, with_dreg, NFTA_IMMEDIATE_DREG, dreg, Register),
        (get_data, set_data, with_data, NFTA_IMMEDIATE_DATA, data, ExpressionData),
    ]
);

impl Immediate {
    pub fn new_verdict(kind: VerdictKind) -> Self {
        let code = match kind {
            VerdictKind::Drop => VerdictType::Drop,
            VerdictKind::Accept => VerdictType::Accept,
            VerdictKind::Queue => VerdictType::Queue,
            VerdictKind::Continue => VerdictType::Continue,
            VerdictKind::Break => VerdictType::Break,
            VerdictKind::Jump { .. } => VerdictType::Jump,
            VerdictKind::Goto { .. } => VerdictType::Goto,
            VerdictKind::Return => VerdictType::Return,
        };
        let mut data = Verdict::default().with_code(code);
        if let VerdictKind::Jump { chain } | VerdictKind::Goto { chain } = kind {
            data.set_chain(chain);
        }
        Immediate::default()
            .with_dreg(Register::Verdict)
            .with_data(ExpressionData::default().with_verdict(data))
    }
}

impl Expression for Immediate {
    fn get_name() -> &'static str {
        "immediate"
    }
}

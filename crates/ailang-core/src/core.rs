//! Core A-Normal Form: the post-elaboration tree where every compound
//! sub-expression is let-bound. Every node carries a stable [`NodeId`].

use std::sync::Arc;

use crate::ast::{BinOp, UnOp};
use crate::span::{NodeId, Span};

/// An atom is a variable or a literal — the only legal operand of an
/// application or primitive op in ANF.
#[derive(Debug, Clone)]
pub enum Atom {
    Var(Arc<str>),
    /// Reference into another module's bindings, resolved by the linker.
    ModuleVar { module: Arc<str>, name: Arc<str> },
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Bool(bool),
    Unit,
}

#[derive(Debug, Clone)]
pub struct CoreExpr {
    pub id: NodeId,
    pub span: Span,
    pub kind: CoreKind,
}

#[derive(Debug, Clone)]
pub enum CoreKind {
    Atom(Atom),
    Lambda {
        params: Vec<Arc<str>>,
        /// Set for `letrec`/`func` bindings so the evaluator's closure can
        /// resolve self-references before the outer binding is installed.
        self_name: Option<Arc<str>>,
        body: Box<CoreExpr>,
    },
    Apply {
        func: Box<CoreExpr>,
        args: Vec<Atom>,
    },
    Let {
        name: Arc<str>,
        value: Box<CoreExpr>,
        body: Box<CoreExpr>,
    },
    Letrec {
        bindings: Vec<(Arc<str>, CoreExpr)>,
        body: Box<CoreExpr>,
    },
    If {
        cond: Atom,
        then_branch: Box<CoreExpr>,
        else_branch: Box<CoreExpr>,
    },
    /// Pattern compilation replaces the clause list with a [`crate::pattern::DecisionTree`]
    /// by the time evaluation happens; the elaborator keeps the original clause
    /// list so the pattern compiler can run as a distinct pass.
    Match {
        scrutinee: Atom,
        clauses: Vec<MatchClause>,
    },
    RecordLit(Vec<(Arc<str>, Atom)>),
    RecordAccess {
        record: Atom,
        label: Arc<str>,
    },
    RecordExtend {
        record: Atom,
        fields: Vec<(Arc<str>, Atom)>,
    },
    RecordRestrict {
        record: Atom,
        labels: Vec<Arc<str>>,
    },
    Ctor {
        name: Arc<str>,
        args: Vec<Atom>,
    },
    PrimOp {
        op: PrimOp,
        args: Vec<Atom>,
    },
    /// Inserted by the dictionary elaborator: `let d = lookupDict(...) in d(args)`.
    DictLookup {
        module: Arc<str>,
        class: Arc<str>,
        ty: Arc<str>,
        method: Arc<str>,
    },
    DictApply {
        dict: Atom,
        args: Vec<Atom>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimOp {
    IntAdd,
    IntSub,
    IntMul,
    IntDiv,
    IntMod,
    FloatAdd,
    FloatSub,
    FloatMul,
    FloatDiv,
    Neg,
    Not,
    StrConcat,
    ListConcat,
    EqGeneric,
    NeGeneric,
    LtGeneric,
    LeGeneric,
    GtGeneric,
    GeGeneric,
}

impl PrimOp {
    #[must_use]
    pub fn from_binop(op: BinOp, is_float: bool) -> Option<Self> {
        Some(match (op, is_float) {
            (BinOp::Add, false) => Self::IntAdd,
            (BinOp::Add, true) => Self::FloatAdd,
            (BinOp::Sub, false) => Self::IntSub,
            (BinOp::Sub, true) => Self::FloatSub,
            (BinOp::Mul, false) => Self::IntMul,
            (BinOp::Mul, true) => Self::FloatMul,
            (BinOp::Div, false) => Self::IntDiv,
            (BinOp::Div, true) => Self::FloatDiv,
            (BinOp::Mod, false) => Self::IntMod,
            // Placeholder like the Int/Float arms above: the elaborator has no
            // type info yet, so this always picks `StrConcat`. `dict_elab`
            // rewrites it to `ListConcat` once the checker resolves a list
            // operand type.
            (BinOp::Concat, _) => Self::StrConcat,
            (BinOp::Eq, _) => Self::EqGeneric,
            (BinOp::Ne, _) => Self::NeGeneric,
            (BinOp::Lt, _) => Self::LtGeneric,
            (BinOp::Le, _) => Self::LeGeneric,
            (BinOp::Gt, _) => Self::GtGeneric,
            (BinOp::Ge, _) => Self::GeGeneric,
            (BinOp::Mod, true) | (BinOp::And, _) | (BinOp::Or, _) => return None,
        })
    }

    #[must_use]
    pub fn from_unop(op: UnOp) -> Self {
        match op {
            UnOp::Not => Self::Not,
            UnOp::Neg => Self::Neg,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchClause {
    pub pattern: crate::ast::Pattern,
    pub guard: Option<CoreExpr>,
    pub body: CoreExpr,
}

impl CoreExpr {
    #[must_use]
    pub fn new(id: NodeId, span: Span, kind: CoreKind) -> Self {
        Self { id, span, kind }
    }
}

//! The AST: a single tagged union over the expression/statement node kinds,
//! held in a flat arena (`Vec<Node>` + `NodeId` index) rather than a
//! `Box`-linked tree, the same shape used for the type graph
//! (`Type::Pointer`/`Type::Struct` hold indices rather than raw owning
//! pointers), generalized here to a recursive expression tree where only
//! the index is threaded around.

use crate::obj::ObjId;
use crate::ty::{MemberId, TypeId};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    LogAnd,
    LogOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Addr,
    Deref,
    Not,
    BitNot,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Binary { op: BinOp, lhs: NodeId, rhs: NodeId },
    Unary { op: UnaryOp, operand: NodeId },
    Assign { lhs: NodeId, rhs: NodeId },
    Comma { lhs: NodeId, rhs: NodeId },
    Member { base: NodeId, member: MemberId },
    Cond { cond: NodeId, then: NodeId, els: NodeId },

    Return(Option<NodeId>),
    If { cond: NodeId, then: NodeId, els: Option<NodeId> },
    While { cond: NodeId, body: NodeId, brk_label: String, cont_label: String },
    For { init: Option<NodeId>, cond: Option<NodeId>, inc: Option<NodeId>, body: NodeId, brk_label: String, cont_label: String },
    /// `cases`/`default_label` are the chain the code generator walks to
    /// emit the `cmp`+`je` ladder; `then` is the body, within which the
    /// matching `Case`/`Default` markers appear as ordinary statements so
    /// C's fallthrough semantics fall out of plain sequential emission.
    Switch { cond: NodeId, then: NodeId, cases: Vec<(i64, String)>, default_label: Option<String>, brk_label: String },
    Case { label: String },
    Default { label: String },
    Block(Vec<NodeId>),
    ExprStmt(NodeId),
    StmtExpr(Vec<NodeId>),

    Goto(String),
    Label { name: String, stmt: NodeId },

    FunCall { name: String, func_ty: TypeId, args: Vec<NodeId> },
    Var(ObjId),
    Num(i64),
    Cast(NodeId),
    /// Zeroes the full object before its initializer's element assignments
    /// run, for local variable initialization.
    MemZero(ObjId),
    NullExpr,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: Option<TypeId>,
    /// Line number of the representative token, for `.loc` directives and
    /// diagnostics.
    pub line: usize,
}

pub struct NodeArena {
    pub nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn push(&mut self, kind: NodeKind, ty: Option<TypeId>, line: usize) -> NodeId {
        self.nodes.push(Node { kind, ty, line });
        self.nodes.len() - 1
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn set_ty(&mut self, id: NodeId, ty: TypeId) {
        self.nodes[id].ty = Some(ty);
    }

    pub fn ty_of(&self, id: NodeId) -> Option<TypeId> {
        self.nodes[id].ty
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

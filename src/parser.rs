//! Recursive-descent parser and semantic analyzer. Builds the AST and
//! elaborates it in the same pass: each node receives its `Type` the
//! moment it is constructed (`Parser::build`), scopes are entered/left
//! around compound statements and function bodies, and desugaring
//! (compound assignment, increment/decrement, array indexing, `->`,
//! pointer-arithmetic scaling) happens at the point the surface syntax is
//! recognized rather than in a later pass.
//!
//! Ambient parser state (current function, current switch, break/continue
//! labels, goto/label lists) is threaded as explicit fields on `Parser`,
//! saved and restored at construct boundaries, rather than mutated through
//! global statics.

use anyhow::{bail, Context, Result};

use crate::ast::{BinOp, NodeArena, NodeId, NodeKind, UnaryOp};
use crate::obj::{assign_lvar_offsets, Obj, ObjId, Relocation};
use crate::scope::{Binding, ScopeStack};
use crate::token::{SourceFile, Token, TokenKind};
use crate::ty::struct_layout::{self, MemberBuilder};
use crate::ty::{MemberId, TyKind, TypeArena, TypeId, INCOMPLETE, UNSPECIFIED_LEN};

mod decl;
mod expr;
mod init;
mod stmt;

#[derive(Clone, Copy, Default)]
pub struct StorageClass {
    pub is_typedef: bool,
    pub is_static: bool,
}

struct SwitchCtx {
    cases: Vec<(i64, String)>,
    default_label: Option<String>,
}

/// A function-scoped `goto` awaiting resolution against that function's
/// collected labels. `node` is patched in place once the target label's
/// mangled, file-unique name is known.
struct PendingGoto {
    name: String,
    loc: usize,
    node: NodeId,
}

pub struct Parser<'a> {
    pub src: &'a SourceFile,
    toks: Vec<Token>,
    pos: usize,

    pub types: TypeArena,
    pub nodes: NodeArena,
    pub objs: Vec<Obj>,
    pub globals: Vec<ObjId>,
    scopes: ScopeStack,

    cur_fn_name: Option<String>,
    cur_fn_ret_ty: Option<TypeId>,
    cur_fn_locals: Vec<ObjId>,
    brk_label: Option<String>,
    cont_label: Option<String>,
    switch_ctx: Option<SwitchCtx>,
    fn_gotos: Vec<PendingGoto>,
    /// User label name -> mangled, file-unique assembler label, for the
    /// function currently being parsed.
    fn_labels: std::collections::HashMap<String, String>,
    label_count: usize,
    anon_count: usize,
    /// Parameter name tokens captured by the most recent `func_params`
    /// call, consumed by `parse_function` right after `declarator`
    /// returns: a small side-channel because a function type alone
    /// (`TyKind::Func`) doesn't carry parameter names.
    last_param_names: Option<Vec<String>>,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a SourceFile, toks: Vec<Token>) -> Self {
        Self {
            src,
            toks,
            pos: 0,
            types: TypeArena::new(),
            nodes: NodeArena::new(),
            objs: Vec::new(),
            globals: Vec::new(),
            scopes: ScopeStack::new(),
            cur_fn_name: None,
            cur_fn_ret_ty: None,
            cur_fn_locals: Vec::new(),
            brk_label: None,
            cont_label: None,
            switch_ctx: None,
            fn_gotos: Vec::new(),
            fn_labels: std::collections::HashMap::new(),
            label_count: 0,
            anon_count: 0,
            last_param_names: None,
        }
    }

    // -- token stream helpers -------------------------------------------------

    fn peek(&self) -> Token {
        self.toks[self.pos].clone()
    }

    fn peek_n(&self, n: usize) -> Token {
        self.toks[(self.pos + n).min(self.toks.len() - 1)].clone()
    }

    fn text(&self, t: &Token) -> &str {
        t.text(self.src)
    }

    fn is_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    /// `equal(tok, s)`: content comparison against a literal.
    fn at(&self, s: &str) -> bool {
        let t = self.peek();
        (t.kind == TokenKind::Punct || t.kind == TokenKind::Keyword || t.kind == TokenKind::Ident)
            && self.text(&t) == s
    }

    fn advance(&mut self) -> Token {
        let t = self.peek();
        if t.kind != TokenKind::Eof {
            self.pos += 1;
        }
        t
    }

    /// `consume(tok, s)`: soft skip, returns whether it matched.
    fn consume(&mut self, s: &str) -> bool {
        if self.at(s) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// `skip(tok, s)`: consume-or-diagnose.
    fn skip(&mut self, s: &str) -> Result<()> {
        if !self.consume(s) {
            let t = self.peek();
            return Err(self.err_tok(&t, format!("expected '{s}'")));
        }
        Ok(())
    }

    fn expect_ident(&mut self) -> Result<Token> {
        let t = self.peek();
        if t.kind != TokenKind::Ident {
            return Err(self.err_tok(&t, "expected an identifier"));
        }
        self.advance();
        Ok(t)
    }

    fn expect_num(&mut self) -> Result<i64> {
        let t = self.peek();
        if t.kind != TokenKind::Num {
            return Err(self.err_tok(&t, "expected a number"));
        }
        self.advance();
        Ok(t.val)
    }

    fn err_tok(&self, t: &Token, msg: impl Into<String>) -> anyhow::Error {
        self.src.error_at(t.loc, msg)
    }

    fn unique_label(&mut self, prefix: &str) -> String {
        let n = self.label_count;
        self.label_count += 1;
        format!(".L.{prefix}.{n}")
    }

    fn anon_name(&mut self) -> String {
        let n = self.anon_count;
        self.anon_count += 1;
        format!(".L.anon.{n}")
    }

    // -- node construction -----------------------------------------------------

    /// Pushes `kind` and immediately elaborates its `Type`, the way the
    /// whole front end works: one pass builds structure and types
    /// together instead of a separate `add_type` walk afterwards.
    fn build(&mut self, kind: NodeKind, line: usize) -> Result<NodeId> {
        let ty = self.infer_type(&kind, line)?;
        Ok(self.nodes.push(kind, ty, line))
    }

    fn new_num(&mut self, val: i64, line: usize) -> NodeId {
        self.build(NodeKind::Num(val), line).expect("Num never fails type inference")
    }

    // -- objects ----------------------------------------------------------------

    fn new_obj(&mut self, obj: Obj) -> ObjId {
        self.objs.push(obj);
        self.objs.len() - 1
    }

    fn new_lvar(&mut self, name: String, ty: TypeId) -> ObjId {
        let id = self.new_obj(Obj::new_local(name.clone(), ty));
        self.scopes.declare_var(name, Binding::Var(id));
        self.cur_fn_locals.push(id);
        id
    }

    fn new_lvar_anon(&mut self, ty: TypeId) -> ObjId {
        let name = self.anon_name();
        let id = self.new_obj(Obj::new_local(name, ty));
        self.cur_fn_locals.push(id);
        id
    }

    fn new_gvar(&mut self, name: String, ty: TypeId) -> ObjId {
        let id = self.new_obj(Obj::new_global(name.clone(), ty));
        self.scopes.declare_var(name, Binding::Var(id));
        self.globals.push(id);
        id
    }

    pub fn finish(self) -> (TypeArena, NodeArena, Vec<Obj>, Vec<ObjId>) {
        (self.types, self.nodes, self.objs, self.globals)
    }
}

pub fn align_to(n: i64, align: i64) -> i64 {
    (n + align - 1) / align * align
}

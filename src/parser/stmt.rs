//! Statement grammar: compound statements, control flow, in-block
//! declarations, and the break/continue/goto/label bookkeeping that lets
//! desugared `Goto` nodes agree with the labels their enclosing loop/switch
//! will itself emit.

use super::*;

impl<'a> Parser<'a> {
    /// Parses the body of a block already past its opening `{`, consuming
    /// the closing `}`.
    pub(super) fn compound_stmt(&mut self) -> Result<NodeId> {
        let line = self.peek().line;
        self.scopes.enter();
        let mut stmts = Vec::new();
        while !self.at("}") {
            if self.is_typename() {
                self.declaration(&mut stmts)?;
            } else {
                stmts.push(self.stmt()?);
            }
        }
        self.advance(); // `}`
        self.scopes.leave();
        self.build(NodeKind::Block(stmts), line)
    }

    /// `declaration = declspec (declarator ("=" initializer)? ("," declarator ("=" initializer)?)*)? ";"`
    fn declaration(&mut self, stmts: &mut Vec<NodeId>) -> Result<()> {
        let (base, sc) = self.declspec()?;

        if sc.is_typedef {
            loop {
                let (ty, name) = self.declarator(base)?;
                let name = name.ok_or_else(|| self.err_tok(&self.peek(), "typedef requires a name"))?;
                let ident = self.text(&name).to_string();
                self.scopes.declare_var(ident, Binding::Typedef(ty));
                if !self.consume(",") {
                    break;
                }
            }
            self.skip(";")?;
            return Ok(());
        }

        if self.consume(";") {
            return Ok(());
        }

        loop {
            let (ty, name) = self.declarator(base)?;
            let name_tok = name.ok_or_else(|| self.err_tok(&self.peek(), "expected a declarator name"))?;
            let ident = self.text(&name_tok).to_string();

            if sc.is_static {
                self.declare_local_static(ident, ty)?;
            } else {
                let obj = self.new_lvar(ident, ty);
                if self.consume("=") {
                    let (_, init_stmts) = self.local_initializer(obj, ty)?;
                    stmts.extend(init_stmts);
                }
            }

            if !self.consume(",") {
                break;
            }
        }
        self.skip(";")?;
        Ok(())
    }

    /// A function-local `static` lives in `.data`/`.bss` like a global, but
    /// is only visible inside the enclosing function's scope; its storage
    /// name is mangled so it can't collide with an actual global of the
    /// same spelling.
    fn declare_local_static(&mut self, ident: String, ty: TypeId) -> Result<()> {
        let fname = self.cur_fn_name.clone().unwrap_or_default();
        let n = self.anon_count;
        self.anon_count += 1;
        let sname = format!(".L.static.{fname}.{ident}.{n}");
        let gid = self.new_obj(Obj::new_global(sname, ty));
        self.objs[gid].is_static = true;
        self.globals.push(gid);
        self.scopes.declare_var(ident, Binding::Var(gid));
        if self.consume("=") {
            self.global_initializer(gid, ty)?;
        } else {
            let size = self.types.get(ty).size.max(0) as usize;
            self.objs[gid].init_data = Some(vec![0u8; size]);
        }
        Ok(())
    }

    pub(super) fn stmt(&mut self) -> Result<NodeId> {
        let t = self.peek();
        let line = t.line;

        if self.consume("{") {
            return self.compound_stmt();
        }

        if self.consume(";") {
            let n = self.build(NodeKind::NullExpr, line)?;
            return self.build(NodeKind::ExprStmt(n), line);
        }

        if self.consume("return") {
            if self.consume(";") {
                return self.build(NodeKind::Return(None), line);
            }
            let e = self.expr()?;
            self.skip(";")?;
            let e = match self.cur_fn_ret_ty {
                Some(rty) => self.new_cast(e, rty, line),
                None => e,
            };
            return self.build(NodeKind::Return(Some(e)), line);
        }

        if self.consume("if") {
            self.skip("(")?;
            let cond = self.expr()?;
            self.skip(")")?;
            let then = self.stmt()?;
            let els = if self.consume("else") { Some(self.stmt()?) } else { None };
            return self.build(NodeKind::If { cond, then, els }, line);
        }

        if self.consume("while") {
            self.skip("(")?;
            let cond = self.expr()?;
            self.skip(")")?;
            let brk_label = self.unique_label("break");
            let cont_label = self.unique_label("continue");
            let saved_brk = self.brk_label.replace(brk_label.clone());
            let saved_cont = self.cont_label.replace(cont_label.clone());
            let body = self.stmt()?;
            self.brk_label = saved_brk;
            self.cont_label = saved_cont;
            return self.build(NodeKind::While { cond, body, brk_label, cont_label }, line);
        }

        if self.consume("for") {
            self.skip("(")?;
            self.scopes.enter();

            let init = if self.is_typename() {
                let mut init_stmts = Vec::new();
                self.declaration(&mut init_stmts)?;
                Some(self.build(NodeKind::Block(init_stmts), line)?)
            } else if self.consume(";") {
                None
            } else {
                let e = self.expr()?;
                self.skip(";")?;
                Some(self.build(NodeKind::ExprStmt(e), line)?)
            };

            let cond = if self.at(";") { None } else { Some(self.expr()?) };
            self.skip(";")?;

            let inc = if self.at(")") { None } else { Some(self.expr()?) };
            self.skip(")")?;

            let brk_label = self.unique_label("break");
            let cont_label = self.unique_label("continue");
            let saved_brk = self.brk_label.replace(brk_label.clone());
            let saved_cont = self.cont_label.replace(cont_label.clone());
            let body = self.stmt()?;
            self.brk_label = saved_brk;
            self.cont_label = saved_cont;

            self.scopes.leave();
            return self.build(NodeKind::For { init, cond, inc, body, brk_label, cont_label }, line);
        }

        if self.consume("switch") {
            self.skip("(")?;
            let cond = self.expr()?;
            self.skip(")")?;
            let brk_label = self.unique_label("break");
            let saved_brk = self.brk_label.replace(brk_label.clone());
            let saved_switch = self.switch_ctx.replace(SwitchCtx { cases: Vec::new(), default_label: None });
            let then = self.stmt()?;
            let ctx = self.switch_ctx.take().unwrap();
            self.switch_ctx = saved_switch;
            self.brk_label = saved_brk;
            return self.build(
                NodeKind::Switch { cond, then, cases: ctx.cases, default_label: ctx.default_label, brk_label },
                line,
            );
        }

        if self.consume("case") {
            let val = self.const_expr()?;
            self.skip(":")?;
            let label = self.unique_label("case");
            match &mut self.switch_ctx {
                Some(ctx) => ctx.cases.push((val, label.clone())),
                None => return Err(self.err_tok(&t, "'case' label not within a switch statement")),
            }
            return self.build(NodeKind::Case { label }, line);
        }

        if self.consume("default") {
            self.skip(":")?;
            let label = self.unique_label("default");
            match &mut self.switch_ctx {
                Some(ctx) => ctx.default_label = Some(label.clone()),
                None => return Err(self.err_tok(&t, "'default' label not within a switch statement")),
            }
            return self.build(NodeKind::Default { label }, line);
        }

        if self.consume("break") {
            self.skip(";")?;
            let label = self.brk_label.clone().ok_or_else(|| self.err_tok(&t, "'break' statement not in a loop or switch"))?;
            return self.build(NodeKind::Goto(label), line);
        }

        if self.consume("continue") {
            self.skip(";")?;
            let label = self.cont_label.clone().ok_or_else(|| self.err_tok(&t, "'continue' statement not in a loop"))?;
            return self.build(NodeKind::Goto(label), line);
        }

        if self.consume("goto") {
            let name_tok = self.expect_ident()?;
            self.skip(";")?;
            let name = self.text(&name_tok).to_string();
            // Placeholder label; `resolve_gotos` rewrites it once the
            // target's mangled name is known (the target may come later).
            let node = self.build(NodeKind::Goto(name.clone()), line)?;
            self.fn_gotos.push(PendingGoto { name, loc: name_tok.loc, node });
            return Ok(node);
        }

        if t.kind == TokenKind::Ident && self.peek_n(1).kind == TokenKind::Punct && self.text(&self.peek_n(1)) == ":" {
            let name_tok = self.advance();
            self.advance(); // `:`
            let name = self.text(&name_tok).to_string();
            let unique = self.unique_label(&name);
            self.fn_labels.insert(name, unique.clone());
            let inner = self.stmt()?;
            return self.build(NodeKind::Label { name: unique, stmt: inner }, line);
        }

        let e = self.expr()?;
        self.skip(";")?;
        self.build(NodeKind::ExprStmt(e), line)
    }
}

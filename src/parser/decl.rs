//! `program`, `declspec`, `declarator`, struct/union/enum declarations, and
//! typedefs: the declaration half of the grammar.

use super::*;

const TYPE_VOID: i32 = 1;
const TYPE_BOOL: i32 = 1 << 2;
const TYPE_CHAR: i32 = 1 << 4;
const TYPE_SHORT: i32 = 1 << 6;
const TYPE_INT: i32 = 1 << 8;
const TYPE_LONG: i32 = 1 << 10;
const TYPE_OTHER: i32 = 1 << 12;

impl<'a> Parser<'a> {
    pub fn parse_program(&mut self) -> Result<()> {
        while !self.is_eof() {
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
                continue;
            }

            // Function vs global variable: a declarator directly followed
            // by `{` is a function definition; followed by `;`/`=`/`,` it's
            // a global variable (or a bare prototype).
            let (ty, name) = self.declarator(base)?;
            let name_tok = name.ok_or_else(|| self.err_tok(&self.peek(), "expected a declarator name"))?;

            if matches!(self.types.get(ty).kind, TyKind::Func { .. }) {
                self.parse_function(ty, name_tok, sc.is_static)?;
            } else {
                self.parse_global_var(ty, name_tok, base)?;
            }
        }
        Ok(())
    }

    fn parse_function(&mut self, ty: TypeId, name: Token, is_static: bool) -> Result<()> {
        let fname = self.text(&name).to_string();
        let is_definition = !self.consume(";");

        let obj_id = self.new_obj(Obj::new_function(fname.clone(), ty, is_static, is_definition));
        self.scopes.declare_var(fname.clone(), Binding::Var(obj_id));
        self.globals.push(obj_id);

        if !is_definition {
            return Ok(());
        }

        let TyKind::Func { ret, .. } = self.types.get(ty).kind.clone() else {
            unreachable!("parse_function called on a non-function type")
        };
        self.cur_fn_name = Some(fname.clone());
        self.cur_fn_ret_ty = Some(ret);
        self.cur_fn_locals.clear();
        self.fn_gotos.clear();
        self.fn_labels.clear();
        self.scopes.enter();

        let TyKind::Func { params, .. } = self.types.get(ty).kind.clone() else {
            unreachable!("parse_function called on a non-function type")
        };
        let param_names = self.last_param_names.take().unwrap_or_default();
        let mut param_objs = Vec::with_capacity(params.len());
        for (i, pty) in params.into_iter().enumerate() {
            let pname = param_names.get(i).cloned().unwrap_or_else(|| format!("__arg{i}"));
            param_objs.push(self.new_lvar(pname, pty));
        }

        self.skip("{")?;
        let body = self.compound_stmt()?;

        self.scopes.leave();

        self.resolve_gotos()?;

        let stack_size = assign_lvar_offsets(&mut self.objs, &self.cur_fn_locals, &self.types);
        let obj = &mut self.objs[obj_id];
        obj.params = param_objs;
        obj.body = Some(body);
        obj.locals = std::mem::take(&mut self.cur_fn_locals);
        obj.stack_size = stack_size;
        self.cur_fn_name = None;
        self.cur_fn_ret_ty = None;
        Ok(())
    }

    /// Patches each `goto`'s `Goto` node from the raw source label name to
    /// the mangled, file-unique label its target `name:` was given, now
    /// that the whole function body (and hence every label in it) has been
    /// seen. Forward `goto`s are why this can't happen at the `goto` site
    /// itself.
    fn resolve_gotos(&mut self) -> Result<()> {
        for g in &self.fn_gotos {
            match self.fn_labels.get(&g.name) {
                Some(unique) => self.nodes.nodes[g.node].kind = NodeKind::Goto(unique.clone()),
                None => return Err(self.src.error_at(g.loc, format!("use of undeclared label '{}'", g.name))),
            }
        }
        Ok(())
    }

    fn parse_global_var(&mut self, mut ty: TypeId, mut name: Token, base: TypeId) -> Result<()> {
        loop {
            let gname = self.text(&name).to_string();
            let gid = self.new_gvar(gname, ty);

            if self.consume("=") {
                self.global_initializer(gid, ty)?;
            } else {
                self.objs[gid].init_data = None;
            }

            if self.consume(",") {
                let (next_ty, next_name) = self.declarator(base)?;
                ty = next_ty;
                name = next_name.ok_or_else(|| self.err_tok(&self.peek(), "expected a declarator name"))?;
                continue;
            }
            break;
        }
        self.skip(";")?;
        Ok(())
    }

    /// `declspec = (type-specifier | storage-class | struct/union/enum/typedef-name)+`
    ///
    /// Type specifiers accumulate into a bitmap with per-kind step sizes
    /// chosen so every legal C permutation (`long int long`, `short int`,
    /// ...) sums to a value unique to that combination; unrecognized sums
    /// are fatal. A typedef name / `struct` / `union` / `enum` sets an
    /// "other" flag and further type tokens terminate the loop.
    pub(super) fn declspec(&mut self) -> Result<(TypeId, StorageClass)> {
        let mut counter: i32 = 0;
        let mut sc = StorageClass::default();
        let mut other_ty: Option<TypeId> = None;

        loop {
            if !self.is_typename() {
                break;
            }

            if self.at("typedef") {
                self.advance();
                sc.is_typedef = true;
                continue;
            }
            if self.at("static") {
                self.advance();
                sc.is_static = true;
                continue;
            }
            if matches!(self.text(&self.peek()), "const" | "volatile" | "restrict" | "register" | "extern" | "inline") {
                self.advance();
                continue;
            }
            if self.at("signed") || self.at("unsigned") {
                self.advance();
                continue;
            }

            if self.at("struct") {
                other_ty = Some(self.struct_union_decl(false)?);
                counter += TYPE_OTHER;
                continue;
            }
            if self.at("union") {
                other_ty = Some(self.struct_union_decl(true)?);
                counter += TYPE_OTHER;
                continue;
            }
            if self.at("enum") {
                other_ty = Some(self.enum_specifier()?);
                counter += TYPE_OTHER;
                continue;
            }

            if counter & TYPE_OTHER == 0 {
                if let Some(Binding::Typedef(tid)) = self.lookup_typedef_name() {
                    other_ty = Some(tid);
                    counter += TYPE_OTHER;
                    self.advance();
                    continue;
                }
            }

            if counter & TYPE_OTHER != 0 {
                break;
            }

            let step = match self.text(&self.peek()) {
                "void" => TYPE_VOID,
                "_Bool" => TYPE_BOOL,
                "char" => TYPE_CHAR,
                "short" => TYPE_SHORT,
                "int" => TYPE_INT,
                "long" => TYPE_LONG,
                _ => break,
            };
            self.advance();
            counter += step;

            let valid = counter == TYPE_VOID
                || counter == TYPE_BOOL
                || counter == TYPE_CHAR
                || counter == TYPE_SHORT
                || counter == TYPE_SHORT + TYPE_INT
                || counter == TYPE_INT
                || counter == TYPE_LONG
                || counter == TYPE_LONG + TYPE_INT
                || counter == TYPE_LONG + TYPE_LONG
                || counter == TYPE_LONG + TYPE_LONG + TYPE_INT;
            if !valid {
                let t = self.peek();
                return Err(self.err_tok(&t, "invalid type combination"));
            }
        }

        if let Some(tid) = other_ty {
            return Ok((tid, sc));
        }

        let tid = if counter == 0 || counter == TYPE_INT {
            TypeArena::INT // no specifier at all defaults to int, matching the original's permissive declspec
        } else if counter == TYPE_VOID {
            TypeArena::VOID
        } else if counter == TYPE_BOOL {
            TypeArena::BOOL
        } else if counter == TYPE_CHAR {
            TypeArena::CHAR
        } else if counter == TYPE_SHORT || counter == TYPE_SHORT + TYPE_INT {
            TypeArena::SHORT
        } else if counter == TYPE_LONG
            || counter == TYPE_LONG + TYPE_INT
            || counter == TYPE_LONG + TYPE_LONG
            || counter == TYPE_LONG + TYPE_LONG + TYPE_INT
        {
            TypeArena::LONG
        } else {
            TypeArena::INT
        };
        Ok((tid, sc))
    }

    fn lookup_typedef_name(&self) -> Option<Binding> {
        let t = self.peek();
        if t.kind != TokenKind::Ident {
            return None;
        }
        match self.scopes.find_var(self.text(&t)) {
            Some(b @ Binding::Typedef(_)) => Some(b.clone()),
            _ => None,
        }
    }

    pub(super) fn is_typename(&self) -> bool {
        let t = self.peek();
        match t.kind {
            TokenKind::Keyword => matches!(
                self.text(&t),
                "void" | "_Bool" | "char" | "short" | "int" | "long" | "struct" | "union" | "enum" | "typedef"
                    | "static" | "const" | "volatile" | "restrict" | "signed" | "unsigned" | "register" | "extern" | "inline"
            ),
            TokenKind::Ident => matches!(self.lookup_typedef_name(), Some(Binding::Typedef(_))),
            _ => false,
        }
    }

    /// `declarator = "*"* (ident | "(" declarator ")") type-suffix`
    ///
    /// Pointers wrap the base type; a parenthesized sub-declarator defers
    /// its inner parse until the outer type-suffix has been resolved, then
    /// re-parses the inner declarator against that resolved type.
    pub(super) fn declarator(&mut self, mut ty: TypeId) -> Result<(TypeId, Option<Token>)> {
        while self.consume("*") {
            ty = self.types.pointer_to(ty);
        }

        if self.consume("(") {
            let start = self.pos;
            // Skip the inner declarator to find where the type-suffix
            // starts, exactly as the grammar requires: the suffix after
            // the matching `)` applies to the outer type first.
            self.skip_declarator_body()?;
            self.skip(")")?;
            let suffixed = self.type_suffix(ty)?;
            let end = self.pos;
            self.pos = start;
            let (inner_ty, name) = self.declarator(suffixed)?;
            debug_assert!(self.pos <= end);
            self.pos = end;
            return Ok((inner_ty, name));
        }

        let name = if self.peek().kind == TokenKind::Ident { Some(self.advance()) } else { None };
        let ty = self.type_suffix(ty)?;
        Ok((ty, name))
    }

    /// Scans over one declarator's syntax (ident or parenthesized
    /// sub-declarator, no type-suffix) without building any type, purely
    /// to find the boundary for the two-pass parenthesized-declarator
    /// trick above.
    fn skip_declarator_body(&mut self) -> Result<()> {
        while self.consume("*") {}
        if self.consume("(") {
            self.skip_declarator_body()?;
            self.skip(")")?;
        } else if self.peek().kind == TokenKind::Ident {
            self.advance();
        }
        Ok(())
    }

    /// `type-suffix = "(" func-params? ")" | "[" const-expr? "]" type-suffix | ε`
    pub(super) fn type_suffix(&mut self, ty: TypeId) -> Result<TypeId> {
        if self.at("(") {
            return self.func_params(ty);
        }
        if self.consume("[") {
            let len = if self.at("]") {
                UNSPECIFIED_LEN
            } else {
                self.const_expr()?
            };
            self.skip("]")?;
            let base = self.type_suffix(ty)?;
            return Ok(self.types.array_of(base, len));
        }
        Ok(ty)
    }

    fn func_params(&mut self, ret: TypeId) -> Result<TypeId> {
        self.skip("(")?;
        let mut params = Vec::new();
        let mut names = Vec::new();
        if !self.at(")") {
            loop {
                if self.at("void") && self.peek_n(1).kind == TokenKind::Punct && self.text(&self.peek_n(1)) == ")" {
                    self.advance();
                    break;
                }
                let (base, _sc) = self.declspec()?;
                let (mut pty, pname) = self.declarator(base)?;
                // Array/function parameters decay to pointer/function-pointer.
                if self.types.is_array(pty) {
                    let elem = self.types.base_of(pty).unwrap();
                    pty = self.types.pointer_to(elem);
                }
                params.push(pty);
                names.push(pname.map(|t| self.text(&t).to_string()).unwrap_or_default());
                if !self.consume(",") {
                    break;
                }
            }
        }
        self.skip(")")?;
        self.last_param_names = Some(names);
        Ok(self.types.func_type(ret, params))
    }

    /// `typename` used by `sizeof(T)` and casts: a declspec followed by an
    /// abstract declarator (no identifier permitted).
    pub(super) fn typename(&mut self) -> Result<TypeId> {
        let (base, _sc) = self.declspec()?;
        let (ty, _name) = self.declarator(base)?;
        Ok(ty)
    }

    // -- struct/union -----------------------------------------------------------

    pub(super) fn struct_union_decl(&mut self, is_union: bool) -> Result<TypeId> {
        self.advance(); // `struct`/`union`
        let tag = if self.peek().kind == TokenKind::Ident { Some(self.advance()) } else { None };

        if tag.is_some() && !self.at("{") {
            // Reference to a (possibly forward-declared) tag.
            let name = self.text(tag.as_ref().unwrap());
            if let Some(id) = self.scopes.find_tag(name) {
                return Ok(id);
            }
            let id = self.types.new_incomplete_tag(is_union, Some(name.to_string()));
            self.scopes.declare_tag(name.to_string(), id);
            return Ok(id);
        }

        self.skip("{")?;
        let builders = self.struct_members()?;
        self.skip("}")?;

        let tag_name = tag.as_ref().map(|t| self.text(t).to_string());
        // A forward declaration of the same tag in the current scope is
        // completed in place so existing references observe it.
        let existing = tag_name
            .as_deref()
            .and_then(|n| self.scopes.find_tag_in_current_scope(n))
            .filter(|&id| !self.is_complete(id));

        let id = if is_union {
            struct_layout::complete_union(&mut self.types, tag_name.clone(), existing, builders)?
        } else {
            struct_layout::complete_struct(&mut self.types, tag_name.clone(), existing, builders)?
        };

        if let Some(name) = tag_name {
            self.scopes.declare_tag(name, id);
        }
        Ok(id)
    }

    fn is_complete(&self, id: TypeId) -> bool {
        self.types.get(id).size != INCOMPLETE
    }

    fn struct_members(&mut self) -> Result<Vec<MemberBuilder>> {
        let mut builders = Vec::new();
        while !self.at("}") {
            let (base, _sc) = self.declspec()?;
            let mut first = true;
            loop {
                if !first && self.at(",") {
                    self.advance();
                }
                first = false;
                let (ty, name) = self.declarator(base)?;
                builders.push(MemberBuilder { ty, name });
                if !self.consume(",") {
                    break;
                }
            }
            self.skip(";")?;
        }
        Ok(builders)
    }

    fn enum_specifier(&mut self) -> Result<TypeId> {
        self.advance(); // `enum`
        let tag = if self.peek().kind == TokenKind::Ident { Some(self.advance()) } else { None };

        if tag.is_some() && !self.at("{") {
            let name = self.text(tag.as_ref().unwrap());
            return self
                .scopes
                .find_tag(name)
                .ok_or_else(|| self.err_tok(&self.peek(), format!("unknown enum tag '{name}'")));
        }

        self.skip("{")?;
        let enum_ty = self.types.new_enum();
        let mut next_val: i64 = 0;
        loop {
            if self.at("}") {
                break;
            }
            let name = self.expect_ident()?;
            if self.consume("=") {
                next_val = self.const_expr()?;
            }
            let cname = self.text(&name).to_string();
            self.scopes.declare_var(cname, Binding::EnumConst { ty: enum_ty, val: next_val });
            next_val += 1;
            if !self.consume(",") {
                break;
            }
        }
        self.skip("}")?;

        if let Some(t) = &tag {
            let tname = self.text(t).to_string();
            self.scopes.declare_tag(tname, enum_ty);
        }
        Ok(enum_ty)
    }

    pub(super) fn const_expr(&mut self) -> Result<i64> {
        let node = self.conditional()?;
        self.eval_const(node)
    }
}

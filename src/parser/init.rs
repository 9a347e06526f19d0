//! Initializer parsing and lowering.
//!
//! Local initializers lower to a `MemZero` followed by a flat sequence of
//! per-element assignment statements, built by walking the initializer's
//! brace structure in lockstep with the declared type and constructing the
//! same `Member`/`Deref`/`Add` access-expression chains the surface syntax
//! (`a.b`, `a[i]`) would build for the same access. Global initializers fold
//! to a byte image plus a relocation list instead, since a global's storage
//! is fixed at compile time and nothing runs to populate it.
//!
//! This subset requires explicit braces at every nesting level of an
//! array/struct/union initializer (no C99 designator-less flattening across
//! brace boundaries), the one exception being a bare string literal
//! initializing a `char` array.

use super::*;

impl<'a> Parser<'a> {
    /// Returns the (possibly length-resolved) type and the lowered
    /// `MemZero` + assignment statement sequence.
    pub(super) fn local_initializer(&mut self, obj: ObjId, ty: TypeId) -> Result<(TypeId, Vec<NodeId>)> {
        let ty = self.resolve_initializer_len(ty)?;
        self.objs[obj].ty = ty;
        let line = self.peek().line;
        let mut stmts = vec![self.nodes.push(NodeKind::MemZero(obj), None, line)];
        let base = self.build(NodeKind::Var(obj), line)?;
        self.init_item(base, ty, &mut stmts)?;
        Ok((ty, stmts))
    }

    pub(super) fn global_initializer(&mut self, gid: ObjId, ty: TypeId) -> Result<()> {
        let ty = self.resolve_initializer_len(ty)?;
        self.objs[gid].ty = ty;
        let size = self.types.get(ty).size.max(0) as usize;
        let mut data = vec![0u8; size];
        let mut relocs = Vec::new();
        self.global_init_item(ty, 0, &mut data, &mut relocs)?;
        self.objs[gid].init_data = Some(data);
        self.objs[gid].relocations = relocs;
        Ok(())
    }

    fn resolve_initializer_len(&mut self, ty: TypeId) -> Result<TypeId> {
        if let TyKind::Array { base, len } = self.types.get(ty).kind {
            if len == UNSPECIFIED_LEN {
                let count = self.infer_array_len()?;
                return Ok(self.types.array_of(base, count));
            }
        }
        Ok(ty)
    }

    /// Raw lookahead that counts top-level (depth-0) comma-separated items
    /// inside the upcoming `{ ... }` (or measures an upcoming string
    /// literal's byte length), without consuming any tokens, used only to
    /// size an unspecified-length outermost array dimension.
    fn infer_array_len(&mut self) -> Result<i64> {
        if self.peek().kind == TokenKind::Str {
            return Ok(self.peek().str_val.as_ref().map(|v| v.len() as i64).unwrap_or(0));
        }
        let save = self.pos;
        self.skip("{")?;
        let mut count = 0i64;
        let mut depth = 0i64;
        if !self.at("}") {
            count = 1;
            loop {
                if self.at("{") {
                    depth += 1;
                    self.advance();
                    continue;
                }
                if self.at("}") {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    self.advance();
                    continue;
                }
                if self.at(",") && depth == 0 {
                    count += 1;
                }
                self.advance();
            }
        }
        self.pos = save;
        Ok(count)
    }

    fn is_char_elem(&self, elem: TypeId) -> bool {
        matches!(self.types.get(elem).kind, TyKind::Char)
    }

    /// Builds the assignment statements for one initializer item rooted at
    /// `lvalue` (an already-built addressable expression of type `ty`),
    /// appending them to `stmts`.
    fn init_item(&mut self, lvalue: NodeId, ty: TypeId, stmts: &mut Vec<NodeId>) -> Result<()> {
        let line = self.peek().line;

        if self.types.is_array(ty) && self.peek().kind == TokenKind::Str {
            let elem = self.types.base_of(ty).unwrap();
            if !self.is_char_elem(elem) {
                return Err(self.err_tok(&self.peek(), "string literal initializer requires a char array"));
            }
            let tok = self.advance();
            let bytes = tok.str_val.unwrap_or_default();
            let len = match self.types.get(ty).kind {
                TyKind::Array { len, .. } => len,
                _ => unreachable!(),
            };
            let limit = if len < 0 { bytes.len() as i64 } else { len.min(bytes.len() as i64) };
            for i in 0..limit {
                let idx = self.new_num(i, line);
                let addr = self.new_add(lvalue, idx, line)?;
                let elem_lv = self.build(NodeKind::Unary { op: UnaryOp::Deref, operand: addr }, line)?;
                let val = self.new_num(bytes[i as usize] as i8 as i64, line);
                let assign = self.build(NodeKind::Assign { lhs: elem_lv, rhs: val }, line)?;
                stmts.push(self.build(NodeKind::ExprStmt(assign), line)?);
            }
            return Ok(());
        }

        if self.types.is_array(ty) {
            self.skip("{")?;
            let elem = self.types.base_of(ty).unwrap();
            let mut i: i64 = 0;
            while !self.at("}") {
                let idx = self.new_num(i, line);
                let addr = self.new_add(lvalue, idx, line)?;
                let elem_lv = self.build(NodeKind::Unary { op: UnaryOp::Deref, operand: addr }, line)?;
                self.init_item(elem_lv, elem, stmts)?;
                i += 1;
                if !self.consume(",") {
                    break;
                }
            }
            self.skip("}")?;
            return Ok(());
        }

        if self.types.is_struct_or_union(ty) {
            self.skip("{")?;
            let is_union = matches!(self.types.get(ty).kind, TyKind::Union(_));
            let members = match &self.types.get(ty).kind {
                TyKind::Struct(a) | TyKind::Union(a) => a.members.clone(),
                _ => unreachable!(),
            };
            for mid in members {
                if self.at("}") {
                    break;
                }
                let mty = self.types.member(mid).ty;
                let member_lv = self.build(NodeKind::Member { base: lvalue, member: mid }, line)?;
                self.init_item(member_lv, mty, stmts)?;
                if is_union {
                    break;
                }
                if !self.consume(",") {
                    break;
                }
            }
            self.skip("}")?;
            return Ok(());
        }

        let braced = self.consume("{");
        let val = self.assign()?;
        if braced {
            self.skip("}")?;
        }
        let val = self.new_cast(val, ty, line);
        let assign = self.build(NodeKind::Assign { lhs: lvalue, rhs: val }, line)?;
        stmts.push(self.build(NodeKind::ExprStmt(assign), line)?);
        Ok(())
    }

    /// Folds one initializer item directly into the global's byte image at
    /// `offset`, recording a `Relocation` instead of raw bytes whenever the
    /// scalar leaf's value is address-valued.
    fn global_init_item(&mut self, ty: TypeId, offset: i64, data: &mut [u8], relocs: &mut Vec<Relocation>) -> Result<()> {
        if self.types.is_array(ty) && self.peek().kind == TokenKind::Str {
            let elem = self.types.base_of(ty).unwrap();
            if !self.is_char_elem(elem) {
                return Err(self.err_tok(&self.peek(), "string literal initializer requires a char array"));
            }
            let tok = self.advance();
            let bytes = tok.str_val.unwrap_or_default();
            let len = match self.types.get(ty).kind {
                TyKind::Array { len, .. } => len,
                _ => unreachable!(),
            };
            let limit = if len < 0 { bytes.len() } else { (len as usize).min(bytes.len()) };
            data[offset as usize..offset as usize + limit].copy_from_slice(&bytes[..limit]);
            return Ok(());
        }

        if self.types.is_array(ty) {
            self.skip("{")?;
            let elem = self.types.base_of(ty).unwrap();
            let elem_size = self.types.get(elem).size.max(0);
            let mut i = 0i64;
            while !self.at("}") {
                self.global_init_item(elem, offset + i * elem_size, data, relocs)?;
                i += 1;
                if !self.consume(",") {
                    break;
                }
            }
            self.skip("}")?;
            return Ok(());
        }

        if self.types.is_struct_or_union(ty) {
            self.skip("{")?;
            let is_union = matches!(self.types.get(ty).kind, TyKind::Union(_));
            let members = match &self.types.get(ty).kind {
                TyKind::Struct(a) | TyKind::Union(a) => a.members.clone(),
                _ => unreachable!(),
            };
            for mid in members {
                if self.at("}") {
                    break;
                }
                let m = self.types.member(mid).clone();
                self.global_init_item(m.ty, offset + m.offset, data, relocs)?;
                if is_union {
                    break;
                }
                if !self.consume(",") {
                    break;
                }
            }
            self.skip("}")?;
            return Ok(());
        }

        let braced = self.consume("{");
        let node = self.assign()?;
        if braced {
            self.skip("}")?;
        }
        let size = self.types.get(ty).size.max(1) as usize;
        let (label, addend) = self.eval_const_addr(node)?;
        match label {
            Some(label) => relocs.push(Relocation { offset, label, addend }),
            None => {
                let bytes = addend.to_le_bytes();
                data[offset as usize..offset as usize + size].copy_from_slice(&bytes[..size]);
            }
        }
        Ok(())
    }
}

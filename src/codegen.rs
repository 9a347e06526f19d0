//! x86-64 code generator: a tree walk over the already-elaborated AST that
//! emits GNU assembler text (Intel syntax, System V AMD64 ABI). No separate
//! IR; each `Node` is turned directly into instructions, mirroring the
//! single-pass shape of the front end.

use std::fmt::Write as _;

use anyhow::{bail, Result};
use log::debug;

use crate::ast::{BinOp, NodeArena, NodeId, NodeKind, UnaryOp};
use crate::obj::{Obj, ObjId};
use crate::ty::{TyKind, TypeArena, TypeId};

const ARG_REGS64: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];
const ARG_REGS32: [&str; 6] = ["edi", "esi", "edx", "ecx", "r8d", "r9d"];
const ARG_REGS16: [&str; 6] = ["di", "si", "dx", "cx", "r8w", "r9w"];
const ARG_REGS8: [&str; 6] = ["dil", "sil", "dl", "cl", "r8b", "r9b"];

pub struct Codegen<'a> {
    types: &'a TypeArena,
    nodes: &'a NodeArena,
    objs: &'a [Obj],
    out: String,
    depth: i64,
    label_count: usize,
    cur_ret_label: String,
}

/// Generates a complete GAS file for one translation unit's arena of
/// objects, in declaration order.
pub fn emit(types: &TypeArena, nodes: &NodeArena, objs: &[Obj], globals: &[ObjId]) -> Result<String> {
    let mut cg = Codegen { types, nodes, objs, out: String::new(), depth: 0, label_count: 0, cur_ret_label: String::new() };
    cg.program(globals)
}

impl<'a> Codegen<'a> {
    fn program(&mut self, globals: &[ObjId]) -> Result<String> {
        writeln!(self.out, ".intel_syntax noprefix").unwrap();
        self.emit_data(globals);
        self.emit_text(globals)?;
        Ok(std::mem::take(&mut self.out))
    }

    // -- data section -------------------------------------------------------------

    fn emit_data(&mut self, globals: &[ObjId]) {
        for &gid in globals {
            let o = &self.objs[gid];
            if o.is_function || !o.is_definition {
                continue;
            }
            debug!("emitting global '{}' ({} bytes)", o.name, self.types.get(o.ty).size.max(0));
            writeln!(self.out, ".data").unwrap();
            if !o.is_static {
                writeln!(self.out, ".globl {}", o.name).unwrap();
            }
            let size = self.types.get(o.ty).size.max(0);
            writeln!(self.out, "{}:", o.name).unwrap();
            match &o.init_data {
                None => {
                    writeln!(self.out, "  .zero {}", size.max(1)).unwrap();
                }
                Some(bytes) => self.emit_initialized_bytes(o, bytes),
            }
        }
    }

    fn emit_initialized_bytes(&mut self, o: &Obj, bytes: &[u8]) {
        let mut relocs: Vec<_> = o.relocations.clone();
        relocs.sort_by_key(|r| r.offset);
        let mut i = 0usize;
        let mut next_reloc = 0usize;
        while i < bytes.len() {
            if next_reloc < relocs.len() && relocs[next_reloc].offset as usize == i {
                let r = &relocs[next_reloc];
                if r.addend == 0 {
                    writeln!(self.out, "  .quad {}", r.label).unwrap();
                } else {
                    writeln!(self.out, "  .quad {}+{}", r.label, r.addend).unwrap();
                }
                i += 8;
                next_reloc += 1;
                continue;
            }
            writeln!(self.out, "  .byte {}", bytes[i]).unwrap();
            i += 1;
        }
    }

    // -- text section -------------------------------------------------------------

    fn emit_text(&mut self, globals: &[ObjId]) -> Result<()> {
        writeln!(self.out, ".text").unwrap();
        for &gid in globals {
            if !self.objs[gid].is_function || !self.objs[gid].is_definition {
                continue;
            }
            self.emit_function(gid)?;
        }
        Ok(())
    }

    fn emit_function(&mut self, fid: ObjId) -> Result<()> {
        let o = &self.objs[fid];
        debug!("emitting function '{}' (frame {} bytes)", o.name, o.stack_size);
        if o.is_static {
            writeln!(self.out, ".local {}", o.name).unwrap();
        } else {
            writeln!(self.out, ".globl {}", o.name).unwrap();
        }
        writeln!(self.out, "{}:", o.name).unwrap();

        self.cur_ret_label = format!(".L.return.{}", o.name);
        self.depth = 0;

        writeln!(self.out, "  push rbp").unwrap();
        writeln!(self.out, "  mov rbp, rsp").unwrap();
        writeln!(self.out, "  sub rsp, {}", o.stack_size).unwrap();

        for (i, &pid) in o.params.iter().enumerate() {
            let p = &self.objs[pid];
            let size = self.types.get(p.ty).size.max(1);
            let off = p.stack_offset;
            match size {
                1 => writeln!(self.out, "  mov [rbp{}], {}", fmt_off(off), ARG_REGS8[i]).unwrap(),
                2 => writeln!(self.out, "  mov [rbp{}], {}", fmt_off(off), ARG_REGS16[i]).unwrap(),
                4 => writeln!(self.out, "  mov [rbp{}], {}", fmt_off(off), ARG_REGS32[i]).unwrap(),
                _ => writeln!(self.out, "  mov [rbp{}], {}", fmt_off(off), ARG_REGS64[i]).unwrap(),
            }
        }

        let body = o.body.expect("function definition without a body");
        self.stmt(body)?;

        writeln!(self.out, "{}:", self.cur_ret_label).unwrap();
        writeln!(self.out, "  mov rsp, rbp").unwrap();
        writeln!(self.out, "  pop rbp").unwrap();
        writeln!(self.out, "  ret").unwrap();

        assert_eq!(self.depth, 0, "unbalanced push/pop in '{}'", o.name);
        Ok(())
    }

    // -- stack helpers --------------------------------------------------------------

    fn push(&mut self) {
        writeln!(self.out, "  push rax").unwrap();
        self.depth += 1;
    }

    fn pop(&mut self, reg: &str) {
        writeln!(self.out, "  pop {reg}").unwrap();
        self.depth -= 1;
    }

    /// Keeps `rsp` 16-byte aligned across `call`: the implicit return
    /// address plus the module's running push count must sum to a
    /// multiple of 16 at the call instruction.
    fn with_call_alignment(&mut self, emit_call: impl FnOnce(&mut Self)) {
        let odd = self.depth % 2 != 0;
        if odd {
            writeln!(self.out, "  sub rsp, 8").unwrap();
        }
        emit_call(self);
        if odd {
            writeln!(self.out, "  add rsp, 8").unwrap();
        }
    }

    fn count(&mut self) -> usize {
        let n = self.label_count;
        self.label_count += 1;
        n
    }

    fn loc(&mut self, line: usize) {
        writeln!(self.out, "  .loc 1 {line}").unwrap();
    }

    // -- addresses ------------------------------------------------------------------

    fn gen_addr(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.get(id);
        match &node.kind {
            NodeKind::Var(obj) => {
                let o = &self.objs[*obj];
                if o.is_local {
                    writeln!(self.out, "  lea rax, [rbp{}]", fmt_off(o.stack_offset)).unwrap();
                } else {
                    writeln!(self.out, "  lea rax, {}[rip]", o.name).unwrap();
                }
                Ok(())
            }
            NodeKind::Unary { op: UnaryOp::Deref, operand } => self.expr(*operand),
            NodeKind::Comma { lhs, rhs } => {
                self.expr(*lhs)?;
                self.gen_addr(*rhs)
            }
            NodeKind::Member { base, member } => {
                self.gen_addr(*base)?;
                let off = self.types.member(*member).offset;
                if off != 0 {
                    writeln!(self.out, "  add rax, {off}").unwrap();
                }
                Ok(())
            }
            _ => bail!("internal error: not an lvalue (node {id})"),
        }
    }

    // -- expressions ------------------------------------------------------------------

    fn expr(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.get(id);
        let line = node.line;
        self.loc(line);
        match node.kind.clone() {
            NodeKind::Num(v) => {
                writeln!(self.out, "  mov rax, {v}").unwrap();
            }
            NodeKind::NullExpr => {}
            NodeKind::Var(_) | NodeKind::Member { .. } => {
                self.gen_addr(id)?;
                self.load(node.ty.unwrap());
            }
            NodeKind::MemZero(obj) => self.gen_memzero(obj),
            NodeKind::Unary { op, operand } => self.gen_unary(op, operand, node.ty)?,
            NodeKind::Assign { lhs, rhs } => {
                self.gen_addr(lhs)?;
                self.push();
                self.expr(rhs)?;
                self.store(self.nodes.ty_of(lhs).unwrap());
            }
            NodeKind::Comma { lhs, rhs } => {
                self.expr(lhs)?;
                self.expr(rhs)?;
            }
            NodeKind::Cond { cond, then, els } => self.gen_cond(cond, then, els)?,
            NodeKind::Cast(inner) => {
                self.expr(inner)?;
                self.gen_cast(self.nodes.ty_of(inner), node.ty);
            }
            NodeKind::FunCall { name, func_ty, args } => self.gen_call(&name, func_ty, &args)?,
            NodeKind::StmtExpr(stmts) => {
                for (i, s) in stmts.iter().enumerate() {
                    if i + 1 == stmts.len() {
                        if let NodeKind::ExprStmt(e) = &self.nodes.get(*s).kind {
                            self.expr(*e)?;
                            continue;
                        }
                    }
                    self.stmt(*s)?;
                }
            }
            NodeKind::Binary { op, lhs, rhs } => self.gen_binary(op, lhs, rhs)?,
            _ => bail!("internal error: not an expression (node {id})"),
        }
        Ok(())
    }

    fn gen_memzero(&mut self, obj: ObjId) {
        let o = &self.objs[obj];
        let size = self.types.get(o.ty).size.max(0);
        if size == 0 {
            return;
        }
        writeln!(self.out, "  lea rdi, [rbp{}]", fmt_off(o.stack_offset)).unwrap();
        writeln!(self.out, "  mov rcx, {size}").unwrap();
        writeln!(self.out, "  mov al, 0").unwrap();
        writeln!(self.out, "  rep stosb").unwrap();
    }

    fn gen_unary(&mut self, op: UnaryOp, operand: NodeId, ty: Option<TypeId>) -> Result<()> {
        match op {
            UnaryOp::Neg => {
                self.expr(operand)?;
                self.reg_for(ty, "neg rax", "neg eax");
            }
            UnaryOp::BitNot => {
                self.expr(operand)?;
                self.reg_for(ty, "not rax", "not eax");
            }
            UnaryOp::Not => {
                self.expr(operand)?;
                writeln!(self.out, "  cmp rax, 0").unwrap();
                writeln!(self.out, "  sete al").unwrap();
                writeln!(self.out, "  movzx rax, al").unwrap();
            }
            UnaryOp::Addr => self.gen_addr(operand)?,
            UnaryOp::Deref => {
                self.expr(operand)?;
                let target = self.nodes.ty_of(operand).and_then(|t| self.types.base_of(t));
                self.load(target.unwrap_or(TypeArena::LONG));
            }
        }
        Ok(())
    }

    fn reg_for(&mut self, ty: Option<TypeId>, wide: &str, narrow: &str) {
        let long = ty.map(|t| self.types.get(t).size >= 8 || self.types.is_pointer(t)).unwrap_or(true);
        writeln!(self.out, "  {}", if long { wide } else { narrow }).unwrap();
    }

    fn gen_cond(&mut self, cond: NodeId, then: NodeId, els: NodeId) -> Result<()> {
        let n = self.count();
        self.expr(cond)?;
        writeln!(self.out, "  cmp rax, 0").unwrap();
        writeln!(self.out, "  je .L.else.{n}").unwrap();
        self.expr(then)?;
        writeln!(self.out, "  jmp .L.end.{n}").unwrap();
        writeln!(self.out, ".L.else.{n}:").unwrap();
        self.expr(els)?;
        writeln!(self.out, ".L.end.{n}:").unwrap();
        Ok(())
    }

    fn gen_call(&mut self, name: &str, func_ty: TypeId, args: &[NodeId]) -> Result<()> {
        for &a in args {
            self.expr(a)?;
            self.push();
        }
        for i in (0..args.len()).rev() {
            self.pop(ARG_REGS64[i]);
        }
        self.with_call_alignment(|cg| {
            writeln!(cg.out, "  mov rax, 0").unwrap();
            writeln!(cg.out, "  call {name}").unwrap();
        });
        let TyKind::Func { ret, .. } = &self.types.get(func_ty).kind else { unreachable!() };
        let ret = *ret;
        if self.types.get(ret).size == 1 && matches!(&self.types.get(ret).kind, TyKind::Bool) {
            writeln!(self.out, "  movzx eax, al").unwrap();
        }
        Ok(())
    }

    fn gen_binary(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId) -> Result<()> {
        match op {
            BinOp::LogAnd => {
                let n = self.count();
                self.expr(lhs)?;
                writeln!(self.out, "  cmp rax, 0").unwrap();
                writeln!(self.out, "  je .L.false.{n}").unwrap();
                self.expr(rhs)?;
                writeln!(self.out, "  cmp rax, 0").unwrap();
                writeln!(self.out, "  je .L.false.{n}").unwrap();
                writeln!(self.out, "  mov rax, 1").unwrap();
                writeln!(self.out, "  jmp .L.end.{n}").unwrap();
                writeln!(self.out, ".L.false.{n}:").unwrap();
                writeln!(self.out, "  mov rax, 0").unwrap();
                writeln!(self.out, ".L.end.{n}:").unwrap();
                return Ok(());
            }
            BinOp::LogOr => {
                let n = self.count();
                self.expr(lhs)?;
                writeln!(self.out, "  cmp rax, 0").unwrap();
                writeln!(self.out, "  jne .L.true.{n}").unwrap();
                self.expr(rhs)?;
                writeln!(self.out, "  cmp rax, 0").unwrap();
                writeln!(self.out, "  jne .L.true.{n}").unwrap();
                writeln!(self.out, "  mov rax, 0").unwrap();
                writeln!(self.out, "  jmp .L.end.{n}").unwrap();
                writeln!(self.out, ".L.true.{n}:").unwrap();
                writeln!(self.out, "  mov rax, 1").unwrap();
                writeln!(self.out, ".L.end.{n}:").unwrap();
                return Ok(());
            }
            _ => {}
        }

        self.expr(rhs)?;
        self.push();
        self.expr(lhs)?;
        self.pop("rdi");

        let lhs_ty = self.nodes.ty_of(lhs);
        let long = lhs_ty.map(|t| self.types.get(t).size >= 8 || self.types.is_pointer(t)).unwrap_or(false);
        let (a, d) = if long { ("rax", "rdi") } else { ("eax", "edi") };

        match op {
            BinOp::Add => writeln!(self.out, "  add {a}, {d}").unwrap(),
            BinOp::Sub => writeln!(self.out, "  sub {a}, {d}").unwrap(),
            BinOp::Mul => writeln!(self.out, "  imul {a}, {d}").unwrap(),
            BinOp::Div | BinOp::Mod => {
                if long {
                    writeln!(self.out, "  cqo").unwrap();
                } else {
                    writeln!(self.out, "  cdq").unwrap();
                }
                writeln!(self.out, "  idiv {d}").unwrap();
                if op == BinOp::Mod {
                    let r = if long { "rdx" } else { "edx" };
                    writeln!(self.out, "  mov {a}, {r}").unwrap();
                }
            }
            BinOp::BitAnd => writeln!(self.out, "  and {a}, {d}").unwrap(),
            BinOp::BitOr => writeln!(self.out, "  or {a}, {d}").unwrap(),
            BinOp::BitXor => writeln!(self.out, "  xor {a}, {d}").unwrap(),
            BinOp::Shl | BinOp::Shr => {
                writeln!(self.out, "  mov rcx, rdi").unwrap();
                let mnemonic = if op == BinOp::Shl { "shl" } else { "sar" };
                writeln!(self.out, "  {mnemonic} {a}, cl").unwrap();
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le => {
                writeln!(self.out, "  cmp {a}, {d}").unwrap();
                let setcc = match op {
                    BinOp::Eq => "sete",
                    BinOp::Ne => "setne",
                    BinOp::Lt => "setl",
                    BinOp::Le => "setle",
                    _ => unreachable!(),
                };
                writeln!(self.out, "  {setcc} al").unwrap();
                writeln!(self.out, "  movzx rax, al").unwrap();
            }
            BinOp::LogAnd | BinOp::LogOr => unreachable!("handled above"),
        }
        Ok(())
    }

    // -- load/store/cast ----------------------------------------------------------

    fn load(&mut self, ty: TypeId) {
        match &self.types.get(ty).kind {
            TyKind::Array { .. } | TyKind::Struct(_) | TyKind::Union(_) | TyKind::Func { .. } => {}
            TyKind::Bool => {
                writeln!(self.out, "  movzx eax, byte ptr [rax]").unwrap();
            }
            _ => {
                let size = self.types.get(ty).size;
                match size {
                    1 => writeln!(self.out, "  movsx eax, byte ptr [rax]").unwrap(),
                    2 => writeln!(self.out, "  movsx eax, word ptr [rax]").unwrap(),
                    4 => writeln!(self.out, "  movsxd rax, dword ptr [rax]").unwrap(),
                    _ => writeln!(self.out, "  mov rax, [rax]").unwrap(),
                }
            }
        }
    }

    fn store(&mut self, ty: TypeId) {
        self.pop("rdi");
        match &self.types.get(ty).kind {
            TyKind::Struct(_) | TyKind::Union(_) => {
                let size = self.types.get(ty).size.max(0);
                writeln!(self.out, "  mov rcx, {size}").unwrap();
                writeln!(self.out, "  mov rsi, rax").unwrap();
                let n = self.count();
                writeln!(self.out, ".L.copy.{n}:").unwrap();
                writeln!(self.out, "  cmp rcx, 0").unwrap();
                writeln!(self.out, "  je .L.copy.end.{n}").unwrap();
                writeln!(self.out, "  mov r8b, [rsi]").unwrap();
                writeln!(self.out, "  mov [rdi], r8b").unwrap();
                writeln!(self.out, "  inc rsi").unwrap();
                writeln!(self.out, "  inc rdi").unwrap();
                writeln!(self.out, "  dec rcx").unwrap();
                writeln!(self.out, "  jmp .L.copy.{n}").unwrap();
                writeln!(self.out, ".L.copy.end.{n}:").unwrap();
                writeln!(self.out, "  mov rax, rsi").unwrap();
                writeln!(self.out, "  sub rax, {size}").unwrap();
            }
            _ => {
                let size = self.types.get(ty).size;
                match size {
                    1 => writeln!(self.out, "  mov [rdi], al").unwrap(),
                    2 => writeln!(self.out, "  mov [rdi], ax").unwrap(),
                    4 => writeln!(self.out, "  mov [rdi], eax").unwrap(),
                    _ => writeln!(self.out, "  mov [rdi], rax").unwrap(),
                }
            }
        }
    }

    /// Sign/zero-extends or truncates `rax`/`eax` between the four integer
    /// widths; casting to `_Bool` normalizes to `0`/`1`; casting to `void`
    /// or between same-size kinds is a no-op.
    fn gen_cast(&mut self, from: Option<TypeId>, to: Option<TypeId>) {
        let Some(to) = to else { return };
        if self.types.is_void(to) {
            return;
        }
        if matches!(&self.types.get(to).kind, TyKind::Bool) {
            writeln!(self.out, "  cmp rax, 0").unwrap();
            writeln!(self.out, "  setne al").unwrap();
            writeln!(self.out, "  movzx eax, al").unwrap();
            return;
        }
        let from_size = from.map(|t| self.types.get(t).size).unwrap_or(8);
        let to_size = self.types.get(to).size;
        let to_pointerish = self.types.is_pointer(to) || matches!(&self.types.get(to).kind, TyKind::Func { .. });
        let from_pointerish = from.map(|t| self.types.is_pointer(t)).unwrap_or(false);

        if to_pointerish || from_pointerish {
            return; // pointers are always 8 bytes; no conversion needed
        }

        match (from_size, to_size) {
            (_, 1) => writeln!(self.out, "  movsx eax, al").unwrap(),
            (_, 2) => writeln!(self.out, "  movsx eax, ax").unwrap(),
            (8, 4) => {} // truncation via the 32-bit register alias is implicit
            (_, 4) => writeln!(self.out, "  mov eax, eax").unwrap(),
            (8, 8) => {}
            (_, 8) => writeln!(self.out, "  movsxd rax, eax").unwrap(),
            _ => {}
        }
    }

    // -- statements -------------------------------------------------------------------

    fn stmt(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.get(id);
        let line = node.line;
        match node.kind.clone() {
            NodeKind::Block(stmts) => {
                for s in stmts {
                    self.stmt(s)?;
                }
            }
            NodeKind::ExprStmt(e) => {
                self.expr(e)?;
            }
            NodeKind::MemZero(obj) => self.gen_memzero(obj),
            NodeKind::NullExpr => {}
            NodeKind::Return(e) => {
                self.loc(line);
                if let Some(e) = e {
                    self.expr(e)?;
                }
                writeln!(self.out, "  jmp {}", self.cur_ret_label).unwrap();
            }
            NodeKind::If { cond, then, els } => {
                self.loc(line);
                let n = self.count();
                self.expr(cond)?;
                writeln!(self.out, "  cmp rax, 0").unwrap();
                writeln!(self.out, "  je .L.else.{n}").unwrap();
                self.stmt(then)?;
                writeln!(self.out, "  jmp .L.end.{n}").unwrap();
                writeln!(self.out, ".L.else.{n}:").unwrap();
                if let Some(els) = els {
                    self.stmt(els)?;
                }
                writeln!(self.out, ".L.end.{n}:").unwrap();
            }
            NodeKind::While { cond, body, brk_label, cont_label } => {
                self.loc(line);
                let n = self.count();
                writeln!(self.out, ".L.begin.{n}:").unwrap();
                self.expr(cond)?;
                writeln!(self.out, "  cmp rax, 0").unwrap();
                writeln!(self.out, "  je {brk_label}").unwrap();
                self.stmt(body)?;
                writeln!(self.out, "{cont_label}:").unwrap();
                writeln!(self.out, "  jmp .L.begin.{n}").unwrap();
                writeln!(self.out, "{brk_label}:").unwrap();
            }
            NodeKind::For { init, cond, inc, body, brk_label, cont_label } => {
                self.loc(line);
                let n = self.count();
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                writeln!(self.out, ".L.begin.{n}:").unwrap();
                if let Some(cond) = cond {
                    self.expr(cond)?;
                    writeln!(self.out, "  cmp rax, 0").unwrap();
                    writeln!(self.out, "  je {brk_label}").unwrap();
                }
                self.stmt(body)?;
                writeln!(self.out, "{cont_label}:").unwrap();
                if let Some(inc) = inc {
                    self.expr(inc)?;
                }
                writeln!(self.out, "  jmp .L.begin.{n}").unwrap();
                writeln!(self.out, "{brk_label}:").unwrap();
            }
            NodeKind::Switch { cond, then, cases, default_label, brk_label } => {
                self.loc(line);
                self.expr(cond)?;
                for (val, label) in &cases {
                    writeln!(self.out, "  cmp rax, {val}").unwrap();
                    writeln!(self.out, "  je {label}").unwrap();
                }
                match &default_label {
                    Some(l) => writeln!(self.out, "  jmp {l}").unwrap(),
                    None => writeln!(self.out, "  jmp {brk_label}").unwrap(),
                }
                self.stmt(then)?;
                writeln!(self.out, "{brk_label}:").unwrap();
            }
            NodeKind::Case { label } | NodeKind::Default { label } => {
                writeln!(self.out, "{label}:").unwrap();
            }
            NodeKind::Goto(label) => {
                self.loc(line);
                writeln!(self.out, "  jmp {label}").unwrap();
            }
            NodeKind::Label { name, stmt } => {
                writeln!(self.out, "{name}:").unwrap();
                self.stmt(stmt)?;
            }
            _ => bail!("internal error: not a statement (node {id})"),
        }
        Ok(())
    }
}

fn fmt_off(off: i64) -> String {
    if off < 0 {
        format!("-{}", -off)
    } else {
        format!("+{off}")
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::Parser;
    use crate::token::{tokenize, SourceFile};

    fn compile(src: &str) -> String {
        let src = SourceFile::from_str("t.c", src);
        let toks = tokenize(&src).unwrap();
        let mut p = Parser::new(&src, toks);
        p.parse_program().unwrap();
        super::emit(&p.types, &p.nodes, &p.objs, &p.globals).unwrap()
    }

    // A panicking `assert_eq!(self.depth, 0, ...)` inside `emit_function` would
    // turn these into a test failure, so a clean return already proves every
    // push is matched by a pop.
    #[test]
    fn stack_depth_balances_across_straight_line_code() {
        let asm = compile("int main() { int a = 3; int b = 4; return a + b * 2; }");
        assert!(asm.contains("main:"));
    }

    #[test]
    fn stack_depth_balances_across_control_flow_and_calls() {
        let asm = compile(
            "int add(int x, int y) { return x + y; }\n\
             int main() { int i; int s = 0; for (i = 0; i < 10; i = i + 1) { s = add(s, i); } return s; }",
        );
        assert!(asm.contains("call add"));
    }

    #[test]
    fn call_site_is_16_byte_aligned_when_depth_is_odd() {
        // `f() + 1` evaluates the `1` first and pushes it (depth == 1) before
        // generating the call for `f()`, so the call site must be padded.
        let asm = compile("int f() { return 1; } int main() { return f() + 1; }");
        let lines: Vec<&str> = asm.lines().map(str::trim).collect();
        let call_line = lines.iter().position(|&l| l == "call f").unwrap();
        assert_eq!(lines[call_line - 2], "sub rsp, 8");
        assert_eq!(lines[call_line + 1], "add rsp, 8");
    }

    #[test]
    fn global_array_initializer_emits_zero_fill_for_trailing_elements() {
        let asm = compile("int a[4] = {1, 2};");
        assert!(asm.contains(".zero") || asm.contains(".byte 0"));
    }

    #[test]
    fn switch_emits_compare_ladder_and_default_jump() {
        let asm = compile("int main() { int x = 1; switch (x) { case 1: return 1; case 2: return 2; default: return 0; } }");
        assert!(asm.contains("cmp rax, 1"));
        assert!(asm.contains("cmp rax, 2"));
    }
}

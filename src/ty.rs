//! The C type system: a tagged union over {void, bool, char, short, int,
//! long, pointer, function, array, struct, union, enum}, held in a flat
//! arena and referenced by index, every parsed type held in a `Vec` and
//! referred to by ordinal rather than by `Rc`.

pub mod struct_layout;

use crate::token::Token;

pub type TypeId = usize;
pub type MemberId = usize;

/// `-1` marks an incomplete size, rather than wrapping it in `Option<u32>`.
pub const INCOMPLETE: i64 = -1;
/// `-1` marks an unspecified/flexible array length.
pub const UNSPECIFIED_LEN: i64 = -1;

#[derive(Debug, Clone)]
pub struct Ty {
    pub kind: TyKind,
    pub size: i64,
    pub align: i64,
    /// The declarator token that named this type, if any (diagnostics only).
    pub name: Option<Token>,
}

#[derive(Debug, Clone)]
pub enum TyKind {
    Void,
    Bool,
    Char,
    Short,
    Int,
    Long,
    Ptr { base: TypeId },
    Func { ret: TypeId, params: Vec<TypeId> },
    Array { base: TypeId, len: i64 },
    Struct(Aggregate),
    Union(Aggregate),
    Enum,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    pub tag: Option<String>,
    pub members: Vec<MemberId>,
    pub is_flexible: bool,
    pub complete: bool,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub ty: TypeId,
    pub name: Option<Token>,
    pub offset: i64,
    pub index: usize,
}

/// Owns every `Ty`/`Member` created while compiling one translation unit.
/// Basic scalar kinds are pre-registered as fixed indices so callers can
/// refer to them by constant (`TypeArena::INT`, ...) instead of threading a
/// lookup everywhere.
pub struct TypeArena {
    pub types: Vec<Ty>,
    pub members: Vec<Member>,
}

impl TypeArena {
    pub const VOID: TypeId = 0;
    pub const BOOL: TypeId = 1;
    pub const CHAR: TypeId = 2;
    pub const SHORT: TypeId = 3;
    pub const INT: TypeId = 4;
    pub const LONG: TypeId = 5;

    pub fn new() -> Self {
        let mut types = Vec::new();
        let mut push = |kind: TyKind, size: i64, align: i64| {
            types.push(Ty { kind, size, align, name: None });
        };
        push(TyKind::Void, 1, 1);
        push(TyKind::Bool, 1, 1);
        push(TyKind::Char, 1, 1);
        push(TyKind::Short, 2, 2);
        push(TyKind::Int, 4, 4);
        push(TyKind::Long, 8, 8);
        Self { types, members: Vec::new() }
    }

    pub fn get(&self, id: TypeId) -> &Ty {
        &self.types[id]
    }

    fn push(&mut self, t: Ty) -> TypeId {
        self.types.push(t);
        self.types.len() - 1
    }

    pub fn pointer_to(&mut self, base: TypeId) -> TypeId {
        self.push(Ty { kind: TyKind::Ptr { base }, size: 8, align: 8, name: None })
    }

    pub fn array_of(&mut self, base: TypeId, len: i64) -> TypeId {
        let elem_size = self.get(base).size;
        let size = if len < 0 || elem_size < 0 { INCOMPLETE } else { elem_size * len };
        let align = self.get(base).align;
        self.push(Ty { kind: TyKind::Array { base, len }, size, align, name: None })
    }

    pub fn func_type(&mut self, ret: TypeId, params: Vec<TypeId>) -> TypeId {
        self.push(Ty { kind: TyKind::Func { ret, params }, size: 1, align: 1, name: None })
    }

    pub fn new_enum(&mut self) -> TypeId {
        self.push(Ty { kind: TyKind::Enum, size: 4, align: 4, name: None })
    }

    /// Registers an incomplete struct/union tag (size `-1`), later completed
    /// in place by `struct_layout::complete_in_place`.
    pub fn new_incomplete_tag(&mut self, is_union: bool, tag: Option<String>) -> TypeId {
        let agg = Aggregate { tag, members: Vec::new(), is_flexible: false, complete: false };
        let kind = if is_union { TyKind::Union(agg) } else { TyKind::Struct(agg) };
        self.push(Ty { kind, size: INCOMPLETE, align: 1, name: None })
    }

    pub fn add_member(&mut self, m: Member) -> MemberId {
        self.members.push(m);
        self.members.len() - 1
    }

    pub fn member(&self, id: MemberId) -> &Member {
        &self.members[id]
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TyKind::Bool | TyKind::Char | TyKind::Short | TyKind::Int | TyKind::Long | TyKind::Enum)
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TyKind::Ptr { .. })
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TyKind::Array { .. })
    }

    /// The type pointer arithmetic scales by: the pointee for pointers, the
    /// element type for arrays.
    pub fn base_of(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id).kind {
            TyKind::Ptr { base } | TyKind::Array { base, .. } => Some(base),
            _ => None,
        }
    }

    pub fn is_struct_or_union(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TyKind::Struct(_) | TyKind::Union(_))
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TyKind::Void)
    }

    pub fn is_scalar(&self, id: TypeId) -> bool {
        self.is_integer(id) || self.is_pointer(id)
    }

    /// Decays array types to a pointer to their element, as C does for
    /// values in expression context (used by the parser's array-indexing
    /// and pointer-arithmetic desugaring).
    pub fn decay(&mut self, id: TypeId) -> TypeId {
        if let TyKind::Array { base, .. } = self.get(id).kind {
            self.pointer_to(base)
        } else {
            id
        }
    }
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

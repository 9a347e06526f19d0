//! Program-level entities: global variables, functions, and (threaded
//! through a function's `locals`) local variables, held in a flat `Vec`
//! addressed by index rather than an intrusive linked list.

use crate::ast::NodeId;
use crate::ty::TypeId;

pub type ObjId = usize;

/// A deferred fixup to a global's byte image: at `offset` bytes into the
/// image, emit a reference to `label` (another global's symbol name) plus
/// `addend`.
#[derive(Debug, Clone)]
pub struct Relocation {
    pub offset: i64,
    pub label: String,
    pub addend: i64,
}

#[derive(Debug, Clone)]
pub struct Obj {
    pub name: String,
    pub ty: TypeId,
    pub is_local: bool,

    /// Stack offset from `%rbp`, locals only; negative once assigned.
    pub stack_offset: i64,

    pub is_function: bool,
    pub is_definition: bool,
    pub is_static: bool,

    /// Global initializer image and relocations (globals only).
    pub init_data: Option<Vec<u8>>,
    pub relocations: Vec<Relocation>,

    /// Function parameters, in declaration order (functions only).
    pub params: Vec<ObjId>,
    /// Function body (functions only).
    pub body: Option<NodeId>,
    /// Every local declared in the function, in declaration order
    /// (including anonymous compound-assignment temporaries).
    pub locals: Vec<ObjId>,
    pub stack_size: i64,
}

impl Obj {
    pub fn new_local(name: String, ty: TypeId) -> Self {
        Self {
            name,
            ty,
            is_local: true,
            stack_offset: 0,
            is_function: false,
            is_definition: true,
            is_static: false,
            init_data: None,
            relocations: Vec::new(),
            params: Vec::new(),
            body: None,
            locals: Vec::new(),
            stack_size: 0,
        }
    }

    pub fn new_global(name: String, ty: TypeId) -> Self {
        Self {
            name,
            ty,
            is_local: false,
            stack_offset: 0,
            is_function: false,
            is_definition: true,
            is_static: false,
            init_data: None,
            relocations: Vec::new(),
            params: Vec::new(),
            body: None,
            locals: Vec::new(),
            stack_size: 0,
        }
    }

    pub fn new_function(name: String, ty: TypeId, is_static: bool, is_definition: bool) -> Self {
        Self {
            name,
            ty,
            is_local: false,
            stack_offset: 0,
            is_function: true,
            is_definition,
            is_static,
            init_data: None,
            relocations: Vec::new(),
            params: Vec::new(),
            body: None,
            locals: Vec::new(),
            stack_size: 0,
        }
    }
}

/// Assigns every local in `locals` a negative `%rbp`-relative offset,
/// rounding the running size up to each local's own alignment as it packs
/// them, then rounds the whole frame to 16 bytes. The same "accumulate with
/// per-member alignment rounding" shape used for struct layout.
pub fn assign_lvar_offsets(objs: &mut [Obj], locals: &[ObjId], types: &crate::ty::TypeArena) -> i64 {
    let mut offset: i64 = 0;
    for &id in locals {
        let ty = objs[id].ty;
        let t = types.get(ty);
        let size = t.size.max(0);
        let align = t.align.max(1);
        offset += size;
        offset = (offset + align - 1) / align * align;
        objs[id].stack_offset = -offset;
    }
    (offset + 15) / 16 * 16
}

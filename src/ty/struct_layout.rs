//! Struct/union member offset and size/alignment computation.
//!
//! Walks a struct's members accumulating a running offset, rounding up to
//! each member's alignment as it goes, and takes the union case as "max
//! member size". C's eager (non-lazy) type completion means a struct's
//! member types are already fully sized by the time the struct itself is
//! built, so there is no solved/solving cycle-guard to carry: `struct Foo {
//! struct Foo *next; }` only works because the member is a *pointer to*
//! Foo, never Foo itself.

use anyhow::{anyhow, Result};

use super::{Aggregate, Member, MemberId, Ty, TyKind, TypeArena, TypeId, INCOMPLETE, UNSPECIFIED_LEN};
use crate::token::Token;

fn align_to(n: i64, align: i64) -> i64 {
    (n + align - 1) / align * align
}

pub struct MemberBuilder {
    pub ty: TypeId,
    pub name: Option<Token>,
}

/// Packs struct members: each member's offset is the smallest value `>=`
/// the running offset that is a multiple of the member's alignment; the
/// struct's final size is the running offset rounded up to the struct's
/// own alignment (the max member alignment).
///
/// If the last member is an incomplete array, it becomes a flexible array
/// member (size 0, contributing nothing to the struct's size).
pub fn complete_struct(
    arena: &mut TypeArena,
    tag: Option<String>,
    existing: Option<TypeId>,
    builders: Vec<MemberBuilder>,
) -> Result<TypeId> {
    let mut members = Vec::with_capacity(builders.len());
    let mut offset: i64 = 0;
    let mut max_align: i64 = 1;
    let mut is_flexible = false;
    let n = builders.len();

    for (index, b) in builders.into_iter().enumerate() {
        let mem_ty = arena.get(b.ty);
        let is_last = index + 1 == n;
        if is_last && mem_ty.size == INCOMPLETE && arena.is_array(b.ty) {
            is_flexible = true;
            let mid = arena.add_member(Member { ty: b.ty, name: b.name, offset, index });
            members.push(mid);
            continue;
        }
        if mem_ty.size == INCOMPLETE {
            return Err(anyhow!("member of incomplete type"));
        }
        let align = mem_ty.align;
        offset = align_to(offset, align);
        max_align = max_align.max(align);
        let mid = arena.add_member(Member { ty: b.ty, name: b.name, offset, index });
        members.push(mid);
        offset += arena.get(b.ty).size;
    }

    let size = align_to(offset, max_align);
    let agg = Aggregate { tag, members, is_flexible, complete: true };
    finish(arena, existing, TyKind::Struct(agg), size, max_align)
}

/// Unions set every member's offset to 0; the union's size is the max
/// member size and its alignment the max member alignment.
pub fn complete_union(
    arena: &mut TypeArena,
    tag: Option<String>,
    existing: Option<TypeId>,
    builders: Vec<MemberBuilder>,
) -> Result<TypeId> {
    let mut members = Vec::with_capacity(builders.len());
    let mut size: i64 = 0;
    let mut align: i64 = 1;

    for (index, b) in builders.into_iter().enumerate() {
        let mem_ty = arena.get(b.ty);
        if mem_ty.size == INCOMPLETE {
            return Err(anyhow!("member of incomplete type"));
        }
        size = size.max(mem_ty.size);
        align = align.max(mem_ty.align);
        let mid = arena.add_member(Member { ty: b.ty, name: b.name, offset: 0, index });
        members.push(mid);
    }

    let size = align_to(size, align);
    let agg = Aggregate { tag, members, is_flexible: false, complete: true };
    finish(arena, existing, TyKind::Union(agg), size, align)
}

/// Writes the completed aggregate either into a brand new slot, or "in
/// place" over a previously forward-declared incomplete tag, so every
/// reference recorded before completion (by `TypeId`) observes it.
fn finish(
    arena: &mut TypeArena,
    existing: Option<TypeId>,
    kind: TyKind,
    size: i64,
    align: i64,
) -> Result<TypeId> {
    let ty = Ty { kind, size, align, name: None };
    match existing {
        Some(id) => {
            arena.types[id] = ty;
            Ok(id)
        }
        None => {
            arena.types.push(ty);
            Ok(arena.types.len() - 1)
        }
    }
}

pub fn find_member(arena: &TypeArena, agg_ty: TypeId, name: &str, src: &crate::token::SourceFile) -> Option<MemberId> {
    let members: &[MemberId] = match &arena.get(agg_ty).kind {
        TyKind::Struct(a) | TyKind::Union(a) => &a.members,
        _ => return None,
    };
    members
        .iter()
        .copied()
        .find(|&mid| arena.member(mid).name.as_ref().is_some_and(|t| t.text(src) == name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unnamed(ty: TypeId) -> MemberBuilder {
        MemberBuilder { ty, name: None }
    }

    #[test]
    fn struct_packs_members_with_alignment_padding() {
        let mut arena = TypeArena::new();
        // struct { char a; int b; char c; } -> offsets 0, 4, 8; size 12
        let builders = vec![unnamed(TypeArena::CHAR), unnamed(TypeArena::INT), unnamed(TypeArena::CHAR)];
        let id = complete_struct(&mut arena, None, None, builders).unwrap();
        let ty = arena.get(id);
        assert_eq!(ty.size, 12);
        assert_eq!(ty.align, 4);
        let TyKind::Struct(agg) = &ty.kind else { panic!("not a struct") };
        let offsets: Vec<i64> = agg.members.iter().map(|&m| arena.member(m).offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
    }

    #[test]
    fn union_all_members_share_offset_zero_sized_to_max() {
        let mut arena = TypeArena::new();
        let builders = vec![unnamed(TypeArena::CHAR), unnamed(TypeArena::LONG)];
        let id = complete_union(&mut arena, None, None, builders).unwrap();
        let ty = arena.get(id);
        assert_eq!(ty.size, 8);
        assert_eq!(ty.align, 8);
        let TyKind::Union(agg) = &ty.kind else { panic!("not a union") };
        for &m in &agg.members {
            assert_eq!(arena.member(m).offset, 0);
        }
    }

    #[test]
    fn trailing_incomplete_array_is_flexible_and_contributes_no_size() {
        let mut arena = TypeArena::new();
        let flex = arena.array_of(TypeArena::INT, UNSPECIFIED_LEN);
        let builders = vec![unnamed(TypeArena::INT), unnamed(flex)];
        let id = complete_struct(&mut arena, None, None, builders).unwrap();
        let ty = arena.get(id);
        assert_eq!(ty.size, 4);
        let TyKind::Struct(agg) = &ty.kind else { panic!("not a struct") };
        assert!(agg.is_flexible);
    }

    #[test]
    fn completing_in_place_preserves_prior_type_id_references() {
        let mut arena = TypeArena::new();
        let forward = arena.new_incomplete_tag(false, Some("Foo".to_string()));
        let builders = vec![unnamed(TypeArena::INT)];
        let id = complete_struct(&mut arena, Some("Foo".to_string()), Some(forward), builders).unwrap();
        assert_eq!(id, forward);
        assert_eq!(arena.get(forward).size, 4);
    }

    #[test]
    fn member_with_incomplete_type_is_an_error() {
        let mut arena = TypeArena::new();
        let incomplete = arena.new_incomplete_tag(false, None);
        let builders = vec![unnamed(incomplete)];
        assert!(complete_struct(&mut arena, None, None, builders).is_err());
    }
}

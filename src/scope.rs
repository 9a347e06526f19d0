//! Lexical scope stack: a stack of name→binding and tag→type maps, searched
//! inside-out. Enter/leave push/pop a frame; a name declared in an inner
//! scope shadows the outer one until the inner scope closes.

use std::collections::HashMap;

use crate::obj::ObjId;
use crate::ty::TypeId;

#[derive(Debug, Clone)]
pub enum Binding {
    Var(ObjId),
    Typedef(TypeId),
    EnumConst { ty: TypeId, val: i64 },
}

#[derive(Default)]
struct Scope {
    vars: HashMap<String, Binding>,
    tags: HashMap<String, TypeId>,
}

pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { scopes: vec![Scope::default()] }
    }

    pub fn enter(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn leave(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "popped the file scope");
    }

    pub fn find_var(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(name))
    }

    pub fn find_tag(&self, name: &str) -> Option<TypeId> {
        self.scopes.iter().rev().find_map(|s| s.tags.get(name)).copied()
    }

    /// Looks up a tag only in the innermost scope, used to decide whether
    /// a `struct Foo { ... }` completion should overwrite an existing
    /// forward declaration in place or shadow it with a new one.
    pub fn find_tag_in_current_scope(&self, name: &str) -> Option<TypeId> {
        self.scopes.last().unwrap().tags.get(name).copied()
    }

    pub fn declare_var(&mut self, name: String, binding: Binding) {
        self.scopes.last_mut().unwrap().vars.insert(name, binding);
    }

    pub fn declare_tag(&mut self, name: String, id: TypeId) {
        self.scopes.last_mut().unwrap().tags.insert(name, id);
    }

    pub fn is_file_scope(&self) -> bool {
        self.scopes.len() == 1
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scope_shadows_then_outer_reappears() {
        let mut s = ScopeStack::new();
        s.declare_var("x".to_string(), Binding::Var(1));
        s.enter();
        s.declare_var("x".to_string(), Binding::Var(2));
        assert!(matches!(s.find_var("x"), Some(Binding::Var(2))));
        s.leave();
        assert!(matches!(s.find_var("x"), Some(Binding::Var(1))));
    }

    #[test]
    fn undeclared_name_is_not_found() {
        let s = ScopeStack::new();
        assert!(s.find_var("nope").is_none());
    }

    #[test]
    fn tag_lookup_only_sees_innermost_for_redeclaration_check() {
        let mut s = ScopeStack::new();
        s.declare_tag("Foo".to_string(), 3);
        s.enter();
        assert!(s.find_tag_in_current_scope("Foo").is_none());
        assert_eq!(s.find_tag("Foo"), Some(3));
    }

    #[test]
    fn file_scope_flag() {
        let mut s = ScopeStack::new();
        assert!(s.is_file_scope());
        s.enter();
        assert!(!s.is_file_scope());
    }
}

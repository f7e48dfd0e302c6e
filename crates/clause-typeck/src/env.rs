//! Type environment with parent-linked scopes.
//!
//! The type environment maps identifier names to their type schemes. Each
//! frame borrows its parent, so entering a binder or a let creates a child
//! frame on the stack and leaving it simply drops the child. Lookups search
//! from the innermost frame outward. The root frame holding the builtins is
//! built once per checker and shared by every check.

use rustc_hash::FxHashMap;

use crate::ty::Scheme;

/// One frame of the type environment.
#[derive(Debug, Default)]
pub struct TypeEnv<'p> {
    bindings: FxHashMap<String, Scheme>,
    parent: Option<&'p TypeEnv<'p>>,
}

impl<'p> TypeEnv<'p> {
    /// Create a root environment with no bindings.
    pub fn new() -> Self {
        TypeEnv {
            bindings: FxHashMap::default(),
            parent: None,
        }
    }

    /// Create an empty frame whose lookups fall back to `self`.
    pub fn child(&'p self) -> TypeEnv<'p> {
        TypeEnv {
            bindings: FxHashMap::default(),
            parent: Some(self),
        }
    }

    /// Bind a name in this frame, shadowing any outer binding.
    pub fn insert(&mut self, name: impl Into<String>, scheme: Scheme) {
        self.bindings.insert(name.into(), scheme);
    }

    /// Look up a name, searching from this frame outward.
    pub fn lookup(&self, name: &str) -> Option<&Scheme> {
        match self.bindings.get(name) {
            Some(scheme) => Some(scheme),
            None => self.parent.and_then(|parent| parent.lookup(name)),
        }
    }

    /// Whether `name` is bound in this frame itself, ignoring parents.
    pub fn binds_locally(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Number of frames from this one up to the root, inclusive.
    pub fn depth(&self) -> usize {
        1 + self.parent.map_or(0, |parent| parent.depth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Ty;

    #[test]
    fn lookup_in_current_frame() {
        let mut env = TypeEnv::new();
        env.insert("x", Scheme::mono(Ty::Number));

        assert!(env.lookup("x").is_some());
        assert!(env.lookup("y").is_none());
    }

    #[test]
    fn lookup_in_parent_frame() {
        let mut root = TypeEnv::new();
        root.insert("x", Scheme::mono(Ty::Number));

        let child = root.child();
        assert_eq!(child.lookup("x").map(|s| &s.ty), Some(&Ty::Number));
        assert!(!child.binds_locally("x"));
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn shadowing() {
        let mut root = TypeEnv::new();
        root.insert("x", Scheme::mono(Ty::Number));

        {
            let mut child = root.child();
            child.insert("x", Scheme::mono(Ty::String));
            assert_eq!(child.lookup("x").unwrap().ty, Ty::String);
        }

        // Dropping the child makes the outer binding visible again.
        assert_eq!(root.lookup("x").unwrap().ty, Ty::Number);
    }

    #[test]
    fn sibling_frames_are_independent() {
        let root = TypeEnv::new();
        let mut left = root.child();
        left.insert("y", Scheme::mono(Ty::Boolean));
        let right = root.child();

        assert!(left.lookup("y").is_some());
        assert!(right.lookup("y").is_none());
    }
}

//! Local contexts and goal declarations.

use im::Vector;

use crate::expr::{Expr, FVarId, Name};

/// A hypothesis `user_name : ty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    pub fvar: FVarId,
    pub user_name: Name,
    pub ty: Expr,
}

/// Ordered list of hypotheses visible to a goal.
///
/// Backed by a persistent vector, so extending a context shares the prefix
/// with the context it was extended from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalContext {
    decls: Vector<LocalDecl>,
}

impl LocalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, decl: LocalDecl) {
        self.decls.push_back(decl);
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LocalDecl> {
        self.decls.iter()
    }

    pub fn find(&self, fvar: FVarId) -> Option<&LocalDecl> {
        self.decls.iter().find(|d| d.fvar == fvar)
    }

    /// Latest hypothesis with the given user name (later ones shadow earlier ones).
    pub fn find_by_name(&self, name: &str) -> Option<&LocalDecl> {
        self.decls.iter().rev().find(|d| d.user_name.as_str() == name)
    }

    pub fn contains(&self, fvar: FVarId) -> bool {
        self.find(fvar).is_some()
    }

    /// `base` if unused, otherwise the first free `base_1`, `base_2`, ...
    pub fn fresh_user_name(&self, base: &Name) -> Name {
        if self.find_by_name(base.as_str()).is_none() {
            return base.clone();
        }
        (1..)
            .map(|i| Name::from(format!("{base}_{i}")))
            .find(|n| self.find_by_name(n.as_str()).is_none())
            .unwrap_or_else(|| base.clone())
    }
}

/// How a metavariable came to be; natural holes may be solved by unification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MVarKind {
    Natural,
    Synthetic,
}

/// Declaration of a goal / metavariable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MVarDecl {
    /// Display tag of the goal, if any.
    pub user_name: Option<Name>,
    pub lctx: LocalContext,
    /// Target type.
    pub ty: Expr,
    pub kind: MVarKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(id: u64, name: &str) -> LocalDecl {
        LocalDecl {
            fvar: FVarId(id),
            user_name: Name::new(name),
            ty: Expr::constant("P"),
        }
    }

    #[test]
    fn test_find_by_name_prefers_latest() {
        let mut lctx = LocalContext::new();
        lctx.push(decl(1, "h"));
        lctx.push(decl(2, "h"));
        assert_eq!(lctx.find_by_name("h").map(|d| d.fvar), Some(FVarId(2)));
        assert!(lctx.find_by_name("x").is_none());
    }

    #[test]
    fn test_fresh_user_name() {
        let mut lctx = LocalContext::new();
        assert_eq!(lctx.fresh_user_name(&Name::new("a")).as_str(), "a");
        lctx.push(decl(1, "a"));
        lctx.push(decl(2, "a_1"));
        assert_eq!(lctx.fresh_user_name(&Name::new("a")).as_str(), "a_2");
    }

    #[test]
    fn test_clone_shares_prefix_but_diverges() {
        let mut base = LocalContext::new();
        base.push(decl(1, "h"));
        let mut extended = base.clone();
        extended.push(decl(2, "h2"));
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
        assert!(!base.contains(FVarId(2)));
    }
}

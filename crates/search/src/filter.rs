//! Applicability filter: hypotheses a closing term must not mention.

use std::collections::BTreeMap;

use elab::{ElabError, Expr, FVarId, LocalContext, Name};

/// Local variables that may not occur free in an accepted term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    vars: BTreeMap<FVarId, Name>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve user-facing names in `lctx`. Later hypotheses shadow earlier ones.
    pub fn resolve(names: &[Name], lctx: &LocalContext) -> Result<Self, ElabError> {
        let mut set = Self::new();
        for name in names {
            let decl = lctx
                .find_by_name(name.as_str())
                .ok_or_else(|| ElabError::UnknownIdentifier(name.clone()))?;
            set.insert(decl.fvar, decl.user_name.clone());
        }
        Ok(set)
    }

    pub fn insert(&mut self, fvar: FVarId, name: Name) {
        self.vars.insert(fvar, name);
    }

    pub fn contains(&self, fvar: FVarId) -> bool {
        self.vars.contains_key(&fvar)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }
}

/// True if `term` mentions an excluded variable, i.e. the candidate is rejected.
///
/// Holes are looked through by instantiating first: the enumerator passes
/// `instantiate_mvars(term)`, so an assigned hole counts as its value. A bare
/// unassigned hole never mentions anything.
pub fn occurs_check(term: &Expr, excluded: &ExclusionSet) -> bool {
    if excluded.is_empty() {
        return false;
    }
    term.find(&mut |e| matches!(e, Expr::FVar(f) if excluded.contains(*f)))
}

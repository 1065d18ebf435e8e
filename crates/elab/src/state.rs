//! Persistent metavariable state and snapshots.
//!
//! All tables are `im` persistent structures, so [`SnapshotManager::save`] is
//! a pointer copy of the current version and [`SnapshotManager::restore`]
//! swaps the active version back. Snapshots are independent of each other and
//! of the live state; restoring never consumes them.

use std::fmt;
use std::sync::Arc;

use im::{HashMap, Vector};

use crate::context::{LocalContext, LocalDecl, MVarDecl, MVarKind};
use crate::error::ElabError;
use crate::expr::{Binder, Expr, FVarId, MVarId, Name};

/// `mvar` was closed by `intros`: its value is `fun fvars => ?inner`,
/// computed lazily once `?inner` is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DelayedAssignment {
    pub(crate) fvars: Vec<FVarId>,
    pub(crate) inner: MVarId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MetaState {
    pub(crate) decls: HashMap<MVarId, MVarDecl>,
    pub(crate) assignments: HashMap<MVarId, Expr>,
    pub(crate) delayed: HashMap<MVarId, DelayedAssignment>,
    pub(crate) goals: Vector<MVarId>,
    pub(crate) next_mvar: u64,
    pub(crate) next_fvar: u64,
}

/// Immutable capture of the metavariable tables and the goal stack.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    state: MetaState,
}

impl Snapshot {
    pub fn goals(&self) -> Vec<MVarId> {
        self.state.goals.iter().copied().collect()
    }

    pub fn num_assignments(&self) -> usize {
        self.state.assignments.len() + self.state.delayed.len()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("mvars", &self.state.decls.len())
            .field("assigned", &self.num_assignments())
            .field("goals", &self.state.goals.len())
            .finish()
    }
}

/// Capture / restore of mutable search state.
pub trait SnapshotManager {
    /// Capture the current state. Does not mutate anything.
    fn save(&self) -> Snapshot;

    /// Reset the active state to exactly `snapshot`. Idempotent.
    fn restore(&mut self, snapshot: &Snapshot);
}

/// Reference elaboration state: goal declarations, assignments and the goal stack.
#[derive(Debug, Clone, Default)]
pub struct MetaContext {
    pub(crate) state: MetaState,
}

impl SnapshotManager for MetaContext {
    fn save(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
        }
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        self.state = snapshot.state.clone();
    }
}

impl MetaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hypothesis `name : ty` to `lctx` with a fresh free variable.
    pub fn mk_local_decl(&mut self, lctx: &mut LocalContext, name: &str, ty: Expr) -> FVarId {
        let fvar = self.fresh_fvar_id();
        lctx.push(LocalDecl {
            fvar,
            user_name: Name::new(name),
            ty,
        });
        fvar
    }

    /// Declare a new goal and push it onto the goal stack.
    pub fn add_goal(&mut self, ty: Expr, lctx: LocalContext, tag: Option<Name>) -> MVarId {
        let mvar = self.declare(ty, lctx, tag, MVarKind::Synthetic);
        self.state.goals.push_back(mvar);
        mvar
    }

    /// Direct assignment of `mvar`, if any (delayed assignments excluded).
    pub fn assignment(&self, mvar: MVarId) -> Option<&Expr> {
        self.state.assignments.get(&mvar)
    }

    pub fn num_mvars(&self) -> usize {
        self.state.decls.len()
    }

    pub(crate) fn declare(
        &mut self,
        ty: Expr,
        lctx: LocalContext,
        user_name: Option<Name>,
        kind: MVarKind,
    ) -> MVarId {
        let mvar = MVarId(self.state.next_mvar);
        self.state.next_mvar += 1;
        self.state.decls.insert(
            mvar,
            MVarDecl {
                user_name,
                lctx,
                ty,
                kind,
            },
        );
        mvar
    }

    pub(crate) fn fresh_fvar_id(&mut self) -> FVarId {
        let fvar = FVarId(self.state.next_fvar);
        self.state.next_fvar += 1;
        fvar
    }

    pub(crate) fn lookup(&self, mvar: MVarId) -> Result<&MVarDecl, ElabError> {
        self.state
            .decls
            .get(&mvar)
            .ok_or(ElabError::UnknownMVar(mvar))
    }

    pub(crate) fn is_assigned_core(&self, mvar: MVarId) -> bool {
        self.state.assignments.contains_key(&mvar) || self.state.delayed.contains_key(&mvar)
    }

    /// `fun (x₁ : T₁) … (xₙ : Tₙ) => body` over hypotheses of `lctx`.
    pub(crate) fn mk_lambda(&self, lctx: &LocalContext, fvars: &[FVarId], body: &Expr) -> Expr {
        let mut result = body.abstract_fvars(fvars);
        for (i, fvar) in fvars.iter().enumerate().rev() {
            let (name, ty) = match lctx.find(*fvar) {
                Some(decl) => (decl.user_name.clone(), self.instantiate_core(&decl.ty)),
                None => {
                    tracing::warn!(fvar = %fvar, "abstracting a variable missing from its context");
                    (Name::new("x"), Expr::constant("_"))
                }
            };
            result = Expr::Lam(
                Binder {
                    name,
                    ty: Arc::new(ty.abstract_fvars(&fvars[..i])),
                },
                Arc::new(result),
            );
        }
        result
    }

    /// Replace assigned metavariables by their values, recursively.
    pub(crate) fn instantiate_core(&self, e: &Expr) -> Expr {
        if !e.has_mvar() {
            return e.clone();
        }
        e.replace(&mut |sub, _| match sub {
            Expr::MVar(m) => {
                if let Some(value) = self.state.assignments.get(m) {
                    Some(self.instantiate_core(value))
                } else if let Some(delayed) = self.state.delayed.get(m) {
                    let inner = self.instantiate_core(&Expr::MVar(delayed.inner));
                    let lctx = self
                        .state
                        .decls
                        .get(&delayed.inner)
                        .map(|d| d.lctx.clone())
                        .unwrap_or_default();
                    Some(self.mk_lambda(&lctx, &delayed.fvars, &inner))
                } else {
                    None
                }
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_restore_roundtrip() {
        let mut ctx = MetaContext::new();
        let g = ctx.add_goal(Expr::constant("P"), LocalContext::new(), None);
        let snap = ctx.save();

        ctx.state.assignments.insert(g, Expr::constant("p"));
        ctx.add_goal(Expr::constant("Q"), LocalContext::new(), None);
        assert_ne!(ctx.save(), snap);

        ctx.restore(&snap);
        assert_eq!(ctx.save(), snap);
        assert!(ctx.assignment(g).is_none());
        assert_eq!(snap.goals(), vec![g]);
    }

    #[test]
    fn test_restore_is_non_destructive() {
        let mut ctx = MetaContext::new();
        ctx.add_goal(Expr::constant("P"), LocalContext::new(), None);
        let snap = ctx.save();
        for _ in 0..3 {
            ctx.add_goal(Expr::constant("Q"), LocalContext::new(), None);
            ctx.restore(&snap);
            assert_eq!(ctx.save(), snap);
        }
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut ctx = MetaContext::new();
        let s0 = ctx.save();
        ctx.add_goal(Expr::constant("P"), LocalContext::new(), None);
        let s1 = ctx.save();
        ctx.restore(&s0);
        assert_eq!(ctx.num_mvars(), 0);
        ctx.restore(&s1);
        assert_eq!(ctx.num_mvars(), 1);
    }

    #[test]
    fn test_instantiate_follows_chains() {
        let mut ctx = MetaContext::new();
        let a = ctx.add_goal(Expr::constant("P"), LocalContext::new(), None);
        let b = ctx.add_goal(Expr::constant("P"), LocalContext::new(), None);
        ctx.state.assignments.insert(a, Expr::app(Expr::constant("f"), Expr::MVar(b)));
        ctx.state.assignments.insert(b, Expr::constant("x"));
        assert_eq!(
            ctx.instantiate_core(&Expr::MVar(a)),
            Expr::app(Expr::constant("f"), Expr::constant("x"))
        );
    }
}

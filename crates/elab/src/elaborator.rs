//! The elaboration-engine interface consumed by library search, and its
//! reference implementation on [`MetaContext`].

use std::sync::Arc;

use crate::context::{LocalContext, LocalDecl, MVarDecl, MVarKind};
use crate::error::ElabError;
use crate::expr::{Expr, FVarId, MVarId, Name};
use crate::state::{DelayedAssignment, MetaContext, SnapshotManager};

/// Elaboration services used by the search driver and lemma oracles.
///
/// Object safe, so drivers and oracles take `&mut dyn Elaborator` and tests
/// can wrap the reference implementation to inject failures.
pub trait Elaborator: SnapshotManager {
    /// The goal stack, main goal first.
    fn goals(&self) -> Vec<MVarId>;

    fn set_goals(&mut self, goals: Vec<MVarId>);

    fn main_goal(&self) -> Result<MVarId, ElabError> {
        self.goals().first().copied().ok_or(ElabError::NoGoals)
    }

    fn decl(&self, mvar: MVarId) -> Result<MVarDecl, ElabError>;

    fn is_assigned(&self, mvar: MVarId) -> bool;

    /// Assign `mvar := value`. A metavariable is assigned at most once.
    fn assign(&mut self, mvar: MVarId, value: Expr) -> Result<(), ElabError>;

    /// Declare a fresh metavariable. Every free variable of `ty` must be in `lctx`.
    fn mk_fresh_mvar(
        &mut self,
        ty: Expr,
        lctx: LocalContext,
        user_name: Option<Name>,
        kind: MVarKind,
    ) -> Result<MVarId, ElabError>;

    /// Introduce all leading binders of the goal's target as hypotheses.
    ///
    /// Returns the new free variables and the goal that remains. When the
    /// target is not a binder, returns `(vec![], goal)` unchanged.
    fn intros(&mut self, goal: MVarId) -> Result<(Vec<FVarId>, MVarId), ElabError>;

    /// Definitional equality, assigning unassigned natural metavariables
    /// as needed. On `false` no assignment survives.
    fn is_def_eq(&mut self, lhs: &Expr, rhs: &Expr) -> Result<bool, ElabError>;

    fn instantiate_mvars(&self, e: &Expr) -> Expr;

    fn head_beta(&self, e: &Expr) -> Expr {
        e.head_beta()
    }
}

impl Elaborator for MetaContext {
    fn goals(&self) -> Vec<MVarId> {
        self.state.goals.iter().copied().collect()
    }

    fn set_goals(&mut self, goals: Vec<MVarId>) {
        self.state.goals = goals.into_iter().collect();
    }

    fn decl(&self, mvar: MVarId) -> Result<MVarDecl, ElabError> {
        self.lookup(mvar).cloned()
    }

    fn is_assigned(&self, mvar: MVarId) -> bool {
        self.is_assigned_core(mvar)
    }

    fn assign(&mut self, mvar: MVarId, value: Expr) -> Result<(), ElabError> {
        self.lookup(mvar)?;
        if self.is_assigned_core(mvar) {
            return Err(ElabError::AlreadyAssigned(mvar));
        }
        tracing::trace!(mvar = %mvar, value = %value, "assign");
        self.state.assignments.insert(mvar, value);
        Ok(())
    }

    fn mk_fresh_mvar(
        &mut self,
        ty: Expr,
        lctx: LocalContext,
        user_name: Option<Name>,
        kind: MVarKind,
    ) -> Result<MVarId, ElabError> {
        let mut missing = None;
        ty.find(&mut |e| match e {
            Expr::FVar(f) if !lctx.contains(*f) => {
                missing = Some(*f);
                true
            }
            _ => false,
        });
        if let Some(fvar) = missing {
            return Err(ElabError::UnknownFVar(fvar));
        }
        Ok(self.declare(ty, lctx, user_name, kind))
    }

    fn intros(&mut self, goal: MVarId) -> Result<(Vec<FVarId>, MVarId), ElabError> {
        let decl = self.lookup(goal)?.clone();
        if self.is_assigned_core(goal) {
            return Err(ElabError::AlreadyAssigned(goal));
        }
        let mut lctx = decl.lctx.clone();
        let mut target = self.instantiate_core(&decl.ty).head_beta();
        let mut fvars = Vec::new();
        loop {
            let (binder, body) = match &target {
                Expr::Pi(binder, body) => (binder.clone(), Arc::clone(body)),
                _ => break,
            };
            let fvar = self.fresh_fvar_id();
            let name = lctx.fresh_user_name(&binder.name);
            lctx.push(LocalDecl {
                fvar,
                user_name: name,
                ty: (*binder.ty).clone(),
            });
            fvars.push(fvar);
            target = body.instantiate1(&Expr::FVar(fvar)).head_beta();
        }
        if fvars.is_empty() {
            return Ok((fvars, goal));
        }
        let inner = self.declare(target, lctx, decl.user_name.clone(), MVarKind::Natural);
        self.state.delayed.insert(
            goal,
            DelayedAssignment {
                fvars: fvars.clone(),
                inner,
            },
        );
        tracing::trace!(goal = %goal, inner = %inner, count = fvars.len(), "intros");
        Ok((fvars, inner))
    }

    fn is_def_eq(&mut self, lhs: &Expr, rhs: &Expr) -> Result<bool, ElabError> {
        let saved = self.save();
        match self.def_eq_core(lhs, rhs) {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.restore(&saved);
                Ok(false)
            }
            Err(e) => {
                self.restore(&saved);
                Err(e)
            }
        }
    }

    fn instantiate_mvars(&self, e: &Expr) -> Expr {
        self.instantiate_core(e)
    }
}

impl MetaContext {
    fn def_eq_core(&mut self, lhs: &Expr, rhs: &Expr) -> Result<bool, ElabError> {
        let lhs = self.instantiate_core(lhs).head_beta();
        let rhs = self.instantiate_core(rhs).head_beta();
        if lhs == rhs {
            return Ok(true);
        }
        if let Expr::MVar(m) = &lhs {
            if self.try_assign(*m, &rhs)? {
                return Ok(true);
            }
        }
        if let Expr::MVar(m) = &rhs {
            if self.try_assign(*m, &lhs)? {
                return Ok(true);
            }
        }
        match (&lhs, &rhs) {
            (Expr::App(f1, a1), Expr::App(f2, a2)) => {
                Ok(self.def_eq_core(f1, f2)? && self.def_eq_core(a1, a2)?)
            }
            (Expr::Lam(b1, x1), Expr::Lam(b2, x2)) | (Expr::Pi(b1, x1), Expr::Pi(b2, x2)) => {
                Ok(self.def_eq_core(&b1.ty, &b2.ty)? && self.def_eq_core(x1, x2)?)
            }
            _ => Ok(false),
        }
    }

    /// First-order assignment with occurs and scope checks. `value` must
    /// already be instantiated.
    fn try_assign(&mut self, mvar: MVarId, value: &Expr) -> Result<bool, ElabError> {
        let decl = self.lookup(mvar)?;
        if self.is_assigned_core(mvar) || decl.kind == MVarKind::Synthetic {
            return Ok(false);
        }
        if value.has_loose_bvars() || value.occurs_mvar(mvar) {
            return Ok(false);
        }
        let lctx = &decl.lctx;
        if value.find(&mut |e| matches!(e, Expr::FVar(f) if !lctx.contains(*f))) {
            return Ok(false);
        }
        self.state.assignments.insert(mvar, value.clone());
        Ok(true)
    }
}

//! Core term language: names, variable ids and expressions.
//!
//! Bound variables use de Bruijn indices. Free variables (`FVar`) refer to
//! hypotheses in a [`LocalContext`](crate::LocalContext); metavariables
//! (`MVar`) refer to holes tracked by the [`MetaContext`](crate::MetaContext).

use std::fmt;
use std::sync::Arc;

/// A hierarchical identifier such as `And.intro`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<str>);

impl Name {
    pub fn new(s: &str) -> Self {
        Name(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(Arc::from(s))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for Name {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Metavariable id. Unique within one [`MetaContext`](crate::MetaContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MVarId(pub u64);

impl fmt::Display for MVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?m.{}", self.0)
    }
}

/// Free variable id of a local hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FVarId(pub u64);

impl fmt::Display for FVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_fvar.{}", self.0)
    }
}

/// Why a goal was closed with a placeholder instead of a real proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The oracle produced no usable candidate at all.
    NoCandidates,
    /// Candidates were found but none of them closes the goal.
    CouldNotClose,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCandidates => write!(f, "no_candidates"),
            Self::CouldNotClose => write!(f, "could_not_close"),
        }
    }
}

/// Provenance of a placeholder (`sorry`) term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SorryLabel {
    /// The invocation that produced it, e.g. `exact?`.
    pub origin: Name,
    pub failure: FailureKind,
    /// Makes distinct placeholders non-defeq to each other.
    pub id: u64,
}

/// Binder name and type of a `Lam` or `Pi`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binder {
    pub name: Name,
    pub ty: Arc<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    BVar(u32),
    FVar(FVarId),
    MVar(MVarId),
    Const(Name),
    App(Arc<Expr>, Arc<Expr>),
    Lam(Binder, Arc<Expr>),
    Pi(Binder, Arc<Expr>),
    /// Opaque placeholder of type `ty`.
    Sorry { ty: Arc<Expr>, label: SorryLabel },
}

impl Expr {
    pub fn constant(name: impl Into<Name>) -> Self {
        Expr::Const(name.into())
    }

    pub fn app(f: Expr, a: Expr) -> Self {
        Expr::App(Arc::new(f), Arc::new(a))
    }

    /// `f a₁ … aₙ`
    pub fn mk_app(f: Expr, args: impl IntoIterator<Item = Expr>) -> Self {
        args.into_iter().fold(f, Expr::app)
    }

    pub fn lam(name: impl Into<Name>, ty: Expr, body: Expr) -> Self {
        Expr::Lam(
            Binder {
                name: name.into(),
                ty: Arc::new(ty),
            },
            Arc::new(body),
        )
    }

    pub fn pi(name: impl Into<Name>, ty: Expr, body: Expr) -> Self {
        Expr::Pi(
            Binder {
                name: name.into(),
                ty: Arc::new(ty),
            },
            Arc::new(body),
        )
    }

    /// Non-dependent function type `dom → codom`.
    pub fn arrow(dom: Expr, codom: Expr) -> Self {
        Expr::pi("a", dom, codom.lift_loose_bvars(0, 1))
    }

    pub fn sorry(ty: Expr, label: SorryLabel) -> Self {
        Expr::Sorry {
            ty: Arc::new(ty),
            label,
        }
    }

    /// Head of an application spine.
    pub fn app_fn(&self) -> &Expr {
        let mut e = self;
        while let Expr::App(f, _) = e {
            e = f;
        }
        e
    }

    /// Arguments of an application spine, in application order.
    pub fn app_args(&self) -> Vec<&Expr> {
        let mut args = Vec::new();
        let mut e = self;
        while let Expr::App(f, a) = e {
            args.push(a.as_ref());
            e = f;
        }
        args.reverse();
        args
    }

    /// One more than the largest loose bound variable index, or 0.
    pub fn loose_bvar_range(&self) -> u32 {
        match self {
            Expr::BVar(i) => i + 1,
            Expr::App(f, a) => f.loose_bvar_range().max(a.loose_bvar_range()),
            Expr::Lam(b, body) | Expr::Pi(b, body) => b
                .ty
                .loose_bvar_range()
                .max(body.loose_bvar_range().saturating_sub(1)),
            Expr::Sorry { ty, .. } => ty.loose_bvar_range(),
            Expr::FVar(_) | Expr::MVar(_) | Expr::Const(_) => 0,
        }
    }

    pub fn has_loose_bvars(&self) -> bool {
        self.loose_bvar_range() > 0
    }

    /// Whether bound variable `idx` occurs loose in `self`.
    pub fn has_loose_bvar(&self, idx: u32) -> bool {
        match self {
            Expr::BVar(i) => *i == idx,
            Expr::App(f, a) => f.has_loose_bvar(idx) || a.has_loose_bvar(idx),
            Expr::Lam(b, body) | Expr::Pi(b, body) => {
                b.ty.has_loose_bvar(idx) || body.has_loose_bvar(idx + 1)
            }
            Expr::Sorry { ty, .. } => ty.has_loose_bvar(idx),
            Expr::FVar(_) | Expr::MVar(_) | Expr::Const(_) => false,
        }
    }

    /// Pre-order search; returns true as soon as `pred` matches a subterm.
    pub fn find(&self, pred: &mut dyn FnMut(&Expr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Expr::App(f, a) => f.find(pred) || a.find(pred),
            Expr::Lam(b, body) | Expr::Pi(b, body) => b.ty.find(pred) || body.find(pred),
            Expr::Sorry { ty, .. } => ty.find(pred),
            Expr::BVar(_) | Expr::FVar(_) | Expr::MVar(_) | Expr::Const(_) => false,
        }
    }

    pub fn has_mvar(&self) -> bool {
        self.find(&mut |e| matches!(e, Expr::MVar(_)))
    }

    pub fn occurs_fvar(&self, fvar: FVarId) -> bool {
        self.find(&mut |e| matches!(e, Expr::FVar(f) if *f == fvar))
    }

    pub fn occurs_mvar(&self, mvar: MVarId) -> bool {
        self.find(&mut |e| matches!(e, Expr::MVar(m) if *m == mvar))
    }

    /// Metavariables occurring in `self`, in first-occurrence order.
    pub fn collect_mvars(&self) -> Vec<MVarId> {
        let mut out = Vec::new();
        self.find(&mut |e| {
            if let Expr::MVar(m) = e {
                if !out.contains(m) {
                    out.push(*m);
                }
            }
            false
        });
        out
    }

    /// Bottom-up rewrite. `f` receives each subterm together with the number
    /// of binders above it; returning `Some` replaces the subterm.
    pub fn replace(&self, f: &mut dyn FnMut(&Expr, u32) -> Option<Expr>) -> Expr {
        self.replace_at(f, 0)
    }

    fn replace_at(&self, f: &mut dyn FnMut(&Expr, u32) -> Option<Expr>, offset: u32) -> Expr {
        if let Some(e) = f(self, offset) {
            return e;
        }
        match self {
            Expr::App(fun, arg) => Expr::App(
                Arc::new(fun.replace_at(f, offset)),
                Arc::new(arg.replace_at(f, offset)),
            ),
            Expr::Lam(b, body) => Expr::Lam(
                b.replace_ty(f, offset),
                Arc::new(body.replace_at(f, offset + 1)),
            ),
            Expr::Pi(b, body) => Expr::Pi(
                b.replace_ty(f, offset),
                Arc::new(body.replace_at(f, offset + 1)),
            ),
            Expr::Sorry { ty, label } => Expr::Sorry {
                ty: Arc::new(ty.replace_at(f, offset)),
                label: label.clone(),
            },
            Expr::BVar(_) | Expr::FVar(_) | Expr::MVar(_) | Expr::Const(_) => self.clone(),
        }
    }

    /// Shift loose bound variables `>= start` up by `n`.
    pub fn lift_loose_bvars(&self, start: u32, n: u32) -> Expr {
        if n == 0 {
            return self.clone();
        }
        self.replace(&mut |e, offset| match e {
            Expr::BVar(i) if *i >= start + offset => Some(Expr::BVar(i + n)),
            _ => None,
        })
    }

    /// Substitute `val` for bound variable 0 of a binder body.
    pub fn instantiate1(&self, val: &Expr) -> Expr {
        self.replace(&mut |e, offset| match e {
            Expr::BVar(i) if *i == offset => Some(val.lift_loose_bvars(0, offset)),
            Expr::BVar(i) if *i > offset => Some(Expr::BVar(i - 1)),
            _ => None,
        })
    }

    /// Replace `fvars[i]` by the bound variable that a binder telescope over
    /// `fvars` (outermost first) would assign to it.
    pub fn abstract_fvars(&self, fvars: &[FVarId]) -> Expr {
        if fvars.is_empty() {
            return self.clone();
        }
        let n = fvars.len() as u32;
        self.replace(&mut |e, offset| match e {
            Expr::FVar(id) => fvars
                .iter()
                .position(|f| f == id)
                .map(|i| Expr::BVar(offset + n - 1 - i as u32)),
            _ => None,
        })
    }

    /// Beta-reduce the head of an application spine: `(fun x => b) a` ~> `b[a/x]`.
    pub fn head_beta(&self) -> Expr {
        if !matches!(self.app_fn(), Expr::Lam(..)) || !matches!(self, Expr::App(..)) {
            return self.clone();
        }
        let mut result = self.app_fn().clone();
        let mut rest = self.app_args().into_iter().cloned();
        loop {
            let body = match &result {
                Expr::Lam(_, body) => Arc::clone(body),
                _ => break,
            };
            let Some(arg) = rest.next() else { break };
            result = body.instantiate1(&arg);
        }
        let result = Expr::mk_app(result, rest);
        if matches!(result.app_fn(), Expr::Lam(..)) && matches!(result, Expr::App(..)) {
            result.head_beta()
        } else {
            result
        }
    }
}

impl Binder {
    fn replace_ty(&self, f: &mut dyn FnMut(&Expr, u32) -> Option<Expr>, offset: u32) -> Binder {
        Binder {
            name: self.name.clone(),
            ty: Arc::new(self.ty.replace_at(f, offset)),
        }
    }
}

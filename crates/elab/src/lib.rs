//! Elaboration state for library search.
//!
//! Holds the term language, local contexts, the persistent metavariable
//! tables with cheap snapshots, and a small reference elaborator that
//! implements the [`Elaborator`] interface the search driver is written
//! against.
//!
//! # Quick Start
//!
//! ```rust
//! use elab::{parse_term, Elaborator, Expr, LocalContext, MetaContext, SnapshotManager};
//!
//! let mut ctx = MetaContext::new();
//! let mut lctx = LocalContext::new();
//! let h = ctx.mk_local_decl(&mut lctx, "h", Expr::constant("P"));
//! let target = parse_term("P", &lctx).unwrap();
//! let goal = ctx.add_goal(target, lctx, None);
//!
//! let before = ctx.save();
//! ctx.assign(goal, Expr::FVar(h)).unwrap();
//! assert!(ctx.is_assigned(goal));
//! ctx.restore(&before);
//! assert!(!ctx.is_assigned(goal));
//! ```
//!
//! # Key types
//!
//! - [`MetaContext`]: goal declarations, assignments and the goal stack
//! - [`Snapshot`] / [`SnapshotManager`]: capture and restore of that state
//! - [`Elaborator`]: assignment, unification, `intros`, instantiation
//! - [`parse_term`] / [`pp_expr`]: surface syntax

pub mod context;
pub mod elaborator;
pub mod error;
pub mod expr;
pub mod state;
pub mod syntax;

pub use context::{LocalContext, LocalDecl, MVarDecl, MVarKind};
pub use elaborator::Elaborator;
pub use error::ElabError;
pub use expr::{Binder, Expr, FVarId, FailureKind, MVarId, Name, SorryLabel};
pub use state::{MetaContext, Snapshot, SnapshotManager};
pub use syntax::{parse_term, pp_expr, pp_goal};

//! Mock lemma oracle for testing the driver without a real corpus.

use std::cell::Cell;

use elab::{parse_term, Expr, LocalContext, MVarId, MVarKind, Name};

use crate::engine::{SearchContext, SearchError};
use crate::enumerator::{Candidate, CandidateStream, LemmaOracle, LemmaRef};
use crate::filter::ExclusionSet;

/// One scripted step of a [`MockOracle`] stream. Terms and types are
/// surface syntax, parsed in the goal's local context when pulled.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// `term` closes the goal; its type is taken to be the goal's target.
    Closure { lemma: String, term: String },
    /// Like `Closure` but with an explicit (possibly wrong) type.
    ClosureWithType {
        lemma: String,
        term: String,
        ty: String,
    },
    /// `lemma ?g₁ … ?gₙ` with one fresh subgoal per listed type.
    Partial { lemma: String, subgoals: Vec<String> },
    /// Fail the pull with `BudgetExceeded`.
    Budget,
    /// Fail the pull with an oracle error.
    Error(String),
}

/// Convenience constructor for a closing outcome.
pub fn closure(lemma: &str, term: &str) -> MockOutcome {
    MockOutcome::Closure {
        lemma: lemma.to_string(),
        term: term.to_string(),
    }
}

/// Convenience constructor for a closing outcome with an explicit type.
pub fn with_type(lemma: &str, term: &str, ty: &str) -> MockOutcome {
    MockOutcome::ClosureWithType {
        lemma: lemma.to_string(),
        term: term.to_string(),
        ty: ty.to_string(),
    }
}

/// Convenience constructor for a partial application.
pub fn partial(lemma: &str, subgoals: &[&str]) -> MockOutcome {
    MockOutcome::Partial {
        lemma: lemma.to_string(),
        subgoals: subgoals.iter().map(|s| s.to_string()).collect(),
    }
}

/// Mock oracle replaying a fixed script for every goal, counting pulls.
pub struct MockOracle {
    outcomes: Vec<MockOutcome>,
    pulls: Cell<usize>,
    last_cap: Cell<Option<usize>>,
}

impl MockOracle {
    pub fn new(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes,
            pulls: Cell::new(0),
            last_cap: Cell::new(None),
        }
    }

    /// Total number of `next_candidate` calls across all streams.
    pub fn pulls(&self) -> usize {
        self.pulls.get()
    }

    /// The `cap` passed to the most recent `search` call.
    pub fn last_cap(&self) -> Option<usize> {
        self.last_cap.get()
    }
}

impl LemmaOracle for MockOracle {
    fn search<'a>(
        &'a self,
        goal: MVarId,
        _excluded: &ExclusionSet,
        cap: usize,
    ) -> Box<dyn CandidateStream + 'a> {
        self.last_cap.set(Some(cap));
        Box::new(MockStream {
            oracle: self,
            goal,
            next: 0,
        })
    }
}

struct MockStream<'a> {
    oracle: &'a MockOracle,
    goal: MVarId,
    next: usize,
}

fn lemma_ref(name: &str, lctx: &LocalContext) -> LemmaRef {
    match lctx.find_by_name(name) {
        Some(decl) => LemmaRef::Local {
            fvar: decl.fvar,
            name: decl.user_name.clone(),
        },
        None => LemmaRef::Global(Name::new(name)),
    }
}

impl CandidateStream for MockStream<'_> {
    fn next_candidate(
        &mut self,
        cx: &mut SearchContext<'_>,
    ) -> Result<Option<Candidate>, SearchError> {
        self.oracle.pulls.set(self.oracle.pulls.get() + 1);
        let Some(outcome) = self.oracle.outcomes.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let decl = cx.elab.decl(self.goal)?;
        let target = cx.elab.instantiate_mvars(&decl.ty);
        let candidate = match outcome {
            MockOutcome::Closure { lemma, term } => Candidate::FullClosure {
                lemma: lemma_ref(lemma, &decl.lctx),
                term: parse_term(term, &decl.lctx)?,
                ty: target,
            },
            MockOutcome::ClosureWithType { lemma, term, ty } => Candidate::FullClosure {
                lemma: lemma_ref(lemma, &decl.lctx),
                term: parse_term(term, &decl.lctx)?,
                ty: parse_term(ty, &decl.lctx)?,
            },
            MockOutcome::Partial { lemma, subgoals } => {
                let mut new_goals = Vec::new();
                for ty in subgoals {
                    let ty = parse_term(ty, &decl.lctx)?;
                    new_goals.push(cx.elab.mk_fresh_mvar(
                        ty,
                        decl.lctx.clone(),
                        None,
                        MVarKind::Natural,
                    )?);
                }
                let lemma = lemma_ref(lemma, &decl.lctx);
                let head = match &lemma {
                    LemmaRef::Local { fvar, .. } => Expr::FVar(*fvar),
                    LemmaRef::Global(name) => Expr::Const(name.clone()),
                };
                Candidate::PartialApplication {
                    lemma,
                    term: Expr::mk_app(head, new_goals.iter().map(|g| Expr::MVar(*g))),
                    ty: target,
                    new_goals,
                }
            }
            MockOutcome::Budget => {
                return Err(SearchError::BudgetExceeded {
                    used: cx.budget.used(),
                    limit: cx.budget.limit(),
                })
            }
            MockOutcome::Error(message) => {
                return Err(SearchError::Oracle(anyhow::anyhow!("{message}")))
            }
        };
        Ok(Some(candidate))
    }
}

//! Candidate enumeration at the lemma-oracle boundary.
//!
//! An oracle hands out a lazy [`CandidateStream`]; the [`Enumerator`] pulls
//! from it one candidate at a time, brackets every pull with a snapshot,
//! validates the candidate against the goal and yields accepted ones as
//! [`Trial`]s. The elaboration state is back at the pre-pull point after
//! every call, whatever the outcome.

use std::fmt;

use elab::{Expr, FVarId, MVarId, Name, Snapshot};

use crate::config::LimitOrder;
use crate::engine::{SearchContext, SearchError};
use crate::filter::{occurs_check, ExclusionSet};

/// Where a candidate came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LemmaRef {
    /// A hypothesis of the goal's local context.
    Local { fvar: FVarId, name: Name },
    /// A lemma from the corpus.
    Global(Name),
}

impl LemmaRef {
    pub fn name(&self) -> &Name {
        match self {
            LemmaRef::Local { name, .. } | LemmaRef::Global(name) => name,
        }
    }
}

impl fmt::Display for LemmaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One search outcome proposed by an oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// `term : ty` with no remaining holes.
    FullClosure { lemma: LemmaRef, term: Expr, ty: Expr },
    /// `term : ty` whose holes `new_goals` are left to the user.
    PartialApplication {
        lemma: LemmaRef,
        term: Expr,
        ty: Expr,
        new_goals: Vec<MVarId>,
    },
}

impl Candidate {
    pub fn lemma(&self) -> &LemmaRef {
        match self {
            Candidate::FullClosure { lemma, .. } | Candidate::PartialApplication { lemma, .. } => {
                lemma
            }
        }
    }

    pub fn term(&self) -> &Expr {
        match self {
            Candidate::FullClosure { term, .. } | Candidate::PartialApplication { term, .. } => {
                term
            }
        }
    }

    pub fn ty(&self) -> &Expr {
        match self {
            Candidate::FullClosure { ty, .. } | Candidate::PartialApplication { ty, .. } => ty,
        }
    }
}

/// Lazy, pull-based stream of candidates for one goal.
pub trait CandidateStream {
    /// Produce the next candidate, `None` once the stream is exhausted.
    ///
    /// May leave tentative assignments behind; the caller rolls them back.
    /// A `BudgetExceeded` error ends the stream.
    fn next_candidate(
        &mut self,
        cx: &mut SearchContext<'_>,
    ) -> Result<Option<Candidate>, SearchError>;
}

/// Source of candidate lemmas for a goal.
///
/// Candidates come out best first. `cap` is the number of candidates the
/// caller will accept at most; oracles may use it to bound their own work.
pub trait LemmaOracle {
    fn search<'a>(
        &'a self,
        goal: MVarId,
        excluded: &ExclusionSet,
        cap: usize,
    ) -> Box<dyn CandidateStream + 'a>;
}

/// A validated candidate together with the state it produces.
#[derive(Debug, Clone)]
pub struct Trial {
    pub candidate: Candidate,
    /// Elaboration state right after assigning the goal to the candidate.
    pub state: Snapshot,
    /// Holes of the assigned term still open in `state`, in order.
    pub remaining: Vec<MVarId>,
}

impl Trial {
    pub fn closes_goal(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Validating wrapper around an oracle stream for one goal.
pub struct Enumerator<'o> {
    stream: Box<dyn CandidateStream + 'o>,
    goal: MVarId,
    target: Expr,
    excluded: ExclusionSet,
    cap: usize,
    order: LimitOrder,
    accepted: usize,
    pulled: usize,
    done: bool,
    /// Past the cap, keep pulling for a closure and drop partials.
    closures_past_cap: bool,
}

impl<'o> Enumerator<'o> {
    pub fn new(
        oracle: &'o dyn LemmaOracle,
        cx: &SearchContext<'_>,
        goal: MVarId,
        excluded: ExclusionSet,
        cap: usize,
        order: LimitOrder,
    ) -> Result<Self, SearchError> {
        let decl = cx.elab.decl(goal)?;
        let target = cx.elab.instantiate_mvars(&decl.ty);
        let stream = oracle.search(goal, &excluded, cap);
        Ok(Self {
            stream,
            goal,
            target,
            excluded,
            cap,
            order,
            accepted: 0,
            pulled: 0,
            done: false,
            closures_past_cap: false,
        })
    }

    /// Let the cap bound only partial applications; closing candidates are
    /// still accepted after it is reached, until the stream or budget ends.
    pub fn closures_past_cap(mut self, enabled: bool) -> Self {
        self.closures_past_cap = enabled;
        self
    }

    /// Number of candidates pulled from the oracle so far.
    pub fn pulled(&self) -> usize {
        self.pulled
    }

    fn check_limits(&mut self, cx: &SearchContext<'_>) -> Result<bool, SearchError> {
        let capped = self.accepted >= self.cap && !self.closures_past_cap;
        match self.order {
            LimitOrder::CapFirst => {
                if capped {
                    return Ok(false);
                }
                cx.budget.check()?;
            }
            LimitOrder::BudgetFirst => {
                cx.budget.check()?;
                if capped {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Pull until a candidate is accepted, the stream ends or the cap is reached.
    pub fn next_trial(&mut self, cx: &mut SearchContext<'_>) -> Result<Option<Trial>, SearchError> {
        loop {
            if self.done {
                return Ok(None);
            }
            if !self.check_limits(cx)? {
                tracing::debug!(goal = %self.goal, cap = self.cap, "result cap reached");
                self.done = true;
                return Ok(None);
            }

            let before = cx.elab.save();
            cx.budget.tick(1);
            self.pulled += 1;
            let candidate = match self.stream.next_candidate(cx) {
                Ok(Some(candidate)) => candidate,
                Ok(None) => {
                    cx.elab.restore(&before);
                    self.done = true;
                    return Ok(None);
                }
                Err(e) => {
                    cx.elab.restore(&before);
                    return Err(e);
                }
            };

            let verdict = self.try_commit(cx, &candidate);
            let state = cx.elab.save();
            cx.elab.restore(&before);
            match verdict {
                Ok(Ok(remaining)) if !remaining.is_empty() && self.accepted >= self.cap => {
                    tracing::debug!(
                        goal = %self.goal,
                        lemma = %candidate.lemma(),
                        "partial dropped past result cap"
                    );
                }
                Ok(Ok(remaining)) => {
                    self.accepted += 1;
                    tracing::debug!(
                        goal = %self.goal,
                        lemma = %candidate.lemma(),
                        remaining = remaining.len(),
                        "candidate accepted"
                    );
                    return Ok(Some(Trial {
                        candidate,
                        state,
                        remaining,
                    }));
                }
                Ok(Err(reason)) => {
                    tracing::debug!(
                        goal = %self.goal,
                        lemma = %candidate.lemma(),
                        reason,
                        "candidate rejected"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Check the candidate and assign the goal to it. The inner `Err` is a
    /// rejection reason; the outer one an elaboration failure.
    fn try_commit(
        &self,
        cx: &mut SearchContext<'_>,
        candidate: &Candidate,
    ) -> Result<Result<Vec<MVarId>, &'static str>, SearchError> {
        if !cx.elab.is_def_eq(candidate.ty(), &self.target)? {
            return Ok(Err("type mismatch"));
        }
        let term = cx.elab.instantiate_mvars(candidate.term());
        if occurs_check(&term, &self.excluded) {
            return Ok(Err("mentions an excluded hypothesis"));
        }
        if term.occurs_mvar(self.goal) {
            return Ok(Err("refers to the goal itself"));
        }

        let mut remaining = Vec::new();
        if let Candidate::PartialApplication { new_goals, .. } = candidate {
            remaining.extend(new_goals.iter().copied().filter(|g| !cx.elab.is_assigned(*g)));
        }
        for mvar in term.collect_mvars() {
            if !cx.elab.is_assigned(mvar) && !remaining.contains(&mvar) {
                remaining.push(mvar);
            }
        }
        if matches!(candidate, Candidate::FullClosure { .. }) && !remaining.is_empty() {
            return Ok(Err("closing term has unassigned holes"));
        }

        cx.elab.assign(self.goal, term)?;
        Ok(Ok(remaining))
    }
}

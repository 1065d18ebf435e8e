//! Library search driver: `exact?`, `apply?` and `exact?%`.
//!
//! Every entry point follows the same state machine
//! (`Start → Introduced → Searching → {Closed, PartialOnly, Exhausted} → Reported`).
//! The main goal is never touched until a decision is made: the search runs
//! on an introduced duplicate, and any error restores the outer snapshot.

use std::fmt;

use elab::{
    ElabError, Elaborator, Expr, FVarId, FailureKind, LocalContext, MVarId, MVarKind, SorryLabel,
};

use crate::budget::Budget;
use crate::config::SearchConfig;
use crate::enumerator::{Enumerator, LemmaOracle, Trial};
use crate::filter::ExclusionSet;
use crate::invocation::{Invocation, SearchMode};
use crate::report::{Reporter, Severity, SuggestionSink};

/// Errors that can occur during library search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The invocation is not one of the supported forms.
    #[error("unsupported syntax: {0}")]
    UnsupportedSyntax(String),
    /// The heartbeat budget ran out.
    #[error("heartbeat budget exhausted ({used}/{limit})")]
    BudgetExceeded { used: u64, limit: u64 },
    /// Error from the elaboration engine.
    #[error("elaboration error: {0}")]
    Elab(#[from] ElabError),
    /// Error from the lemma oracle.
    #[error("oracle error: {0}")]
    Oracle(#[source] anyhow::Error),
}

/// Services a search runs against: the elaborator and the heartbeat budget.
pub struct SearchContext<'a> {
    pub elab: &'a mut dyn Elaborator,
    pub budget: &'a Budget,
}

/// Driver states, traced on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Start,
    Introduced,
    Searching,
    Closed,
    PartialOnly,
    Exhausted,
    Reported,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverState::Start => "start",
            DriverState::Introduced => "introduced",
            DriverState::Searching => "searching",
            DriverState::Closed => "closed",
            DriverState::PartialOnly => "partial_only",
            DriverState::Exhausted => "exhausted",
            DriverState::Reported => "reported",
        };
        f.write_str(s)
    }
}

/// Result of a tactic invocation (`exact?` / `apply?`).
#[derive(Debug, Clone)]
pub struct TacticOutcome {
    /// `Closed`, `PartialOnly` or `Exhausted`.
    pub decision: DriverState,
    /// Goal stack after the tactic.
    pub goals: Vec<MVarId>,
    /// Term assigned to the main goal when closed.
    pub term: Option<Expr>,
    /// Accepted partial applications, in oracle order.
    pub partials: Vec<Trial>,
    /// The main goal was closed with a labelled `sorry`.
    pub admitted: bool,
    pub failure: Option<FailureKind>,
    /// The budget ran out while collecting partial results.
    pub truncated: bool,
}

/// What the enumerator produced for one goal.
struct SearchRun {
    closure: Option<Trial>,
    partials: Vec<Trial>,
    truncated: bool,
}

impl SearchRun {
    fn failure(&self) -> FailureKind {
        if self.partials.is_empty() {
            FailureKind::NoCandidates
        } else {
            FailureKind::CouldNotClose
        }
    }
}

/// The goal search actually runs on, after `intros`.
struct Introduced {
    goal: MVarId,
    excluded: ExclusionSet,
}

/// Library search over a lemma oracle.
pub struct LibrarySearch<'o> {
    config: SearchConfig,
    oracle: &'o dyn LemmaOracle,
}

impl<'o> LibrarySearch<'o> {
    /// Create a new driver with the given configuration.
    pub fn new(config: SearchConfig, oracle: &'o dyn LemmaOracle) -> Self {
        config.validate();
        Self { config, oracle }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Tactic `exact?`: close the main goal, or report, log an error and
    /// admit it.
    pub fn eval_exact(
        &self,
        cx: &mut SearchContext<'_>,
        invocation: &Invocation,
        sink: &mut dyn SuggestionSink,
    ) -> Result<TacticOutcome, SearchError> {
        self.eval_tactic(cx, invocation, SearchMode::Exact, sink)
    }

    /// Tactic `apply?`: close the main goal, or list partial applications
    /// and leave the goal untouched.
    pub fn eval_apply(
        &self,
        cx: &mut SearchContext<'_>,
        invocation: &Invocation,
        sink: &mut dyn SuggestionSink,
    ) -> Result<TacticOutcome, SearchError> {
        self.eval_tactic(cx, invocation, SearchMode::Apply, sink)
    }

    /// Term `exact?%`: elaborate to a closing term of `expected_type` in
    /// `lctx`, or to a labelled `sorry` after logging an error.
    ///
    /// The elaboration state is left as it was found, apart from one
    /// reserved metavariable when a placeholder is returned.
    pub fn elab_exact_term(
        &self,
        cx: &mut SearchContext<'_>,
        invocation: &Invocation,
        expected_type: Option<&Expr>,
        lctx: &LocalContext,
        sink: &mut dyn SuggestionSink,
    ) -> Result<Expr, SearchError> {
        if invocation.mode != SearchMode::ExactTerm {
            return Err(SearchError::UnsupportedSyntax(format!(
                "{} used as a term",
                invocation.mode
            )));
        }
        let expected = expected_type.ok_or_else(|| {
            SearchError::UnsupportedSyntax("exact?% needs an expected type".to_string())
        })?;

        let mut reporter = Reporter::new(sink, invocation.range);
        self.transition(DriverState::Start, invocation.mode);
        let outer = cx.elab.save();
        let result = self.elab_term_core(cx, invocation, expected, lctx, &mut reporter);
        if let Err(e) = &result {
            cx.elab.restore(&outer);
            self.report_fatal(&mut reporter, invocation.mode, e);
            return result;
        }
        self.transition(DriverState::Reported, invocation.mode);
        result
    }

    fn elab_term_core(
        &self,
        cx: &mut SearchContext<'_>,
        invocation: &Invocation,
        expected: &Expr,
        lctx: &LocalContext,
        reporter: &mut Reporter<'_>,
    ) -> Result<Expr, SearchError> {
        let outer = cx.elab.save();
        let mvar = cx
            .elab
            .mk_fresh_mvar(expected.clone(), lctx.clone(), None, MVarKind::Natural)?;
        let reserved = cx.elab.save();
        let introduced = self.introduce(cx, invocation, mvar)?;
        let run = self.search(cx, introduced, invocation.mode, reporter)?;

        match run.closure {
            Some(trial) => {
                self.transition(DriverState::Closed, invocation.mode);
                cx.elab.restore(&trial.state);
                let term = cx.elab.head_beta(&cx.elab.instantiate_mvars(&Expr::MVar(mvar)));
                cx.elab.restore(&outer);
                Ok(reporter.term(cx, lctx, &term))
            }
            None => {
                let failure = run.failure();
                self.transition(DriverState::PartialOnly, invocation.mode);
                cx.elab.restore(&reserved);
                let message = match failure {
                    FailureKind::NoCandidates => "`exact?%` didn't find any relevant lemmas",
                    FailureKind::CouldNotClose => {
                        "`exact?%` could not close the goal. Try `by apply?` to see partial suggestions."
                    }
                };
                reporter.log(Severity::Error, message);
                Ok(Expr::sorry(
                    expected.clone(),
                    SorryLabel {
                        origin: invocation.mode.keyword().into(),
                        failure,
                        id: mvar.0,
                    },
                ))
            }
        }
    }

    fn eval_tactic(
        &self,
        cx: &mut SearchContext<'_>,
        invocation: &Invocation,
        mode: SearchMode,
        sink: &mut dyn SuggestionSink,
    ) -> Result<TacticOutcome, SearchError> {
        if invocation.mode != mode {
            return Err(SearchError::UnsupportedSyntax(format!(
                "{} used where {mode} was expected",
                invocation.mode
            )));
        }
        let mut reporter = Reporter::new(sink, invocation.range);
        self.transition(DriverState::Start, mode);
        let outer = cx.elab.save();
        let main = cx.elab.main_goal()?;

        match self.eval_tactic_core(cx, invocation, main, &outer, &mut reporter) {
            Ok(outcome) => {
                self.transition(DriverState::Reported, mode);
                Ok(outcome)
            }
            Err(e) => {
                cx.elab.restore(&outer);
                self.report_fatal(&mut reporter, mode, &e);
                Err(e)
            }
        }
    }

    fn eval_tactic_core(
        &self,
        cx: &mut SearchContext<'_>,
        invocation: &Invocation,
        main: MVarId,
        outer: &elab::Snapshot,
        reporter: &mut Reporter<'_>,
    ) -> Result<TacticOutcome, SearchError> {
        let mode = invocation.mode;
        let main_decl = cx.elab.decl(main)?;
        let dup = cx.elab.mk_fresh_mvar(
            main_decl.ty.clone(),
            main_decl.lctx.clone(),
            main_decl.user_name.clone(),
            MVarKind::Natural,
        )?;
        let introduced = self.introduce(cx, invocation, dup)?;
        let run = self.search(cx, introduced, mode, reporter)?;

        if let Some(trial) = run.closure {
            self.transition(DriverState::Closed, mode);
            cx.elab.restore(&trial.state);
            cx.elab.assign(main, Expr::MVar(dup))?;
            let term = cx.elab.head_beta(&cx.elab.instantiate_mvars(&Expr::MVar(main)));
            let goals = remove_goal(cx, main);
            tracing::info!(goal = %main, lemma = %trial.candidate.lemma(), "goal closed");
            reporter.exact(cx, &main_decl.lctx, &term);
            return Ok(TacticOutcome {
                decision: DriverState::Closed,
                goals,
                term: Some(term),
                partials: run.partials,
                admitted: false,
                failure: None,
                truncated: run.truncated,
            });
        }

        for trial in &run.partials {
            reporter.apply(cx, trial);
        }
        let failure = run.failure();
        cx.elab.restore(outer);

        match mode {
            SearchMode::Apply => {
                self.transition(DriverState::Exhausted, mode);
                if run.partials.is_empty() {
                    reporter.log(Severity::Error, "apply? didn't find any relevant lemmas");
                }
                Ok(TacticOutcome {
                    decision: DriverState::Exhausted,
                    goals: cx.elab.goals(),
                    term: None,
                    partials: run.partials,
                    admitted: false,
                    failure: Some(failure),
                    truncated: run.truncated,
                })
            }
            _ => {
                self.transition(DriverState::PartialOnly, mode);
                let message = match failure {
                    FailureKind::NoCandidates => "`exact?` didn't find any relevant lemmas",
                    FailureKind::CouldNotClose => {
                        "`exact?` could not close the goal. Try `apply?` to see partial suggestions."
                    }
                };
                reporter.log(Severity::Error, message);

                let admitted = self.config.admit_on_failure;
                if admitted {
                    let label = SorryLabel {
                        origin: mode.keyword().into(),
                        failure,
                        id: main.0,
                    };
                    cx.elab.assign(main, Expr::sorry(main_decl.ty.clone(), label))?;
                    tracing::warn!(goal = %main, failure = %failure, "goal admitted");
                }
                let goals = if admitted {
                    remove_goal(cx, main)
                } else {
                    cx.elab.goals()
                };
                Ok(TacticOutcome {
                    decision: DriverState::PartialOnly,
                    goals,
                    term: None,
                    partials: run.partials,
                    admitted,
                    failure: Some(failure),
                    truncated: run.truncated,
                })
            }
        }
    }

    /// Run `intros` on `goal` and fix the exclusion set in the introduced context.
    fn introduce(
        &self,
        cx: &mut SearchContext<'_>,
        invocation: &Invocation,
        goal: MVarId,
    ) -> Result<Introduced, SearchError> {
        let (fvars, goal) = cx.elab.intros(goal)?;
        let decl = cx.elab.decl(goal)?;
        let mut excluded = ExclusionSet::resolve(&invocation.excluded, &decl.lctx)?;
        if self.config.exclude_introduced {
            add_introduced(&mut excluded, &decl.lctx, &fvars);
        }
        self.transition(DriverState::Introduced, invocation.mode);
        tracing::debug!(
            goal = %goal,
            introduced = fvars.len(),
            excluded = excluded.len(),
            "goal introduced"
        );
        Ok(Introduced { goal, excluded })
    }

    fn search(
        &self,
        cx: &mut SearchContext<'_>,
        introduced: Introduced,
        mode: SearchMode,
        reporter: &mut Reporter<'_>,
    ) -> Result<SearchRun, SearchError> {
        self.transition(DriverState::Searching, mode);
        let mut enumerator = Enumerator::new(
            self.oracle,
            cx,
            introduced.goal,
            introduced.excluded,
            self.config.max_results,
            self.config.limit_order,
        )?
        .closures_past_cap(mode != SearchMode::Apply);
        let mut run = SearchRun {
            closure: None,
            partials: Vec::new(),
            truncated: false,
        };
        loop {
            match enumerator.next_trial(cx) {
                Ok(Some(trial)) if trial.closes_goal() => {
                    run.closure = Some(trial);
                    break;
                }
                Ok(Some(trial)) => run.partials.push(trial),
                Ok(None) => break,
                Err(SearchError::BudgetExceeded { used, limit }) if mode == SearchMode::Apply => {
                    reporter.log(
                        Severity::Warning,
                        format!(
                            "apply? stopped early: budget exhausted ({used}/{limit} heartbeats); results may be incomplete"
                        ),
                    );
                    run.truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(
            mode = %mode,
            pulled = enumerator.pulled(),
            partials = run.partials.len(),
            closed = run.closure.is_some(),
            heartbeats = cx.budget.used(),
            "search finished"
        );
        Ok(run)
    }

    fn report_fatal(&self, reporter: &mut Reporter<'_>, mode: SearchMode, e: &SearchError) {
        if let SearchError::BudgetExceeded { used, limit } = e {
            reporter.log(
                Severity::Error,
                format!(
                    "`{mode}` ran out of heartbeats ({used}/{limit}); raise max_heartbeats to search further"
                ),
            );
        } else {
            tracing::error!(mode = %mode, error = %e, "search failed");
        }
    }

    fn transition(&self, state: DriverState, mode: SearchMode) {
        tracing::debug!(mode = %mode, state = %state, "driver transition");
    }
}

fn add_introduced(excluded: &mut ExclusionSet, lctx: &LocalContext, fvars: &[FVarId]) {
    for fvar in fvars {
        if let Some(decl) = lctx.find(*fvar) {
            excluded.insert(*fvar, decl.user_name.clone());
        }
    }
}

fn remove_goal(cx: &mut SearchContext<'_>, goal: MVarId) -> Vec<MVarId> {
    let goals: Vec<MVarId> = cx.elab.goals().into_iter().filter(|g| *g != goal).collect();
    cx.elab.set_goals(goals.clone());
    goals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::SourceRange;
    use crate::mocks::{closure, partial, MockOracle, MockOutcome};
    use crate::report::MessageLog;
    use elab::{parse_term, MetaContext, SnapshotManager};

    fn goal_ctx(hyps: &[(&str, &str)], target: &str) -> (MetaContext, MVarId) {
        let mut ctx = MetaContext::new();
        let mut lctx = LocalContext::new();
        for (name, ty) in hyps {
            let ty = parse_term(ty, &lctx).unwrap();
            ctx.mk_local_decl(&mut lctx, name, ty);
        }
        let target = parse_term(target, &lctx).unwrap();
        let goal = ctx.add_goal(target, lctx, None);
        (ctx, goal)
    }

    fn inv(text: &str) -> Invocation {
        Invocation::parse(text, SourceRange::new(0, text.len())).unwrap()
    }

    #[test]
    fn test_exact_closes_with_local_hypothesis() {
        let (mut ctx, goal) = goal_ctx(&[("h", "P")], "P");
        let oracle = MockOracle::new(vec![closure("h", "h")]);
        let search = LibrarySearch::new(SearchConfig::default(), &oracle);
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let outcome = search.eval_exact(&mut cx, &inv("exact?"), &mut log).unwrap();
        assert_eq!(outcome.decision, DriverState::Closed);
        assert!(outcome.goals.is_empty());
        assert!(cx.elab.is_assigned(goal));
        assert_eq!(log.suggestions[0].text, "exact h");
        assert!(!log.has_errors());
    }

    #[test]
    fn test_closing_term_abstracts_introduced_hypotheses() {
        let (mut ctx, goal) = goal_ctx(&[], "P ∧ Q → Q ∧ P");
        let oracle = MockOracle::new(vec![closure(
            "And.intro",
            "And.intro (And.right a) (And.left a)",
        )]);
        let search = LibrarySearch::new(SearchConfig::default(), &oracle);
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let outcome = search.eval_exact(&mut cx, &inv("exact?"), &mut log).unwrap();
        assert_eq!(
            log.suggestions[0].text,
            "exact fun (a : P ∧ Q) => And.intro (And.right a) (And.left a)"
        );
        assert_eq!(
            outcome.term.as_ref().map(|t| cx.elab.instantiate_mvars(&Expr::MVar(goal)) == *t),
            Some(true)
        );
        assert!(log.messages(Severity::Warning).next().is_none());
    }

    #[test]
    fn test_mode_mismatch_is_unsupported() {
        let (mut ctx, _) = goal_ctx(&[], "P");
        let oracle = MockOracle::new(vec![]);
        let search = LibrarySearch::new(SearchConfig::default(), &oracle);
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let err = search.eval_apply(&mut cx, &inv("exact?"), &mut log).unwrap_err();
        assert!(matches!(err, SearchError::UnsupportedSyntax(_)));
        assert_eq!(oracle.pulls(), 0);
    }

    #[test]
    fn test_unknown_excluded_name_propagates_and_restores() {
        let (mut ctx, _) = goal_ctx(&[], "P");
        let before = ctx.save();
        let oracle = MockOracle::new(vec![]);
        let search = LibrarySearch::new(SearchConfig::default(), &oracle);
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let err = search
            .eval_exact(&mut cx, &inv("exact? without nope"), &mut log)
            .unwrap_err();
        assert!(matches!(err, SearchError::Elab(ElabError::UnknownIdentifier(_))));
        assert_eq!(cx.elab.save(), before);
    }

    #[test]
    fn test_no_goals() {
        let mut ctx = MetaContext::new();
        let oracle = MockOracle::new(vec![]);
        let search = LibrarySearch::new(SearchConfig::default(), &oracle);
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let err = search.eval_exact(&mut cx, &inv("exact?"), &mut log).unwrap_err();
        assert!(matches!(err, SearchError::Elab(ElabError::NoGoals)));
    }

    #[test]
    fn test_admit_disabled_leaves_goal_open() {
        let (mut ctx, goal) = goal_ctx(&[], "Q");
        let before = ctx.save();
        let oracle = MockOracle::new(vec![partial("f", &["P"])]);
        let config = SearchConfig {
            admit_on_failure: false,
            ..Default::default()
        };
        let search = LibrarySearch::new(config, &oracle);
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let outcome = search.eval_exact(&mut cx, &inv("exact?"), &mut log).unwrap();
        assert_eq!(outcome.failure, Some(FailureKind::CouldNotClose));
        assert!(!outcome.admitted);
        assert_eq!(outcome.goals, vec![goal]);
        assert_eq!(cx.elab.save(), before);
        assert!(log.has_errors());
        assert_eq!(log.suggestions[0].text, "apply f");
        assert_eq!(log.suggestions[0].post_info.as_deref(), Some("⊢ P"));
    }

    #[test]
    fn test_exclude_introduced() {
        let (mut ctx, _) = goal_ctx(&[], "P → P");
        let oracle = MockOracle::new(vec![closure("a", "a")]);
        let config = SearchConfig {
            exclude_introduced: true,
            ..Default::default()
        };
        let search = LibrarySearch::new(config, &oracle);
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let outcome = search.eval_exact(&mut cx, &inv("exact?"), &mut log).unwrap();
        assert_eq!(outcome.failure, Some(FailureKind::NoCandidates));
        assert!(outcome.admitted);
    }

    #[test]
    fn test_introduced_hypothesis_usable_by_default() {
        let (mut ctx, _) = goal_ctx(&[], "P → P");
        let oracle = MockOracle::new(vec![closure("a", "a")]);
        let search = LibrarySearch::new(SearchConfig::default(), &oracle);
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let outcome = search.eval_exact(&mut cx, &inv("exact?"), &mut log).unwrap();
        assert_eq!(outcome.decision, DriverState::Closed);
        assert!(!outcome.admitted);
        assert!(!log.has_errors());
    }

    #[test]
    fn test_oracle_error_propagates() {
        let (mut ctx, _) = goal_ctx(&[], "P");
        let before = ctx.save();
        let oracle = MockOracle::new(vec![MockOutcome::Error("index unavailable".to_string())]);
        let search = LibrarySearch::new(SearchConfig::default(), &oracle);
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let err = search.eval_apply(&mut cx, &inv("apply?"), &mut log).unwrap_err();
        assert!(matches!(err, SearchError::Oracle(_)));
        assert_eq!(cx.elab.save(), before);
    }

    #[test]
    fn test_term_mode_requires_expected_type() {
        let mut ctx = MetaContext::new();
        let oracle = MockOracle::new(vec![]);
        let search = LibrarySearch::new(SearchConfig::default(), &oracle);
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let err = search
            .elab_exact_term(&mut cx, &inv("exact?%"), None, &LocalContext::new(), &mut log)
            .unwrap_err();
        assert!(matches!(err, SearchError::UnsupportedSyntax(_)));
    }

    #[test]
    fn test_driver_state_display() {
        assert_eq!(DriverState::PartialOnly.to_string(), "partial_only");
    }
}

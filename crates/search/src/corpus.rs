//! In-memory lemma corpus oracle.
//!
//! Tries the goal's own hypotheses first (most recent first), then corpus
//! lemmas by descending priority. A source applies when its conclusion,
//! after instantiating its leading binders with fresh holes, unifies with
//! the goal's target. Holes left over become the subgoals of a partial
//! application; with assumption discharge enabled each of them is first
//! tried against the hypotheses.

use ordered_float::OrderedFloat;

use elab::{Expr, FVarId, LocalContext, MVarDecl, MVarId, MVarKind, Name};

use crate::engine::{SearchContext, SearchError};
use crate::enumerator::{Candidate, CandidateStream, LemmaOracle, LemmaRef};
use crate::filter::ExclusionSet;

/// A named statement of the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Lemma {
    pub name: Name,
    pub ty: Expr,
    /// Higher is tried first.
    pub priority: f64,
}

/// Oracle over a fixed list of lemmas.
#[derive(Debug, Clone, Default)]
pub struct CorpusOracle {
    lemmas: Vec<Lemma>,
    discharge_with_assumptions: bool,
}

impl CorpusOracle {
    /// Build the oracle; lemmas are ordered by descending priority, ties
    /// keeping their given order.
    pub fn new(mut lemmas: Vec<Lemma>) -> Self {
        lemmas.sort_by_key(|l| std::cmp::Reverse(OrderedFloat(l.priority)));
        Self {
            lemmas,
            discharge_with_assumptions: false,
        }
    }

    pub fn with_discharge(mut self, enabled: bool) -> Self {
        self.discharge_with_assumptions = enabled;
        self
    }

    pub fn lemmas(&self) -> &[Lemma] {
        &self.lemmas
    }
}

impl LemmaOracle for CorpusOracle {
    fn search<'a>(
        &'a self,
        goal: MVarId,
        excluded: &ExclusionSet,
        cap: usize,
    ) -> Box<dyn CandidateStream + 'a> {
        tracing::debug!(goal = %goal, lemmas = self.lemmas.len(), cap, "corpus search");
        Box::new(CorpusStream {
            oracle: self,
            goal,
            excluded: excluded.clone(),
            locals: None,
            next_local: 0,
            next_lemma: 0,
        })
    }
}

struct CorpusStream<'a> {
    oracle: &'a CorpusOracle,
    goal: MVarId,
    excluded: ExclusionSet,
    /// Usable hypotheses, most recent first; filled on the first pull.
    locals: Option<Vec<(FVarId, Name, Expr)>>,
    next_local: usize,
    next_lemma: usize,
}

impl CorpusStream<'_> {
    fn next_source(&mut self, lctx: &LocalContext) -> Option<(LemmaRef, Expr, Expr)> {
        let excluded = &self.excluded;
        let locals = self.locals.get_or_insert_with(|| {
            lctx.iter()
                .rev()
                .filter(|d| !excluded.contains(d.fvar))
                .map(|d| (d.fvar, d.user_name.clone(), d.ty.clone()))
                .collect()
        });
        if let Some((fvar, name, ty)) = locals.get(self.next_local) {
            self.next_local += 1;
            let lemma = LemmaRef::Local {
                fvar: *fvar,
                name: name.clone(),
            };
            return Some((lemma, Expr::FVar(*fvar), ty.clone()));
        }
        let lemma = self.oracle.lemmas.get(self.next_lemma)?;
        self.next_lemma += 1;
        Some((
            LemmaRef::Global(lemma.name.clone()),
            Expr::Const(lemma.name.clone()),
            lemma.ty.clone(),
        ))
    }

    /// Apply `head : ty` to fresh holes until its conclusion matches the target.
    fn try_source(
        &self,
        cx: &mut SearchContext<'_>,
        decl: &MVarDecl,
        target: &Expr,
        lemma: LemmaRef,
        head: Expr,
        ty: Expr,
    ) -> Result<Option<Candidate>, SearchError> {
        let mut args = Vec::new();
        let mut conclusion = cx.elab.instantiate_mvars(&ty);
        loop {
            cx.budget.tick(1);
            if cx.elab.is_def_eq(&conclusion, target)? {
                break;
            }
            let (binder, body) = match &conclusion {
                Expr::Pi(binder, body) => (binder.clone(), body.clone()),
                _ => return Ok(None),
            };
            let arg = cx.elab.mk_fresh_mvar(
                (*binder.ty).clone(),
                decl.lctx.clone(),
                Some(binder.name.clone()),
                MVarKind::Natural,
            )?;
            args.push(arg);
            conclusion = body.instantiate1(&Expr::MVar(arg));
        }

        if self.oracle.discharge_with_assumptions {
            for arg in &args {
                if !cx.elab.is_assigned(*arg) {
                    self.discharge(cx, decl, *arg)?;
                }
            }
        }

        let term = Expr::mk_app(head, args.iter().map(|a| Expr::MVar(*a)));
        let new_goals: Vec<MVarId> = args
            .into_iter()
            .filter(|a| !cx.elab.is_assigned(*a))
            .collect();
        let ty = cx.elab.instantiate_mvars(&conclusion);
        if new_goals.is_empty() {
            Ok(Some(Candidate::FullClosure { lemma, term, ty }))
        } else {
            Ok(Some(Candidate::PartialApplication {
                lemma,
                term,
                ty,
                new_goals,
            }))
        }
    }

    /// Close `hole` with the first matching, non-excluded hypothesis.
    fn discharge(
        &self,
        cx: &mut SearchContext<'_>,
        decl: &MVarDecl,
        hole: MVarId,
    ) -> Result<(), SearchError> {
        let hole_ty = cx.elab.instantiate_mvars(&cx.elab.decl(hole)?.ty);
        for local in decl.lctx.iter().rev() {
            if self.excluded.contains(local.fvar) {
                continue;
            }
            cx.budget.tick(1);
            if cx.elab.is_def_eq(&local.ty, &hole_ty)? {
                cx.elab.assign(hole, Expr::FVar(local.fvar))?;
                return Ok(());
            }
        }
        Ok(())
    }
}

impl CandidateStream for CorpusStream<'_> {
    fn next_candidate(
        &mut self,
        cx: &mut SearchContext<'_>,
    ) -> Result<Option<Candidate>, SearchError> {
        let decl = cx.elab.decl(self.goal)?;
        let target = cx.elab.instantiate_mvars(&decl.ty);
        while let Some((lemma, head, ty)) = self.next_source(&decl.lctx) {
            cx.budget.check()?;
            let before = cx.elab.save();
            if let Some(candidate) = self.try_source(cx, &decl, &target, lemma.clone(), head, ty)? {
                return Ok(Some(candidate));
            }
            cx.elab.restore(&before);
            tracing::trace!(lemma = %lemma, "source does not apply");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Budget;
    use elab::{parse_term, Elaborator, MetaContext};

    fn lemma(name: &str, ty: &str, priority: f64) -> Lemma {
        Lemma {
            name: Name::new(name),
            ty: parse_term(ty, &LocalContext::new()).unwrap(),
            priority,
        }
    }

    fn goal(hyps: &[(&str, &str)], target: &str) -> (MetaContext, MVarId) {
        let mut ctx = MetaContext::new();
        let mut lctx = LocalContext::new();
        for (name, ty) in hyps {
            let ty = parse_term(ty, &lctx).unwrap();
            ctx.mk_local_decl(&mut lctx, name, ty);
        }
        let target = parse_term(target, &lctx).unwrap();
        let g = ctx
            .mk_fresh_mvar(target, lctx, None, MVarKind::Natural)
            .unwrap();
        (ctx, g)
    }

    fn drain(oracle: &CorpusOracle, ctx: &mut MetaContext, g: MVarId, excluded: &ExclusionSet) -> Vec<Candidate> {
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: ctx,
            budget: &budget,
        };
        let mut stream = oracle.search(g, excluded, 10);
        let mut out = Vec::new();
        while let Some(c) = stream.next_candidate(&mut cx).unwrap() {
            out.push(c);
        }
        out
    }

    #[test]
    fn test_priority_order() {
        let oracle = CorpusOracle::new(vec![
            lemma("low", "P", 0.1),
            lemma("high", "P", 0.9),
            lemma("mid", "P", 0.5),
        ]);
        let names: Vec<_> = oracle.lemmas().iter().map(|l| l.name.to_string()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_locals_first_then_lemmas() {
        let (mut ctx, g) = goal(&[("h", "P")], "P");
        let oracle = CorpusOracle::new(vec![lemma("p_proof", "P", 1.0), lemma("q_proof", "Q", 2.0)]);
        let found = drain(&oracle, &mut ctx, g, &ExclusionSet::new());
        let names: Vec<_> = found.iter().map(|c| c.lemma().to_string()).collect();
        assert_eq!(names, vec!["h", "p_proof"]);
        assert!(found.iter().all(|c| matches!(c, Candidate::FullClosure { .. })));
    }

    #[test]
    fn test_implication_gives_partial() {
        let (mut ctx, g) = goal(&[], "Q");
        let oracle = CorpusOracle::new(vec![lemma("mp", "P → Q", 1.0)]);
        let found = drain(&oracle, &mut ctx, g, &ExclusionSet::new());
        match &found[..] {
            [Candidate::PartialApplication { new_goals, .. }] => assert_eq!(new_goals.len(), 1),
            other => panic!("expected one partial, got {other:?}"),
        }
    }

    #[test]
    fn test_dependent_arguments_unified() {
        // ∀ (a b : Prop), a → b → a ∧ b   against   P ∧ Q
        let (mut ctx, g) = goal(&[("hp", "P"), ("hq", "Q")], "P ∧ Q");
        let oracle = CorpusOracle::new(vec![lemma(
            "And.intro",
            "∀ (a b : Prop), a → b → a ∧ b",
            1.0,
        )])
        .with_discharge(true);
        let found = drain(&oracle, &mut ctx, g, &ExclusionSet::new());
        let closures: Vec<_> = found
            .iter()
            .filter(|c| matches!(c, Candidate::FullClosure { .. }))
            .collect();
        assert_eq!(closures.len(), 1);
        assert_eq!(closures[0].lemma().to_string(), "And.intro");
    }

    #[test]
    fn test_excluded_local_skipped() {
        let (mut ctx, g) = goal(&[("h", "P")], "P");
        let lctx = ctx.decl(g).unwrap().lctx;
        let excluded = ExclusionSet::resolve(&[Name::new("h")], &lctx).unwrap();
        let oracle = CorpusOracle::new(vec![]);
        assert!(drain(&oracle, &mut ctx, g, &excluded).is_empty());
    }

    #[test]
    fn test_budget_stops_large_corpus() {
        let (mut ctx, g) = goal(&[], "Goal");
        let lemmas = (0..1000).map(|i| lemma(&format!("l{i}"), "Other", 0.0)).collect();
        let oracle = CorpusOracle::new(lemmas);
        let budget = Budget::new(50);
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut stream = oracle.search(g, &ExclusionSet::new(), 10);
        let err = stream.next_candidate(&mut cx).unwrap_err();
        assert!(matches!(err, SearchError::BudgetExceeded { .. }));
    }
}

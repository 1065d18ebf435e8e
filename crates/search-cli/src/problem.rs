//! Problem files: one goal, its hypotheses, a lemma corpus and the
//! invocation to run against them.
//!
//! ```toml
//! invocation = "exact? without h"
//! goal = "P ∧ Q → Q ∧ P"
//! discharge_with_assumptions = true
//!
//! [[hypotheses]]
//! name = "h"
//! type = "P"
//!
//! [[lemmas]]
//! name = "And.symm"
//! type = "∀ (a b : Prop), a ∧ b → b ∧ a"
//! priority = 1.0
//! ```

use std::path::Path;

use anyhow::Context;
use elab::{parse_term, Expr, LocalContext, MVarId, MetaContext, Name};
use search::{CorpusOracle, Invocation, Lemma, SourceRange};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct HypothesisEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LemmaEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub priority: f64,
}

/// Raw problem file contents, before any term is parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct ProblemFile {
    /// Invocation text, e.g. `apply?` or `exact? without h`.
    pub invocation: String,
    /// Goal statement, parsed in the scope of `hypotheses`.
    pub goal: String,
    #[serde(default)]
    pub hypotheses: Vec<HypothesisEntry>,
    #[serde(default)]
    pub lemmas: Vec<LemmaEntry>,
    /// Let the corpus oracle close leftover holes with hypotheses.
    #[serde(default)]
    pub discharge_with_assumptions: bool,
}

/// A problem ready to search: elaboration state, goal, corpus oracle.
pub struct Problem {
    pub ctx: MetaContext,
    pub lctx: LocalContext,
    pub target: Expr,
    /// Main goal on the goal stack; unused by term-mode invocations.
    pub goal: Option<MVarId>,
    pub invocation: Invocation,
    pub oracle: CorpusOracle,
}

/// Read and deserialize a problem file.
pub fn load_problem(path: &Path) -> anyhow::Result<ProblemFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read problem file {}", path.display()))?;
    let problem: ProblemFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse problem file {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        hypotheses = problem.hypotheses.len(),
        lemmas = problem.lemmas.len(),
        "Loaded problem"
    );
    Ok(problem)
}

impl ProblemFile {
    /// Parse every term and set up the elaboration state.
    ///
    /// Tactic invocations get the goal pushed on the goal stack; `exact?%`
    /// only gets the target as its expected type.
    pub fn build(&self) -> anyhow::Result<Problem> {
        let range = SourceRange::new(0, self.invocation.len());
        let invocation = Invocation::parse(&self.invocation, range)?;

        let mut ctx = MetaContext::new();
        let mut lctx = LocalContext::new();
        for hyp in &self.hypotheses {
            let ty = parse_term(&hyp.ty, &lctx)
                .with_context(|| format!("hypothesis `{}`", hyp.name))?;
            ctx.mk_local_decl(&mut lctx, &hyp.name, ty);
        }
        let target = parse_term(&self.goal, &lctx).context("goal")?;

        let mut lemmas = Vec::with_capacity(self.lemmas.len());
        for entry in &self.lemmas {
            let ty = parse_term(&entry.ty, &LocalContext::new())
                .with_context(|| format!("lemma `{}`", entry.name))?;
            lemmas.push(Lemma {
                name: Name::new(&entry.name),
                ty,
                priority: entry.priority,
            });
        }
        let oracle = CorpusOracle::new(lemmas).with_discharge(self.discharge_with_assumptions);

        let goal = if invocation.mode.is_tactic() {
            Some(ctx.add_goal(target.clone(), lctx.clone(), None))
        } else {
            None
        };

        Ok(Problem {
            ctx,
            lctx,
            target,
            goal,
            invocation,
            oracle,
        })
    }
}

/// Run one library search problem and print what it reported.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::bail;
use elab::{pp_expr, Expr, FailureKind, LocalContext};
use search::{
    Budget, DriverState, LibrarySearch, MessageLog, SearchContext, SearchError, SearchMode,
    Severity,
};
use serde::Serialize;

use crate::config::{load_search_toml, resolve_search_config, SearchOverrides};
use crate::problem::load_problem;

/// Arguments for the `run` subcommand.
#[derive(Debug)]
pub struct RunArgs {
    /// Path to the search config TOML file; defaults when absent.
    pub config: Option<PathBuf>,
    /// Path to the problem TOML file.
    pub problem: PathBuf,
    pub overrides: SearchOverrides,
    /// Print a JSON report instead of text.
    pub json: bool,
}

/// Arguments for the `check-config` subcommand.
#[derive(Debug)]
pub struct CheckConfigArgs {
    pub config: PathBuf,
}

/// Everything one run produced, in the shape printed by `--json`.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub invocation: String,
    pub mode: SearchMode,
    /// Driver decision; absent for `exact?%` and for aborted runs.
    pub decision: Option<DriverState>,
    /// Closing term, or the placeholder for a failed `exact?%`.
    pub term: Option<String>,
    pub goals_remaining: usize,
    pub partials: usize,
    pub admitted: bool,
    pub failure: Option<FailureKind>,
    pub truncated: bool,
    pub heartbeats: u64,
    /// Set when the search aborted instead of reporting.
    pub error: Option<String>,
    #[serde(flatten)]
    pub log: MessageLog,
}

impl RunReport {
    fn new(invocation: &str, mode: SearchMode) -> Self {
        Self {
            invocation: invocation.to_string(),
            mode,
            decision: None,
            term: None,
            goals_remaining: 0,
            partials: 0,
            admitted: false,
            failure: None,
            truncated: false,
            heartbeats: 0,
            error: None,
            log: MessageLog::new(),
        }
    }
}

fn render(cx: &SearchContext<'_>, lctx: &LocalContext, term: &Expr) -> String {
    pp_expr(&cx.elab.instantiate_mvars(term), lctx)
}

/// Execute the problem at `args.problem` and return the report, without printing.
pub fn execute(args: &RunArgs) -> anyhow::Result<RunReport> {
    // 1. Load config
    let config = resolve_search_config(args.config.as_deref(), &args.overrides)?;

    // 2. Load problem and build the elaboration state
    let file = load_problem(&args.problem)?;
    let mut problem = file.build()?;
    let mode = problem.invocation.mode;
    tracing::info!(
        invocation = %file.invocation,
        goal = ?problem.goal,
        lemmas = problem.oracle.lemmas().len(),
        max_results = config.max_results,
        max_heartbeats = config.max_heartbeats,
        "Starting library search"
    );

    // 3. Search
    let budget = Budget::new(config.max_heartbeats);
    let driver = LibrarySearch::new(config, &problem.oracle);
    let mut report = RunReport::new(&file.invocation, mode);
    let mut cx = SearchContext {
        elab: &mut problem.ctx,
        budget: &budget,
    };

    let result: Result<(), SearchError> = match mode {
        SearchMode::ExactTerm => driver
            .elab_exact_term(
                &mut cx,
                &problem.invocation,
                Some(&problem.target),
                &problem.lctx,
                &mut report.log,
            )
            .map(|term| {
                report.admitted = matches!(term, Expr::Sorry { .. });
                report.term = Some(render(&cx, &problem.lctx, &term));
            }),
        SearchMode::Exact | SearchMode::Apply => {
            let outcome = if mode == SearchMode::Exact {
                driver.eval_exact(&mut cx, &problem.invocation, &mut report.log)
            } else {
                driver.eval_apply(&mut cx, &problem.invocation, &mut report.log)
            };
            outcome.map(|outcome| {
                report.decision = Some(outcome.decision);
                report.term = outcome
                    .term
                    .as_ref()
                    .map(|t| render(&cx, &problem.lctx, t));
                report.goals_remaining = outcome.goals.len();
                report.partials = outcome.partials.len();
                report.admitted = outcome.admitted;
                report.failure = outcome.failure;
                report.truncated = outcome.truncated;
            })
        }
    };
    report.heartbeats = budget.used();
    if let Err(e) = result {
        tracing::warn!(error = %e, "library search aborted");
        report.error = Some(e.to_string());
    }
    Ok(report)
}

fn print_text(report: &RunReport) {
    for entry in &report.log.entries {
        let severity = match entry.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        println!("{severity}: {}", entry.message);
    }

    println!("\n--- {} ---", report.invocation);
    if let Some(decision) = report.decision {
        println!("Decision: {decision}");
    }
    if let Some(term) = &report.term {
        println!("Term: {term}");
    }
    if report.mode.is_tactic() {
        println!("Goals remaining: {}", report.goals_remaining);
        println!("Partial suggestions: {}", report.partials);
    }
    if report.admitted {
        println!("Admitted: yes");
    }
    if report.truncated {
        println!("Truncated: yes");
    }
    println!("Heartbeats: {}", report.heartbeats);
    if let Some(error) = &report.error {
        println!("Aborted: {error}");
    }
}

/// Run one problem, print the report, and fail if the search logged errors.
pub fn run_search(args: RunArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let report = execute(&args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
        println!("Elapsed: {:.3}s", start.elapsed().as_secs_f64());
    }

    if let Some(error) = &report.error {
        bail!("`{}` aborted: {error}", report.mode);
    }
    if report.log.has_errors() {
        bail!("`{}` reported errors", report.mode);
    }
    Ok(())
}

/// Load a config file, run its validation and print the effective values.
pub fn run_check_config(args: CheckConfigArgs) -> anyhow::Result<()> {
    let parsed = load_search_toml(&args.config)?;
    parsed.search.validate();
    println!("--- {} ---", args.config.display());
    print!("{}", toml::to_string_pretty(&parsed.search)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_problem(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("problem.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn args(problem: PathBuf) -> RunArgs {
        RunArgs {
            config: None,
            problem,
            overrides: SearchOverrides::default(),
            json: false,
        }
    }

    #[test]
    fn test_exact_closes_with_hypothesis() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_problem(
            &dir,
            r#"
invocation = "exact?"
goal = "P"

[[hypotheses]]
name = "h"
type = "P"
"#,
        );
        let report = execute(&args(path)).unwrap();
        assert_eq!(report.decision, Some(DriverState::Closed));
        assert_eq!(report.term.as_deref(), Some("h"));
        assert_eq!(report.goals_remaining, 0);
        assert!(!report.log.has_errors());
        assert_eq!(report.log.suggestions[0].text, "exact h");
    }

    #[test]
    fn test_apply_reports_partials() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_problem(
            &dir,
            r#"
invocation = "apply?"
goal = "Q"

[[lemmas]]
name = "mp"
type = "P → Q"
"#,
        );
        let report = execute(&args(path)).unwrap();
        assert_eq!(report.decision, Some(DriverState::Exhausted));
        assert_eq!(report.partials, 1);
        assert_eq!(report.goals_remaining, 1);
        assert!(!report.admitted);
    }

    #[test]
    fn test_exact_failure_admits_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_problem(
            &dir,
            r#"
invocation = "exact?"
goal = "Q"
"#,
        );
        let report = execute(&args(path.clone())).unwrap();
        assert!(report.admitted);
        assert_eq!(report.failure, Some(FailureKind::NoCandidates));
        assert!(report.log.has_errors());
        assert!(run_search(args(path)).is_err());
    }

    #[test]
    fn test_no_admit_override_leaves_goal_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_problem(
            &dir,
            r#"
invocation = "exact?"
goal = "Q"
"#,
        );
        let mut run = args(path);
        run.overrides.no_admit = true;
        let report = execute(&run).unwrap();
        assert!(!report.admitted);
        assert_eq!(report.goals_remaining, 1);
    }

    #[test]
    fn test_term_mode_returns_term() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_problem(
            &dir,
            r#"
invocation = "exact?%"
goal = "P"

[[hypotheses]]
name = "hp"
type = "P"
"#,
        );
        let report = execute(&args(path)).unwrap();
        assert_eq!(report.term.as_deref(), Some("hp"));
        assert!(report.decision.is_none());
        assert!(!report.admitted);
    }

    #[test]
    fn test_json_report_shape() {
        let mut report = RunReport::new("apply?", SearchMode::Apply);
        report.decision = Some(DriverState::Exhausted);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "apply");
        assert_eq!(json["decision"], "exhausted");
        assert!(json["suggestions"].as_array().unwrap().is_empty());
        assert!(json["entries"].as_array().unwrap().is_empty());
    }
}

//! Suggestions and log entries produced by a search, and the reporter that
//! renders them.

use elab::{parse_term, pp_expr, pp_goal, Expr, LocalContext};
use serde::Serialize;

use crate::engine::SearchContext;
use crate::enumerator::Trial;
use crate::invocation::SourceRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub range: SourceRange,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    /// `exact t` replacing a tactic.
    Exact,
    /// `apply f` replacing a tactic, leaving subgoals.
    Apply,
    /// A bare term replacing a term.
    Term,
}

/// Replacement text for the invocation at `range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub range: SourceRange,
    pub kind: SuggestionKind,
    pub text: String,
    /// Goals left open by an `apply` suggestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_info: Option<String>,
}

/// Receiver of search output.
pub trait SuggestionSink {
    fn add_suggestion(&mut self, suggestion: Suggestion);
    fn log(&mut self, entry: LogEntry);
}

/// Collects everything in memory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageLog {
    pub suggestions: Vec<Suggestion>,
    pub entries: Vec<LogEntry>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Error)
    }

    pub fn messages(&self, severity: Severity) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |e| e.severity == severity)
            .map(|e| e.message.as_str())
    }
}

impl SuggestionSink for MessageLog {
    fn add_suggestion(&mut self, suggestion: Suggestion) {
        self.suggestions.push(suggestion);
    }

    fn log(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }
}

/// Renders search results for one invocation into a [`SuggestionSink`].
pub struct Reporter<'s> {
    sink: &'s mut dyn SuggestionSink,
    range: SourceRange,
}

impl<'s> Reporter<'s> {
    pub fn new(sink: &'s mut dyn SuggestionSink, range: SourceRange) -> Self {
        Self { sink, range }
    }

    pub fn log(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => tracing::info!(text = %message, "search log"),
            Severity::Warning => tracing::warn!(text = %message, "search log"),
            Severity::Error => tracing::error!(text = %message, "search log"),
        }
        self.sink.log(LogEntry {
            severity,
            range: self.range,
            message,
        });
    }

    fn suggest(&mut self, kind: SuggestionKind, text: String, post_info: Option<String>) {
        let mut message = format!("Try this: {text}");
        if let Some(info) = &post_info {
            message.push_str("\n-- Remaining subgoals:");
            for line in info.lines() {
                message.push_str("\n-- ");
                message.push_str(line);
            }
        }
        self.log(Severity::Info, message);
        self.sink.add_suggestion(Suggestion {
            range: self.range,
            kind,
            text,
            post_info,
        });
    }

    /// Suggest `exact term` for a closed goal.
    pub fn exact(&mut self, cx: &mut SearchContext<'_>, lctx: &LocalContext, term: &Expr) {
        let rendered = pp_expr(term, lctx);
        self.re_elaborate(cx, lctx, &rendered, term);
        self.suggest(SuggestionKind::Exact, format!("exact {rendered}"), None);
    }

    /// Suggest `term` itself and return what the suggestion elaborates to,
    /// falling back to `term` when the text does not round-trip.
    pub fn term(&mut self, cx: &mut SearchContext<'_>, lctx: &LocalContext, term: &Expr) -> Expr {
        let rendered = pp_expr(term, lctx);
        let elaborated = self.re_elaborate(cx, lctx, &rendered, term);
        self.suggest(SuggestionKind::Term, rendered, None);
        elaborated.unwrap_or_else(|| term.clone())
    }

    /// Suggest `apply lemma` for a partial trial, listing the goals it leaves.
    pub fn apply(&mut self, cx: &mut SearchContext<'_>, trial: &Trial) {
        let current = cx.elab.save();
        cx.elab.restore(&trial.state);
        let goals: Vec<String> = trial
            .remaining
            .iter()
            .filter_map(|g| cx.elab.decl(*g).ok())
            .map(|decl| pp_goal(&decl.lctx, &cx.elab.instantiate_mvars(&decl.ty)))
            .collect();
        cx.elab.restore(&current);

        let post_info = (!goals.is_empty()).then(|| goals.join("\n\n"));
        self.suggest(
            SuggestionKind::Apply,
            format!("apply {}", trial.candidate.lemma()),
            post_info,
        );
    }

    /// Parse `text` back in `lctx` and check it denotes `found`. The check
    /// runs against a throwaway snapshot.
    fn re_elaborate(
        &mut self,
        cx: &mut SearchContext<'_>,
        lctx: &LocalContext,
        text: &str,
        found: &Expr,
    ) -> Option<Expr> {
        let parsed = match parse_term(text, lctx) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.log(
                    Severity::Warning,
                    format!("suggestion `{text}` does not parse back ({e}); it may not round-trip"),
                );
                return None;
            }
        };
        let saved = cx.elab.save();
        let same = cx.elab.is_def_eq(&parsed, found);
        cx.elab.restore(&saved);
        match same {
            Ok(true) => Some(cx.elab.instantiate_mvars(&parsed)),
            Ok(false) => {
                self.log(
                    Severity::Warning,
                    format!("suggestion `{text}` elaborates to a different term; it may not round-trip"),
                );
                None
            }
            Err(e) => {
                self.log(
                    Severity::Warning,
                    format!("suggestion `{text}` could not be re-elaborated ({e})"),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Budget;
    use elab::MetaContext;

    fn c(name: &str) -> Expr {
        Expr::constant(name)
    }

    #[test]
    fn test_exact_suggestion_and_info_entry() {
        let mut ctx = MetaContext::new();
        let mut lctx = LocalContext::new();
        let h = ctx.mk_local_decl(&mut lctx, "h", Expr::mk_app(c("And"), [c("P"), c("Q")]));
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        let term = Expr::mk_app(
            c("And.intro"),
            [Expr::app(c("And.right"), Expr::FVar(h)), Expr::app(c("And.left"), Expr::FVar(h))],
        );
        Reporter::new(&mut log, SourceRange::new(0, 6)).exact(&mut cx, &lctx, &term);

        assert_eq!(log.suggestions.len(), 1);
        assert_eq!(log.suggestions[0].text, "exact And.intro (And.right h) (And.left h)");
        assert_eq!(log.suggestions[0].range, SourceRange::new(0, 6));
        let infos: Vec<_> = log.messages(Severity::Info).collect();
        assert_eq!(infos, vec!["Try this: exact And.intro (And.right h) (And.left h)"]);
        assert!(log.messages(Severity::Warning).next().is_none());
    }

    #[test]
    fn test_shadowed_hypothesis_warns() {
        let mut ctx = MetaContext::new();
        let mut lctx = LocalContext::new();
        let first = ctx.mk_local_decl(&mut lctx, "h", c("P"));
        ctx.mk_local_decl(&mut lctx, "h", c("Q"));
        let budget = Budget::unlimited();
        let mut cx = SearchContext {
            elab: &mut ctx,
            budget: &budget,
        };
        let mut log = MessageLog::new();
        // `h` now names the second hypothesis, so the text does not round-trip.
        let out = Reporter::new(&mut log, SourceRange::default()).term(&mut cx, &lctx, &Expr::FVar(first));
        assert_eq!(out, Expr::FVar(first));
        assert_eq!(log.suggestions[0].text, "h");
        assert_eq!(log.messages(Severity::Warning).count(), 1);
        assert!(!log.has_errors());
    }

    #[test]
    fn test_message_log_serializes() {
        let mut log = MessageLog::new();
        log.log(LogEntry {
            severity: Severity::Error,
            range: SourceRange::new(1, 2),
            message: "boom".to_string(),
        });
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["entries"][0]["severity"], "error");
        assert_eq!(json["entries"][0]["range"]["start"], 1);
        assert!(log.has_errors());
    }
}

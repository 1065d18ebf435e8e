//! Parsed `exact?` / `apply?` / `exact?%` invocations.

use std::fmt;

use elab::Name;

use crate::engine::SearchError;

/// Byte range of the invocation in the source it came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

impl SourceRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Tactic `exact?`: close the goal or admit it.
    Exact,
    /// Tactic `apply?`: close the goal or list partial applications.
    Apply,
    /// Term `exact?%`: elaborate to a closing term or a placeholder.
    ExactTerm,
}

impl SearchMode {
    pub fn keyword(self) -> &'static str {
        match self {
            SearchMode::Exact => "exact?",
            SearchMode::Apply => "apply?",
            SearchMode::ExactTerm => "exact?%",
        }
    }

    /// Runs against the goal stack rather than an expected type.
    pub fn is_tactic(self) -> bool {
        !matches!(self, SearchMode::ExactTerm)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One invocation: mode, hypotheses to leave out, and where it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub mode: SearchMode,
    /// Hypotheses the closing term may not use (`without h₁, h₂`).
    pub excluded: Vec<Name>,
    pub range: SourceRange,
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '\''))
}

impl Invocation {
    pub fn new(mode: SearchMode, range: SourceRange) -> Self {
        Self {
            mode,
            excluded: Vec::new(),
            range,
        }
    }

    /// Parse `exact?`, `apply?` or `exact?%`, optionally followed by
    /// `without h₁, h₂, …`.
    pub fn parse(text: &str, range: SourceRange) -> Result<Self, SearchError> {
        let unsupported = || SearchError::UnsupportedSyntax(text.trim().to_string());
        let text = text.trim();
        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (text, ""),
        };
        let mode = match head {
            "exact?" => SearchMode::Exact,
            "apply?" => SearchMode::Apply,
            "exact?%" => SearchMode::ExactTerm,
            _ => return Err(unsupported()),
        };
        let mut invocation = Self::new(mode, range);
        if rest.is_empty() {
            return Ok(invocation);
        }
        let names = rest.strip_prefix("without").ok_or_else(unsupported)?;
        if !names.starts_with(char::is_whitespace) {
            return Err(unsupported());
        }
        for name in names.split(',').map(str::trim) {
            if !is_ident(name) {
                return Err(unsupported());
            }
            invocation.excluded.push(Name::new(name));
        }
        Ok(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        let range = SourceRange::new(4, 10);
        assert_eq!(
            Invocation::parse("exact?", range).unwrap(),
            Invocation::new(SearchMode::Exact, range)
        );
        assert_eq!(Invocation::parse(" apply? ", range).unwrap().mode, SearchMode::Apply);
        assert_eq!(Invocation::parse("exact?%", range).unwrap().mode, SearchMode::ExactTerm);
    }

    #[test]
    fn test_parse_without_list() {
        let inv = Invocation::parse("exact? without h, h'.1", SourceRange::default()).unwrap();
        let names: Vec<_> = inv.excluded.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["h", "h'.1"]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in [
            "exact",
            "simp",
            "exact? using h",
            "exact? without",
            "exact? withouth",
            "exact? without h,",
            "apply? without (h)",
            "",
        ] {
            match Invocation::parse(text, SourceRange::default()) {
                Err(SearchError::UnsupportedSyntax(_)) => {}
                other => panic!("{text:?}: expected UnsupportedSyntax, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(SearchMode::ExactTerm.to_string(), "exact?%");
    }
}

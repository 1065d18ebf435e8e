//! Library search: `exact?`, `apply?` and `exact?%`.
//!
//! Given an open goal, asks a lemma oracle for candidate terms, validates
//! each one inside a snapshot bracket, and reports either a closing
//! `exact` suggestion, a list of partial `apply` suggestions, or a logged
//! failure (admitting the goal in `exact?` mode). Uses trait-based
//! abstraction so the driver can be tested with mocks (no corpus).
//!
//! # Key types
//!
//! - [`LibrarySearch`]: the driver state machine and its three entry points
//! - [`SearchConfig`]: configuration loaded from TOML
//! - [`LemmaOracle`] / [`CandidateStream`]: the oracle boundary
//! - [`Enumerator`] / [`Trial`]: validated, snapshot-bracketed enumeration
//! - [`SuggestionSink`] / [`MessageLog`]: where suggestions and log entries go
//! - [`CorpusOracle`]: reference oracle over an in-memory lemma list

pub mod budget;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod enumerator;
pub mod filter;
pub mod invocation;
pub mod mocks;
pub mod report;

pub use budget::Budget;
pub use config::{LimitOrder, SearchConfig};
pub use corpus::{CorpusOracle, Lemma};
pub use engine::{DriverState, LibrarySearch, SearchContext, SearchError, TacticOutcome};
pub use enumerator::{Candidate, CandidateStream, Enumerator, LemmaOracle, LemmaRef, Trial};
pub use filter::{occurs_check, ExclusionSet};
pub use invocation::{Invocation, SearchMode, SourceRange};
pub use report::{LogEntry, MessageLog, Reporter, Severity, Suggestion, SuggestionKind, SuggestionSink};

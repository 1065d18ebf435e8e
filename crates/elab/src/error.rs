use crate::expr::{FVarId, MVarId, Name};

/// Errors raised by the elaboration engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElabError {
    /// The metavariable has no declaration in the current state.
    #[error("unknown metavariable {0}")]
    UnknownMVar(MVarId),

    /// A term mentions a free variable outside the goal's local context.
    #[error("unknown free variable {0}")]
    UnknownFVar(FVarId),

    /// Goals are assigned at most once.
    #[error("metavariable {0} is already assigned")]
    AlreadyAssigned(MVarId),

    #[error("no goals to be proved")]
    NoGoals,

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(Name),

    /// Surface syntax could not be parsed.
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },
}

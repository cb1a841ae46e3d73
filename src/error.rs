//! Error kinds and the public error type.
//!
//! The interpreter records failures in a sticky *slot* rather than returning
//! them: once set, the slot suppresses further parsing and evaluation until
//! it is read (which clears it) or the `try` built-in catches it.  The public
//! [`InterpError`] is what [`Interp::run`](crate::Interp::run) surfaces when
//! the slot is set after an evaluation.

use thiserror::Error;

/// Internal classification of a recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// A normal error with a meaningful source position.
    Default,
    /// Position not yet known; the command dispatcher patches it to the
    /// dispatch site so errors raised inside a built-in point at the call.
    FixHead,
    /// Unclosed `{ }`, `[ ]` or quote.
    Unbalanced,
}

/// The sticky error slot carried by the interpreter.
///
/// `message` outlives a cleared `kind` on purpose: `reflect error` can still
/// report the last message after the host has read (and thereby cleared) the
/// error.
#[derive(Debug, Default)]
pub(crate) struct ErrorSlot {
    pub kind: Option<ErrorKind>,
    pub pos: usize,
    pub message: Option<String>,
}

impl ErrorSlot {
    pub fn is_set(&self) -> bool {
        self.kind.is_some()
    }
}

/// An error surfaced to the host after an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at byte {position})")]
pub struct InterpError {
    /// Human-readable message, e.g. `unknown function foo`.
    pub message: String,
    /// Byte offset into the source that was being parsed when the error was
    /// recorded.
    pub position: usize,
}

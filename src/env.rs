//! Lexical environments and variables.
//!
//! Environments form a chain rooted at the interpreter's root environment.
//! Lookup is deliberately two-level: a name is searched in the *current*
//! environment only and then directly in the root — intermediate parents are
//! skipped.  Local scopes are flat; only the root globals shine through.
//!
//! Environments live in the interpreter's arena ([`crate::Interp`] owns a
//! `Vec<Env>` with strict LIFO creation/destruction) and are addressed by
//! [`EnvId`]; a variable is addressed by an `(EnvId, slot)` pair, which also
//! serves as the back-pointer from a variable to its owning environment.

use crate::strmap::StrMap;
use crate::value::Value;

/// Index of an environment in the interpreter's arena.  The root environment
/// is always id 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvId(pub(crate) usize);

/// Strategy for creating or overwriting variables on assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Always target the root environment.
    Global,
    /// Overwrite a variable found in the lookup chain, otherwise create in
    /// the current environment.
    Local,
    /// Always create in the current environment, shadowing any match.
    LocalNew,
    /// Overwrite an existing non-root match or create locally; never write
    /// through to the root.
    LocalOnly,
}

/// A named, value-holding slot belonging to one environment.
#[derive(Debug)]
pub(crate) struct Var {
    pub name: String,
    /// Source fragment evaluated in the owning environment whenever the
    /// variable is overwritten.
    pub watch: Option<String>,
    pub value: Value,
}

/// One lexical scope.
pub(crate) struct Env {
    pub parent: Option<EnvId>,
    /// Registry index of the function this frame was pushed for, if any.
    pub func: Option<usize>,
    /// The word that triggered an unknown-command interception, for frames
    /// pushed by the catcher.
    pub catcher_for: Option<Value>,
    pub vars: Vec<Var>,
    pub varmap: StrMap,
    pub retval: Option<Value>,
    pub retval_set: bool,
    /// Stop evaluating further commands in the current body and unwind to
    /// the nearest function frame, which clears the flag when it consumes
    /// the return value.
    pub breakrun: bool,
}

impl Env {
    pub fn new(parent: Option<EnvId>) -> Self {
        Env {
            parent,
            func: None,
            catcher_for: None,
            vars: Vec::new(),
            varmap: StrMap::new(),
            retval: None,
            retval_set: false,
            breakrun: false,
        }
    }

    /// Slot of a variable local to this environment.
    pub fn local_slot(&self, name: &str) -> Option<usize> {
        self.varmap.get(name)
    }
}

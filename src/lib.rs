//! A small embeddable command interpreter for a Tcl-like scripting
//! language.
//!
//! Source text is parsed into lines of words; the first word of each line
//! is looked up in the command registry and invoked with the remaining
//! words as arguments.  The language has nested lexical environments with
//! two-level variable lookup, dynamic command definition, quoting and
//! substitution, a separate infix expression sublanguage, unwind-style
//! control flow (`return`, `error`, `try`), variable watches, and a
//! catch-all "catcher" for unknown commands.
//!
//! # Quick start
//!
//! ```rust
//! let mut interp = lilt::Interp::new();
//! let v = interp.run("set x 6; expr $x * 7").unwrap();
//! assert_eq!(v.to_string(), "42");
//! ```
//!
//! Hosts extend the language by registering commands:
//!
//! ```rust
//! use lilt::{Interp, Value};
//!
//! fn shout(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
//!     let text = args.first()?.to_string().to_uppercase();
//!     Some(Value::from(text))
//! }
//!
//! let mut interp = Interp::new();
//! interp.register("shout", shout);
//! assert_eq!(interp.run("shout hello").unwrap().to_string(), "HELLO");
//! ```

mod builtins;
mod env;
mod error;
mod expr;
mod interp;
mod parser;
mod strmap;
mod value;

// Re-exports for convenience.
pub use env::{EnvId, SetMode};
pub use error::InterpError;
pub use interp::{Host, HostProc, Interp};
pub use value::{List, Value};

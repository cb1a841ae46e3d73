//! The interpreter.
//!
//! [`Interp`] owns everything: the environment arena, the command registry,
//! the parse cursor, the sticky error slot, and the host hooks.  Evaluation
//! is a loop of "extract one line of words, resolve the first word in the
//! registry, run it" — see [`Interp::parse`].  Control flow (`return`,
//! `result`, `break`-style unwinding) travels through per-frame flags, not
//! through the error slot.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::env::{Env, EnvId, SetMode, Var};
use crate::error::{ErrorKind, ErrorSlot, InterpError};
use crate::strmap::StrMap;
use crate::value::{List, Value};

pub(crate) const ROOT: EnvId = EnvId(0);
const MAX_CATCHER_DEPTH: usize = 16384;

// ── Host hooks ────────────────────────────────────────────────────────────────

/// A host-provided command procedure.
///
/// Receives the arguments of the command line (the command word itself is
/// not included).  Returning `None` yields the empty value; failures are
/// reported through the interpreter's error slot (by default in fix-head
/// state, so the recorded position points at the dispatch site).
pub type HostProc = fn(&mut Interp, &[Value]) -> Option<Value>;

/// Host integration points polled by the interpreter core.
///
/// All methods have no-op defaults.  `env_set`/`env_get` mirror rooted
/// globals into a persistent store: every assignment that resolves to the
/// root environment is forwarded to `env_set` (returning `false` cancels
/// the assignment), and every rooted read consults `env_get` first — the
/// store's value wins when present.
pub trait Host {
    fn env_set(&mut self, _name: &str, _value: &Value) -> bool {
        true
    }

    fn env_get(&mut self, _name: &str) -> Option<Value> {
        None
    }

    /// Polled between commands and before expressions; returning `true`
    /// stops the current evaluation with an "interrupted" error.
    fn interrupted(&mut self) -> bool {
        false
    }
}

/// The default host: no store, never interrupted.
struct DefaultHost;

impl Host for DefaultHost {}

// ── Command registry ──────────────────────────────────────────────────────────

/// A named callable: either a host procedure or a script-defined body with
/// declared argument names.  At most one of `proc`/`code` is populated.
pub(crate) struct Func {
    pub name: String,
    pub proc: Option<HostProc>,
    pub code: Option<Value>,
    pub argnames: Option<List>,
}

// ── Interp ────────────────────────────────────────────────────────────────────

/// The interpreter.  See the crate-level docs for a usage example.
pub struct Interp {
    // Parse cursor, shared by the parser and the evaluator.  `parse` saves
    // and restores it so nested evaluations (brackets, `$name`, `eval`)
    // nest correctly.
    pub(crate) code: Rc<[u8]>,
    pub(crate) head: usize,
    /// Source of the outermost `parse` call, kept for reflection.
    pub(crate) root_code: Rc<[u8]>,
    /// Treat line terminators as plain whitespace (list mode, brackets).
    pub(crate) ignore_eol: bool,

    pub(crate) cmds: Vec<Func>,
    pub(crate) cmdmap: StrMap,
    /// Registry size right after construction; used to tell host commands
    /// apart from the built-in family.
    pub(crate) syscmds: usize,

    pub(crate) catcher: Option<String>,
    pub(crate) in_catcher: usize,
    pub(crate) dollar_prefix: String,

    pub(crate) envs: Vec<Env>,
    pub(crate) cur: EnvId,
    pub(crate) down: Option<EnvId>,

    pub(crate) error: ErrorSlot,
    pub(crate) parse_depth: usize,
    recursion_limit: Option<usize>,

    pub(crate) host: Box<dyn Host>,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    /// A fresh interpreter with the built-in command family registered.
    pub fn new() -> Self {
        let mut interp = Interp {
            code: Rc::from(&b""[..]),
            head: 0,
            root_code: Rc::from(&b""[..]),
            ignore_eol: false,
            cmds: Vec::new(),
            cmdmap: StrMap::new(),
            syscmds: 0,
            catcher: None,
            in_catcher: 0,
            dollar_prefix: "set ".to_owned(),
            envs: vec![Env::new(None)],
            cur: ROOT,
            down: None,
            error: ErrorSlot::default(),
            parse_depth: 0,
            recursion_limit: None,
            host: Box::new(DefaultHost),
        };
        crate::builtins::register_stdcmds(&mut interp);
        interp.syscmds = interp.cmds.len();
        interp
    }

    /// Install the host hooks (environment store, interrupt predicate).
    pub fn set_host(&mut self, host: Box<dyn Host>) {
        self.host = host;
    }

    /// Cap the nesting depth of `parse` calls; exceeding it raises
    /// "Too many recursive calls".  `None` (the default) disables the guard.
    pub fn set_recursion_limit(&mut self, limit: Option<usize>) {
        self.recursion_limit = limit;
    }

    // ── Error slot ────────────────────────────────────────────────────────────

    pub(crate) fn set_error(&mut self, msg: &str) {
        if self.error.is_set() {
            return;
        }
        debug!("script error: {msg}");
        self.error = ErrorSlot {
            kind: Some(ErrorKind::FixHead),
            pos: 0,
            message: Some(msg.to_owned()),
        };
    }

    pub(crate) fn set_error_at(&mut self, pos: usize, msg: &str) {
        if self.error.is_set() {
            return;
        }
        debug!("script error at {pos}: {msg}");
        self.error = ErrorSlot {
            kind: Some(ErrorKind::Default),
            pos,
            message: Some(msg.to_owned()),
        };
    }

    pub(crate) fn set_error_unbalanced(&mut self, expected: char) {
        let pos = self.head;
        self.set_error_at(pos, &format!("expected {expected}"));
        self.error.kind = Some(ErrorKind::Unbalanced);
    }

    /// Read the error slot, clearing it.  The message text stays visible to
    /// `reflect error` until the next error is recorded.
    pub fn error(&mut self) -> Option<(String, usize)> {
        if !self.error.is_set() {
            return None;
        }
        self.error.kind = None;
        Some((
            self.error.message.clone().unwrap_or_default(),
            self.error.pos,
        ))
    }

    // ── Command registry ──────────────────────────────────────────────────────

    /// Register a host command.  Re-registration of the same name replaces
    /// the definition in place, preserving identity.
    pub fn register(&mut self, name: &str, proc: HostProc) {
        trace!("register {name}");
        let idx = self.add_func(name);
        self.cmds[idx].proc = Some(proc);
    }

    /// Resolve a command name.  A name containing a `.` is looked up by the
    /// prefix before the first dot only, so hosts can expose qualified
    /// names that stay resolvable by their root.
    pub(crate) fn find_cmd(&self, name: &str) -> Option<usize> {
        let name = match name.find('.') {
            Some(dot) => &name[..dot],
            None => name,
        };
        self.cmdmap.get(name)
    }

    /// Find-or-create a registry entry, resetting any previous definition.
    pub(crate) fn add_func(&mut self, name: &str) -> usize {
        if let Some(idx) = self.find_cmd(name) {
            let cmd = &mut self.cmds[idx];
            cmd.proc = None;
            cmd.code = None;
            cmd.argnames = None;
            return idx;
        }
        let idx = self.cmds.len();
        self.cmds.push(Func {
            name: name.to_owned(),
            proc: None,
            code: None,
            argnames: None,
        });
        self.cmdmap.put(name, Some(idx));
        idx
    }

    pub(crate) fn del_func(&mut self, idx: usize) {
        let name = self.cmds[idx].name.clone();
        self.cmdmap.put(&name, None);
        self.cmds.remove(idx);
        // The registry is index-addressed; reindex everything that shifted.
        for i in idx..self.cmds.len() {
            let n = self.cmds[i].name.clone();
            self.cmdmap.put(&n, Some(i));
        }
    }

    /// A name of the form `!!un!<part>!<counter>!nu!!` that collides with no
    /// existing command or variable.
    pub fn unused_name(&mut self, part: &str) -> Value {
        for i in 0..u64::MAX {
            let name = format!("!!un!{part}!{i:09}!nu!!");
            if self.find_cmd(&name).is_some() {
                continue;
            }
            if self.find_var(self.cur, &name).is_some() {
                continue;
            }
            return Value::from(name);
        }
        Value::new()
    }

    // ── Environment stack ─────────────────────────────────────────────────────

    pub(crate) fn env(&self, id: EnvId) -> &Env {
        &self.envs[id.0]
    }

    pub(crate) fn env_mut(&mut self, id: EnvId) -> &mut Env {
        &mut self.envs[id.0]
    }

    pub fn push_env(&mut self) -> EnvId {
        let id = EnvId(self.envs.len());
        self.envs.push(Env::new(Some(self.cur)));
        self.cur = id;
        id
    }

    /// Free the current environment and restore its parent.  The root
    /// environment is never popped.  Environments are created and destroyed
    /// LIFO, so the current one is always the newest.
    pub fn pop_env(&mut self) {
        if let Some(parent) = self.env(self.cur).parent {
            if self.cur.0 + 1 == self.envs.len() {
                self.envs.truncate(self.cur.0);
            }
            self.cur = parent;
        }
    }

    /// Two-level lookup: the given environment, then the root directly.
    pub(crate) fn find_var(&self, env: EnvId, name: &str) -> Option<(EnvId, usize)> {
        if let Some(slot) = self.env(env).local_slot(name) {
            return Some((env, slot));
        }
        if env == ROOT {
            return None;
        }
        self.env(ROOT).local_slot(name).map(|slot| (ROOT, slot))
    }

    /// Assign a variable under the given creation policy.  Returns the
    /// address of the written variable, or `None` when the name is empty or
    /// the host store cancelled a rooted assignment.
    pub fn set_var(&mut self, name: &str, val: &Value, mode: SetMode) -> Option<(EnvId, usize)> {
        if name.is_empty() {
            return None;
        }
        let env = if mode == SetMode::Global { ROOT } else { self.cur };

        if mode != SetMode::LocalNew {
            let mut var = self.find_var(env, name);
            if mode == SetMode::LocalOnly {
                if let Some((ve, _)) = var {
                    if ve == ROOT && env != ROOT {
                        var = None;
                    }
                }
            }

            let rooted = match var {
                Some((ve, _)) => ve == ROOT,
                None => env == ROOT,
            };
            if rooted && !self.host.env_set(name, val) {
                return None;
            }

            if let Some((ve, slot)) = var {
                self.envs[ve.0].vars[slot].value = val.clone();
                if let Some(watch) = self.envs[ve.0].vars[slot].watch.clone() {
                    let save_env = self.cur;
                    self.cur = ve;
                    let _ = self.parse(&watch, false);
                    self.cur = save_env;
                }
                return Some((ve, slot));
            }
        }

        let e = self.env_mut(env);
        let slot = e.vars.len();
        e.vars.push(Var {
            name: name.to_owned(),
            watch: None,
            value: val.clone(),
        });
        e.varmap.put(name, Some(slot));
        Some((env, slot))
    }

    /// Read a variable; unbound names yield the empty value.
    pub fn get_var(&mut self, name: &str) -> Value {
        self.get_var_or(name, &Value::new())
    }

    /// Read a variable with an explicit default.  Rooted (and missing)
    /// reads consult the host store, whose value wins when present.
    pub fn get_var_or(&mut self, name: &str, default: &Value) -> Value {
        let var = self.find_var(self.cur, name);
        let mut ret = match var {
            Some((e, slot)) => self.envs[e.0].vars[slot].value.clone(),
            None => default.clone(),
        };
        if var.map_or(true, |(e, _)| e == ROOT) {
            if let Some(stored) = self.host.env_get(name) {
                ret = stored;
            }
        }
        ret
    }

    // ── Evaluation ────────────────────────────────────────────────────────────

    /// Evaluate a source text and return the result of its last command.
    ///
    /// With `funclevel`, this call is the body of a function frame: on entry
    /// the current environment's unwind flag is reset; on exit a pending
    /// return value is consumed and both flags are cleared.
    pub fn parse(&mut self, code: &str, funclevel: bool) -> Value {
        self.parse_bytes(code.as_bytes(), funclevel)
    }

    /// Evaluate the contents of a value.
    pub fn parse_value(&mut self, code: &Value, funclevel: bool) -> Value {
        if code.is_empty() {
            return Value::new();
        }
        self.parse_bytes(code.as_bytes(), funclevel)
    }

    /// Evaluate a source text and surface any recorded error, clearing it.
    pub fn run(&mut self, code: &str) -> Result<Value, InterpError> {
        let val = self.parse(code, false);
        match self.error() {
            Some((message, position)) => Err(InterpError { message, position }),
            None => Ok(val),
        }
    }

    fn parse_bytes(&mut self, code: &[u8], funclevel: bool) -> Value {
        let save_code = Rc::clone(&self.code);
        let save_head = self.head;

        if self.parse_depth == 0 {
            self.root_code = Rc::from(code);
        }
        self.code = Rc::from(code);
        self.head = 0;

        self.skip_spaces();
        self.parse_depth += 1;

        let mut val: Option<Value> = None;
        let over_limit = matches!(self.recursion_limit, Some(limit) if self.parse_depth > limit);
        if over_limit {
            self.set_error("Too many recursive calls");
        } else {
            if self.parse_depth == 1 {
                self.error.kind = None;
            }
            if funclevel {
                self.env_mut(self.cur).breakrun = false;
            }

            while self.head < self.code.len() && !self.error.is_set() {
                val = None;

                if self.host.interrupted() {
                    let pos = self.head;
                    self.set_error_at(pos, "interrupted");
                    break;
                }

                let words = match self.substitute() {
                    Some(words) => words,
                    None => break,
                };
                if self.error.is_set() {
                    break;
                }

                if !words.is_empty() {
                    let name = words.get(0).map(|w| w.to_str_lossy().into_owned());
                    let name = name.unwrap_or_default();
                    match self.find_cmd(&name) {
                        Some(idx) => {
                            val = self.run_cmd(idx, &words);
                        }
                        None => {
                            if !name.is_empty() {
                                match self.unknown_cmd(&words) {
                                    Some(v) => val = Some(v),
                                    None => break,
                                }
                            }
                        }
                    }
                    if self.env(self.cur).breakrun {
                        break;
                    }
                }

                self.skip_spaces();
                while self.at_eol() {
                    self.head += 1;
                }
                self.skip_spaces();
            }
        }

        self.code = save_code;
        self.head = save_head;

        if funclevel && self.env(self.cur).retval_set {
            let env = self.env_mut(self.cur);
            val = env.retval.take();
            env.retval_set = false;
            env.breakrun = false;
        }

        self.parse_depth -= 1;
        val.unwrap_or_default()
    }

    /// Invoke a command by name with pre-built arguments, bypassing the
    /// parser.  Unknown names yield `None` without touching the catcher.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Option<Value> {
        let idx = self.find_cmd(name)?;
        if let Some(proc) = self.cmds[idx].proc {
            return proc(self, args);
        }

        let code = self.cmds[idx].code.clone().unwrap_or_default();
        let argnames = self.cmds[idx].argnames.clone().unwrap_or_default();
        self.push_env();
        self.env_mut(self.cur).func = Some(idx);

        if takes_arg_list(&argnames) {
            let list: List = args.iter().cloned().collect();
            let argsval = list.to_value(false);
            self.set_var("args", &argsval, SetMode::LocalNew);
        } else {
            for (i, argname) in argnames.iter().enumerate() {
                let val = args.get(i).cloned().unwrap_or_default();
                let name = argname.to_str_lossy().into_owned();
                self.set_var(&name, &val, SetMode::LocalNew);
            }
        }

        let r = self.parse_value(&code, true);
        self.pop_env();
        Some(r)
    }

    fn run_cmd(&mut self, idx: usize, words: &List) -> Option<Value> {
        trace!("dispatch {}", self.cmds[idx].name);
        if let Some(proc) = self.cmds[idx].proc {
            let dispatch_head = self.head;
            let r = proc(self, &words.as_slice()[1..]);
            if self.error.kind == Some(ErrorKind::FixHead) {
                self.error.kind = Some(ErrorKind::Default);
                self.error.pos = dispatch_head;
            }
            return r;
        }

        let code = self.cmds[idx].code.clone().unwrap_or_default();
        let argnames = self.cmds[idx].argnames.clone().unwrap_or_default();
        self.push_env();
        self.env_mut(self.cur).func = Some(idx);

        if takes_arg_list(&argnames) {
            // The whole line, command word included, in quoted form.
            let args = words.to_value(true);
            self.set_var("args", &args, SetMode::LocalNew);
        } else {
            for (i, argname) in argnames.iter().enumerate() {
                let val = words.get(i + 1).cloned().unwrap_or_default();
                let name = argname.to_str_lossy().into_owned();
                self.set_var(&name, &val, SetMode::LocalNew);
            }
        }

        let r = self.parse_value(&code, true);
        self.pop_env();
        Some(r)
    }

    fn unknown_cmd(&mut self, words: &List) -> Option<Value> {
        let head = words.get(0).cloned().unwrap_or_default();
        if let Some(catcher) = self.catcher.clone() {
            if self.in_catcher < MAX_CATCHER_DEPTH {
                debug!("catching unknown command {}", head.to_str_lossy());
                self.in_catcher += 1;
                self.push_env();
                self.env_mut(self.cur).catcher_for = Some(head);

                let args = words.to_value(true);
                self.set_var("args", &args, SetMode::LocalNew);
                let r = self.parse(&catcher, true);

                self.pop_env();
                self.in_catcher -= 1;
                return Some(r);
            }
            let pos = self.head;
            self.set_error_at(
                pos,
                &format!(
                    "catcher limit reached while trying to call unknown function {}",
                    head.to_str_lossy()
                ),
            );
            return None;
        }
        let pos = self.head;
        self.set_error_at(pos, &format!("unknown function {}", head.to_str_lossy()));
        None
    }

    /// Evaluate an infix expression after substitution.
    pub fn eval_expr(&mut self, code: &Value) -> Option<Value> {
        crate::expr::eval(self, code)
    }
}

/// Does this argument-name list request the whole-line `args` binding?
fn takes_arg_list(argnames: &List) -> bool {
    argnames.len() == 1 && argnames.get(0).map_or(false, |v| v.as_bytes() == b"args")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn run(src: &str) -> Value {
        let mut interp = Interp::new();
        interp.run(src).expect("script failed")
    }

    fn run_err(src: &str) -> InterpError {
        let mut interp = Interp::new();
        interp.run(src).expect_err("script should fail")
    }

    #[test]
    fn set_then_read() {
        assert_eq!(run("set a 3; set a"), "3");
    }

    #[test]
    fn set_multiple_pairs() {
        assert_eq!(run("set foo bar baz qux; quote $foo $baz"), "bar qux");
    }

    #[test]
    fn dollar_equals_set() {
        assert_eq!(run("set n v; quote $n"), "v");
        assert_eq!(run("set n v; quote [set n]"), "v");
    }

    #[test]
    fn script_function() {
        assert_eq!(run("func sq {x} { expr $x * $x }; sq 7"), "49");
    }

    #[test]
    fn if_with_expression() {
        assert_eq!(run("if {1 + 1 == 2} { quote yes } { quote no }"), "yes");
    }

    #[test]
    fn unknown_function_is_an_error() {
        let err = run_err("no-such-thing");
        assert_eq!(err.message, "unknown function no-such-thing");
    }

    #[test]
    fn error_slot_is_cleared_by_read() {
        let mut interp = Interp::new();
        let _ = interp.parse("error boom", false);
        assert!(interp.error().is_some());
        assert!(interp.error().is_none());
    }

    #[test]
    fn return_stops_the_body() {
        assert_eq!(run("func f {} { return early; set x late }; f"), "early");
    }

    #[test]
    fn missing_arguments_bind_empty() {
        assert_eq!(run("func f {a b} { quote $a$b }; f only"), "only");
    }

    #[test]
    fn args_binding_includes_command_word() {
        assert_eq!(run("func f args { set args }; f x y"), "f x y");
    }

    #[test]
    fn call_binds_args_without_command_word() {
        let mut interp = Interp::new();
        let _ = interp.run("func f args { set args }").unwrap();
        let r = interp
            .call("f", &[Value::from("x"), Value::from("y")])
            .expect("call failed");
        assert_eq!(r, "x y");
    }

    #[test]
    fn local_shadowing_is_invisible_to_callees() {
        // Frames are flat: a callee sees only its own frame and the root.
        let src = "func inner {} { set x };\
                   func outer {} { local x; set x 1; inner };\
                   outer";
        assert_eq!(run(src), "");
    }

    #[test]
    fn dotted_names_resolve_by_prefix() {
        let mut interp = Interp::new();
        fn hello(_: &mut Interp, _: &[Value]) -> Option<Value> {
            Some(Value::from("hi"))
        }
        interp.register("greet", hello);
        assert_eq!(interp.run("greet.loudly").unwrap(), "hi");
    }

    #[test]
    fn rename_preserves_identity() {
        let src = "func f {} { quote old }; rename f g; g";
        assert_eq!(run(src), "old");
    }

    #[test]
    fn rename_to_empty_deletes() {
        let err = run_err("func f {} { quote x }; rename f {}; f");
        assert_eq!(err.message, "unknown function f");
    }

    #[test]
    fn watch_runs_in_owning_env() {
        let src = "set x 1; watch x {set global seen $x}; set x 2; set seen";
        assert_eq!(run(src), "2");
    }

    #[test]
    fn watch_does_not_fire_on_local_new() {
        let src = "set x 1; watch x {set global seen yes};\
                   func f {} { local x; set x 9 }; f; set seen";
        // `local x` creates a shadowing variable; assigning it must not run
        // the watch of the rooted x.
        assert_eq!(run(src), "");
    }

    #[test]
    fn catcher_intercepts_unknown_commands() {
        let src = "catcher {quote caught [index $args 0]}; frobnicate a b";
        assert_eq!(run(src), "caught frobnicate");
    }

    #[test]
    fn recursion_guard() {
        let mut interp = Interp::new();
        interp.set_recursion_limit(Some(64));
        let err = interp
            .run("func loop {} { loop }; loop")
            .expect_err("should hit the limit");
        assert_eq!(err.message, "Too many recursive calls");
    }

    // ── Host integration ──────────────────────────────────────────────────────

    struct StoreHost {
        store: Rc<RefCell<HashMap<String, String>>>,
    }

    impl Host for StoreHost {
        fn env_set(&mut self, name: &str, value: &Value) -> bool {
            self.store
                .borrow_mut()
                .insert(name.to_owned(), value.to_string());
            true
        }

        fn env_get(&mut self, name: &str) -> Option<Value> {
            self.store
                .borrow()
                .get(name)
                .map(|s| Value::from(s.as_str()))
        }
    }

    #[test]
    fn rooted_assignment_mirrors_to_store() {
        let store = Rc::new(RefCell::new(HashMap::new()));
        let mut interp = Interp::new();
        interp.set_host(Box::new(StoreHost {
            store: Rc::clone(&store),
        }));
        interp.run("set a 3").unwrap();
        assert_eq!(store.borrow().get("a").map(String::as_str), Some("3"));
    }

    #[test]
    fn rooted_read_prefers_store() {
        let store = Rc::new(RefCell::new(HashMap::new()));
        store
            .borrow_mut()
            .insert("a".to_owned(), "stored".to_owned());
        let mut interp = Interp::new();
        interp.set_host(Box::new(StoreHost {
            store: Rc::clone(&store),
        }));
        assert_eq!(interp.run("set a").unwrap(), "stored");
    }

    struct InterruptHost;

    impl Host for InterruptHost {
        fn interrupted(&mut self) -> bool {
            true
        }
    }

    #[test]
    fn interrupt_predicate_stops_evaluation() {
        let mut interp = Interp::new();
        interp.set_host(Box::new(InterruptHost));
        let err = interp.run("set a 1").expect_err("should be interrupted");
        assert_eq!(err.message, "interrupted");
    }
}

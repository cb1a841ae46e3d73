//! The built-in command family.
//!
//! These are the commands that *are* the language: assignment, control
//! flow, function definition, list and string manipulation, environment
//! hopping and introspection.  Each receives the already-substituted
//! arguments of its command line and returns `Some(result)` or `None` for
//! the empty result; failures go through the interpreter's error slot.

use crate::env::SetMode;
use crate::expr;
use crate::interp::{HostProc, Interp};
use crate::value::{List, Value};

const DEFAULT_TRIM_CHARS: &[u8] = b" \x0c\n\r\t\x0b";

// ── Functions and evaluation ──────────────────────────────────────────────────

/// `func name argnames body` / `func argnames body` / `func body`.
/// The one- and two-argument forms define an anonymous function (argnames
/// default to the literal `args`); the generated name is returned.
fn fnc_func(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }

    let (name, argnames, code) = if args.len() >= 3 {
        (
            args[0].clone(),
            interp.subst_to_list(&args[1]),
            args[2].clone(),
        )
    } else {
        let name = interp.unused_name("anonymous-function");
        if args.len() < 2 {
            let argnames = interp.subst_to_list(&Value::from("args"));
            (name, argnames, args[0].clone())
        } else {
            (name, interp.subst_to_list(&args[0]), args[1].clone())
        }
    };

    let idx = interp.add_func(&name.to_str_lossy());
    interp.cmds[idx].argnames = Some(argnames);
    interp.cmds[idx].code = Some(code);
    Some(name)
}

/// `rename old new`; an empty new name deletes the function.
fn fnc_rename(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let oldname = args[0].to_str_lossy().into_owned();
    let newname = args[1].to_str_lossy().into_owned();
    let idx = match interp.find_cmd(&oldname) {
        Some(idx) => idx,
        None => {
            let pos = interp.head;
            interp.set_error_at(pos, &format!("unknown function '{oldname}'"));
            return None;
        }
    };

    let r = Value::from(interp.cmds[idx].name.as_str());
    if !newname.is_empty() {
        interp.cmdmap.put(&oldname, None);
        interp.cmdmap.put(&newname, Some(idx));
        interp.cmds[idx].name = newname;
    } else {
        interp.del_func(idx);
    }
    Some(r)
}

fn fnc_unusedname(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let part = args
        .first()
        .map(|a| a.to_str_lossy().into_owned())
        .unwrap_or_else(|| "unusedname".to_owned());
    Some(interp.unused_name(&part))
}

/// `eval code…`: arguments joined with spaces and evaluated as a script.
fn fnc_eval(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    match args.len() {
        0 => None,
        1 => Some(interp.parse_value(&args[0], false)),
        _ => {
            let mut code = Value::new();
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    code.push_byte(b' ');
                }
                code.push_value(a);
            }
            Some(interp.parse_value(&code, false))
        }
    }
}

/// `topeval`: evaluate in the root environment; the current one becomes
/// reachable through `downeval`.
fn fnc_topeval(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let this_env = interp.cur;
    let this_down = interp.down;

    interp.cur = crate::interp::ROOT;
    interp.down = Some(this_env);

    let r = fnc_eval(interp, args);
    interp.down = this_down;
    interp.cur = this_env;
    r
}

/// `upeval`: evaluate in the parent environment.
fn fnc_upeval(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let this_env = interp.cur;
    let this_down = interp.down;
    let parent = match interp.env(this_env).parent {
        Some(parent) => parent,
        None => return fnc_eval(interp, args),
    };

    interp.cur = parent;
    interp.down = Some(this_env);

    let r = fnc_eval(interp, args);
    interp.cur = this_env;
    interp.down = this_down;
    r
}

/// `downeval`: evaluate back in the environment that an enclosing
/// `upeval`/`topeval` came from.
fn fnc_downeval(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let up_env = interp.cur;
    let down_env = match interp.down {
        Some(down) => down,
        None => return fnc_eval(interp, args),
    };

    interp.down = None;
    interp.cur = down_env;

    let r = fnc_eval(interp, args);
    interp.down = Some(down_env);
    interp.cur = up_env;
    r
}

/// `enveval [invars [outvars]] body`: evaluate the body in a fresh
/// environment, copying the named variables in first and back out after.
fn fnc_enveval(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }

    let (invars, outvars, codeindex) = match args.len() {
        1 => (None, None, 0),
        2 => (Some(interp.subst_to_list(&args[0])), None, 1),
        _ => (
            Some(interp.subst_to_list(&args[0])),
            Some(interp.subst_to_list(&args[1])),
            2,
        ),
    };

    let mut values: Vec<Value> = Vec::new();
    if let Some(invars) = &invars {
        for name in invars.iter() {
            let name = name.to_str_lossy().into_owned();
            values.push(interp.get_var(&name));
        }
    }

    interp.push_env();
    if let Some(invars) = &invars {
        for (name, value) in invars.iter().zip(&values) {
            let name = name.to_str_lossy().into_owned();
            interp.set_var(&name, value, SetMode::LocalNew);
        }
    }

    let r = interp.parse_value(&args[codeindex], false);

    let copy_back = outvars.as_ref().or(invars.as_ref()).cloned();
    let mut out_values: Vec<Value> = Vec::new();
    if let Some(names) = &copy_back {
        for name in names.iter() {
            let name = name.to_str_lossy().into_owned();
            out_values.push(interp.get_var(&name));
        }
    }

    interp.pop_env();
    if let Some(names) = &copy_back {
        for (name, value) in names.iter().zip(&out_values) {
            let name = name.to_str_lossy().into_owned();
            interp.set_var(&name, value, SetMode::Local);
        }
    }

    Some(r)
}

/// `jaileval [clean] body`: evaluate in a brand-new interpreter that sees
/// host commands (unless `clean`) but none of the caller's script state.
fn fnc_jaileval(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }

    let clean = args[0].as_bytes() == b"clean";
    let base = if clean {
        if args.len() == 1 {
            return None;
        }
        1
    } else {
        0
    };

    let mut sub = Interp::new();
    if !clean {
        let host_cmds: Vec<(String, HostProc)> = interp
            .cmds
            .iter()
            .skip(interp.syscmds)
            .filter_map(|cmd| cmd.proc.map(|proc| (cmd.name.clone(), proc)))
            .collect();
        for (name, proc) in host_cmds {
            sub.register(&name, proc);
        }
    }

    Some(sub.parse_value(&args[base], true))
}

// ── Variables ─────────────────────────────────────────────────────────────────

/// `set [global] name value …`; with a trailing lone name, reads it.
fn fnc_set(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }

    let mut i = 0;
    let mut access = SetMode::Local;
    if args[0].as_bytes() == b"global" {
        i = 1;
        access = SetMode::Global;
    }

    let mut last = None;
    while i < args.len() {
        if args.len() == i + 1 {
            let name = args[i].to_str_lossy().into_owned();
            return Some(interp.get_var(&name));
        }
        let name = args[i].to_str_lossy().into_owned();
        last = interp.set_var(&name, &args[i + 1], access);
        i += 2;
    }

    last.map(|(env, slot)| interp.envs[env.0].vars[slot].value.clone())
}

/// `local name…`: declare shadowing locals so later `set`s in this frame
/// never write through to the root.
fn fnc_local(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    for arg in args {
        let name = arg.to_str_lossy().into_owned();
        if interp.env(interp.cur).local_slot(&name).is_none() {
            interp.set_var(&name, &Value::new(), SetMode::LocalNew);
        }
    }
    None
}

fn real_inc(interp: &mut Interp, name: &str, delta: i64) -> Option<Value> {
    let value = Value::from(interp.get_var(name).to_integer().wrapping_add(delta));
    interp.set_var(name, &value, SetMode::Local);
    Some(value)
}

fn fnc_inc(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let name = args.first()?.to_str_lossy().into_owned();
    let delta = args.get(1).map_or(1, Value::to_integer);
    real_inc(interp, &name, delta)
}

fn fnc_dec(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let name = args.first()?.to_str_lossy().into_owned();
    let delta = args.get(1).map_or(1, Value::to_integer);
    real_inc(interp, &name, delta.wrapping_neg())
}

/// `watch name… code`: attach a watch program to each named variable
/// (creating it if needed); an empty program clears the watch.
fn fnc_watch(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let wcode = args[args.len() - 1].to_str_lossy().into_owned();
    for arg in &args[..args.len() - 1] {
        let name = arg.to_str_lossy().into_owned();
        if name.is_empty() {
            continue;
        }

        let target = match interp.find_var(interp.cur, &name) {
            Some(target) => Some(target),
            None => interp.set_var(&name, &Value::new(), SetMode::LocalNew),
        };
        if let Some((env, slot)) = target {
            interp.envs[env.0].vars[slot].watch = if wcode.is_empty() {
                None
            } else {
                Some(wcode.clone())
            };
        }
    }

    None
}

// ── Control flow ──────────────────────────────────────────────────────────────

/// `return [value]`: stop the current body; the value becomes the result
/// of the enclosing function frame.
fn fnc_return(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let env = interp.env_mut(interp.cur);
    env.breakrun = true;
    env.retval = args.first().cloned();
    env.retval_set = true;
    args.first().cloned()
}

/// `result [value]`: set or read the frame's pending return value without
/// stopping the body.
fn fnc_result(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let env = interp.env_mut(interp.cur);
    if let Some(value) = args.first() {
        env.retval = Some(value.clone());
        env.retval_set = true;
    }
    if env.retval_set {
        env.retval.clone()
    } else {
        None
    }
}

fn fnc_expr(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    match args.len() {
        0 => None,
        1 => expr::eval(interp, &args[0]),
        _ => {
            let mut code = Value::new();
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    code.push_byte(b' ');
                }
                code.push_value(a);
            }
            expr::eval(interp, &code)
        }
    }
}

/// `if [not] cond then [else]`.
fn fnc_if(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }

    let not = args[0].as_bytes() == b"not";
    let base = not as usize;
    if args.len() < base + 2 {
        return None;
    }

    let val = expr::eval(interp, &args[base])?;
    if interp.error.is_set() {
        return None;
    }

    let mut v = val.to_boolean();
    if not {
        v = !v;
    }

    if v {
        Some(interp.parse_value(&args[base + 1], false))
    } else if args.len() > base + 2 {
        Some(interp.parse_value(&args[base + 2], false))
    } else {
        None
    }
}

/// `while [not] cond body`.
fn fnc_while(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }

    let not = args[0].as_bytes() == b"not";
    let base = not as usize;
    if args.len() < base + 2 {
        return None;
    }

    let mut r = None;
    while !interp.error.is_set() && !interp.env(interp.cur).breakrun {
        let val = expr::eval(interp, &args[base])?;
        if interp.error.is_set() {
            return None;
        }

        let mut v = val.to_boolean();
        if not {
            v = !v;
        }
        if !v {
            break;
        }

        r = Some(interp.parse_value(&args[base + 1], false));
    }

    r
}

/// `for init cond step body`.
fn fnc_for(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 4 {
        return None;
    }

    let mut r = None;
    let _ = interp.parse_value(&args[0], false);
    while !interp.error.is_set() && !interp.env(interp.cur).breakrun {
        let val = expr::eval(interp, &args[1])?;
        if interp.error.is_set() {
            return None;
        }
        if !val.to_boolean() {
            break;
        }

        r = Some(interp.parse_value(&args[3], false));
        let _ = interp.parse_value(&args[2], false);
    }

    r
}

/// `try code [recovery]`: run the code and, if it raised an error, clear
/// the slot and run the recovery fragment instead.
fn fnc_try(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() || interp.error.is_set() {
        return None;
    }

    let r = interp.parse_value(&args[0], false);
    if interp.error.is_set() {
        interp.error.kind = None;
        return args.get(1).map(|rec| interp.parse_value(rec, false));
    }
    Some(r)
}

fn fnc_error(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let msg = args
        .first()
        .map(|a| a.to_str_lossy().into_owned())
        .unwrap_or_default();
    interp.set_error(&msg);
    None
}

/// `catcher [code]`: read or replace the unknown-command catcher; an empty
/// program disables it.
fn fnc_catcher(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    match args.first() {
        None => Some(Value::from(interp.catcher.clone().unwrap_or_default())),
        Some(code) => {
            interp.catcher = if code.is_empty() {
                None
            } else {
                Some(code.to_str_lossy().into_owned())
            };
            None
        }
    }
}

// ── Lists ─────────────────────────────────────────────────────────────────────

fn fnc_quote(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }

    let mut r = Value::new();
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            r.push_byte(b' ');
        }
        r.push_value(a);
    }
    Some(r)
}

fn fnc_list(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let list: List = args.iter().cloned().collect();
    Some(list.to_value(true))
}

fn fnc_subst(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    args.first().map(|code| interp.subst_to_value(code))
}

fn fnc_count(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    match args.first() {
        None => Some(Value::from("0")),
        Some(code) => {
            let list = interp.subst_to_list(code);
            Some(Value::from(list.len() as i64))
        }
    }
}

fn fnc_index(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let list = interp.subst_to_list(&args[0]);
    let index = args[1].to_integer();
    if index < 0 {
        return None;
    }
    list.get(index as usize).cloned()
}

fn fnc_indexof(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let list = interp.subst_to_list(&args[0]);
    list.iter()
        .position(|item| item.as_bytes() == args[1].as_bytes())
        .map(|index| Value::from(index as i64))
}

/// `append [global] varname value…`: append to the list held by a
/// variable, writing the re-serialized list back.
fn fnc_append(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let (name_idx, base, access) = if args[0].as_bytes() == b"global" {
        if args.len() < 3 {
            return None;
        }
        (1, 2, SetMode::Global)
    } else {
        (0, 1, SetMode::Local)
    };

    let varname = args[name_idx].to_str_lossy().into_owned();
    let current = interp.get_var(&varname);
    let mut list = interp.subst_to_list(&current);
    for a in &args[base..] {
        list.push(a.clone());
    }

    let r = list.to_value(true);
    interp.set_var(&varname, &r, access);
    Some(r)
}

fn fnc_slice(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }
    if args.len() < 2 {
        return Some(args[0].clone());
    }

    let mut from = args[1].to_integer();
    if from < 0 {
        from = 0;
    }

    let list = interp.subst_to_list(&args[0]);
    let mut to = if args.len() > 2 {
        args[2].to_integer()
    } else {
        list.len() as i64
    };
    if to > list.len() as i64 {
        to = list.len() as i64;
    } else if to < from {
        to = from;
    }

    let slice: List = (from as usize..to as usize)
        .filter_map(|i| list.get(i).cloned())
        .collect();
    Some(slice.to_value(true))
}

/// `filter [varname] list expr`: keep the entries for which the expression
/// is true; the entry is bound to `varname` (default `x`).
fn fnc_filter(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }
    if args.len() < 2 {
        return Some(args[0].clone());
    }

    let (varname, base) = if args.len() > 2 {
        (args[0].to_str_lossy().into_owned(), 1)
    } else {
        ("x".to_owned(), 0)
    };

    let list = interp.subst_to_list(&args[base]);
    let mut filtered = List::new();
    for item in list.iter() {
        if interp.env(interp.cur).breakrun {
            break;
        }
        interp.set_var(&varname, item, SetMode::LocalOnly);
        let keep = expr::eval(interp, &args[base + 1]).map_or(false, |v| v.to_boolean());
        if keep {
            filtered.push(item.clone());
        }
    }

    Some(filtered.to_value(true))
}

/// `foreach [varname] list code`: run the code for each entry (bound to
/// `varname`, default `i`); non-empty results are collected into a list.
fn fnc_foreach(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let (varname, list_idx, code_idx) = if args.len() >= 3 {
        (args[0].to_str_lossy().into_owned(), 1, 2)
    } else {
        ("i".to_owned(), 0, 1)
    };

    let list = interp.subst_to_list(&args[list_idx]);
    let mut results = List::new();
    for item in list.iter() {
        interp.set_var(&varname, item, SetMode::LocalOnly);
        let rv = interp.parse_value(&args[code_idx], false);
        if !rv.is_empty() {
            results.push(rv);
        }
        if interp.env(interp.cur).breakrun || interp.error.is_set() {
            break;
        }
    }

    Some(results.to_value(true))
}

/// `lmap list name…`: bind each name to the corresponding list entry.
fn fnc_lmap(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let list = interp.subst_to_list(&args[0]);
    for (i, arg) in args.iter().enumerate().skip(1) {
        let name = arg.to_str_lossy().into_owned();
        let value = list.get(i - 1).cloned().unwrap_or_default();
        interp.set_var(&name, &value, SetMode::Local);
    }
    None
}

fn fnc_concat(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }

    let mut r = Value::new();
    for a in args {
        let list = interp.subst_to_list(a);
        r.push_value(&list.to_value(true));
    }
    Some(r)
}

// ── Strings ───────────────────────────────────────────────────────────────────

fn fnc_char(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let b = args.first()?.to_integer() as u8;
    if b == 0 {
        return Some(Value::new());
    }
    Some(Value::from_bytes(&[b]))
}

fn fnc_charat(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let index = args[1].to_integer();
    if index < 0 {
        return None;
    }
    args[0]
        .as_bytes()
        .get(index as usize)
        .map(|&b| Value::from_bytes(&[b]))
}

fn fnc_codeat(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let index = args[1].to_integer();
    if index < 0 {
        return None;
    }
    args[0]
        .as_bytes()
        .get(index as usize)
        .map(|&b| Value::from(b as i64))
}

fn fnc_substr(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let bytes = args[0].as_bytes();
    if bytes.is_empty() {
        return None;
    }

    let start = args[1].to_integer();
    let mut end = args.get(2).map_or(bytes.len() as i64, Value::to_integer);
    if end < 0 || end > bytes.len() as i64 {
        end = bytes.len() as i64;
    }
    if start < 0 || start >= end {
        return None;
    }
    Some(Value::from_bytes(&bytes[start as usize..end as usize]))
}

fn fnc_strpos(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return Some(Value::from(-1i64));
    }

    let hay = args[0].as_bytes();
    let min = match args.get(2) {
        Some(offset) => {
            let min = offset.to_integer();
            if min < 0 || min as usize >= hay.len() {
                return Some(Value::from(-1i64));
            }
            min as usize
        }
        None => 0,
    };

    let pos = find_bytes(&hay[min..], args[1].as_bytes())
        .map(|p| (p + min) as i64)
        .unwrap_or(-1);
    Some(Value::from(pos))
}

fn fnc_length(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let mut total = 0usize;
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            total += 1;
        }
        total += a.len();
    }
    Some(Value::from(total as i64))
}

fn real_trim(bytes: &[u8], chars: &[u8], left: bool, right: bool) -> Value {
    let mut base = 0;
    if left {
        while base < bytes.len() && chars.contains(&bytes[base]) {
            base += 1;
        }
    }
    let mut end = bytes.len();
    if right {
        while end > base && chars.contains(&bytes[end - 1]) {
            end -= 1;
        }
    }
    Value::from_bytes(&bytes[base..end])
}

fn fnc_trim(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let s = args.first()?;
    let chars = args.get(1).map_or(DEFAULT_TRIM_CHARS, Value::as_bytes);
    Some(real_trim(s.as_bytes(), chars, true, true))
}

fn fnc_ltrim(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let s = args.first()?;
    let chars = args.get(1).map_or(DEFAULT_TRIM_CHARS, Value::as_bytes);
    Some(real_trim(s.as_bytes(), chars, true, false))
}

fn fnc_rtrim(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let s = args.first()?;
    let chars = args.get(1).map_or(DEFAULT_TRIM_CHARS, Value::as_bytes);
    Some(real_trim(s.as_bytes(), chars, false, true))
}

/// Byte-wise comparison returning the signed difference of the first
/// mismatching bytes; only the sign is meaningful to portable scripts.
fn fnc_strcmp(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }

    let a = args[0].as_bytes();
    let b = args[1].as_bytes();
    let mut i = 0;
    loop {
        let ca = a.get(i).copied().unwrap_or(0);
        let cb = b.get(i).copied().unwrap_or(0);
        if ca != cb || ca == 0 {
            return Some(Value::from(ca as i64 - cb as i64));
        }
        i += 1;
    }
}

fn fnc_streq(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.len() < 2 {
        return None;
    }
    Some(Value::from(
        (args[0].as_bytes() == args[1].as_bytes()) as i64,
    ))
}

/// `repstr str from to`: replace every occurrence, rescanning from the
/// start after each replacement.
fn fnc_repstr(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    if args.is_empty() {
        return None;
    }
    if args.len() < 3 {
        return Some(args[0].clone());
    }

    let from = args[1].as_bytes();
    let to = args[2].as_bytes();
    if from.is_empty() {
        return None;
    }

    let mut src = args[0].as_bytes().to_vec();
    while let Some(pos) = find_bytes(&src, from) {
        src.splice(pos..pos + from.len(), to.iter().copied());
    }
    Some(Value::from_bytes(&src))
}

/// `split str [sepchars]`: split on any of the separator bytes (default
/// space); empty fields are kept.
fn fnc_split(_interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let s = args.first()?;
    let mut sep: &[u8] = b" ";
    if let Some(chars) = args.get(1) {
        if chars.is_empty() {
            return Some(s.clone());
        }
        sep = chars.as_bytes();
    }

    let mut list = List::new();
    let mut field = Value::new();
    for &b in s.as_bytes() {
        if sep.contains(&b) {
            list.push(std::mem::take(&mut field));
        } else {
            field.push_byte(b);
        }
    }
    list.push(field);
    Some(list.to_value(true))
}

// ── Introspection ─────────────────────────────────────────────────────────────

/// `reflect kind [arg]`: report interpreter internals — version, function
/// and variable listings, presence checks, the dollar prefix, and the
/// currently executing body or name.
fn fnc_reflect(interp: &mut Interp, args: &[Value]) -> Option<Value> {
    let kind = args.first()?.as_bytes().to_vec();
    match kind.as_slice() {
        b"version" => Some(Value::from(env!("CARGO_PKG_VERSION"))),
        b"args" => {
            let name = args.get(1)?.to_str_lossy().into_owned();
            let idx = interp.find_cmd(&name)?;
            interp.cmds[idx]
                .argnames
                .as_ref()
                .map(|argnames| argnames.to_value(true))
        }
        b"body" => {
            let name = args.get(1)?.to_str_lossy().into_owned();
            let idx = interp.find_cmd(&name)?;
            if interp.cmds[idx].proc.is_some() {
                return None;
            }
            interp.cmds[idx].code.clone()
        }
        b"func-count" => Some(Value::from(interp.cmds.len() as i64)),
        b"funcs" => {
            let funcs: List = interp
                .cmds
                .iter()
                .map(|cmd| Value::from(cmd.name.as_str()))
                .collect();
            Some(funcs.to_value(true))
        }
        b"vars" => {
            let mut vars = List::new();
            let mut env = Some(interp.cur);
            while let Some(id) = env {
                for var in &interp.env(id).vars {
                    vars.push(Value::from(var.name.as_str()));
                }
                env = interp.env(id).parent;
            }
            Some(vars.to_value(true))
        }
        b"globals" => {
            let globals: List = interp
                .env(crate::interp::ROOT)
                .vars
                .iter()
                .map(|var| Value::from(var.name.as_str()))
                .collect();
            Some(globals.to_value(true))
        }
        b"has-func" => {
            let target = args.get(1)?.to_str_lossy().into_owned();
            interp.cmdmap.has(&target).then(|| Value::from("1"))
        }
        b"has-var" => {
            let target = args.get(1)?.to_str_lossy().into_owned();
            let mut env = Some(interp.cur);
            while let Some(id) = env {
                if interp.env(id).varmap.has(&target) {
                    return Some(Value::from("1"));
                }
                env = interp.env(id).parent;
            }
            None
        }
        b"has-global" => {
            let target = args.get(1)?.as_bytes().to_vec();
            interp
                .env(crate::interp::ROOT)
                .vars
                .iter()
                .any(|var| var.name.as_bytes() == target)
                .then(|| Value::from("1"))
        }
        b"error" => interp.error.message.clone().map(Value::from),
        b"dollar-prefix" => {
            let old = Value::from(interp.dollar_prefix.as_str());
            if let Some(new) = args.get(1) {
                interp.dollar_prefix = new.to_str_lossy().into_owned();
            }
            Some(old)
        }
        b"this" => {
            let env = executing_env(interp);
            if interp.env(env).catcher_for.is_some() {
                return Some(Value::from(interp.catcher.clone().unwrap_or_default()));
            }
            if env == crate::interp::ROOT {
                return Some(Value::from_bytes(&interp.root_code));
            }
            let idx = interp.env(env).func?;
            interp.cmds[idx].code.clone()
        }
        b"name" => {
            let env = executing_env(interp);
            if let Some(catcher_for) = &interp.env(env).catcher_for {
                return Some(catcher_for.clone());
            }
            if env == crate::interp::ROOT {
                return None;
            }
            let idx = interp.env(env).func?;
            Some(Value::from(interp.cmds[idx].name.as_str()))
        }
        _ => None,
    }
}

/// Nearest enclosing environment that is a function frame, a catcher frame,
/// or the root.
fn executing_env(interp: &Interp) -> crate::env::EnvId {
    let root = crate::interp::ROOT;
    let mut env = interp.cur;
    while env != root
        && interp.env(env).catcher_for.is_none()
        && interp.env(env).func.is_none()
    {
        match interp.env(env).parent {
            Some(parent) => env = parent,
            None => break,
        }
    }
    env
}

// ── Helpers and registration ──────────────────────────────────────────────────

fn find_bytes(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > hay.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}

pub(crate) fn register_stdcmds(interp: &mut Interp) {
    let cmds: &[(&str, HostProc)] = &[
        ("append", fnc_append),
        ("catcher", fnc_catcher),
        ("char", fnc_char),
        ("charat", fnc_charat),
        ("codeat", fnc_codeat),
        ("concat", fnc_concat),
        ("count", fnc_count),
        ("dec", fnc_dec),
        ("downeval", fnc_downeval),
        ("enveval", fnc_enveval),
        ("error", fnc_error),
        ("eval", fnc_eval),
        ("expr", fnc_expr),
        ("filter", fnc_filter),
        ("for", fnc_for),
        ("foreach", fnc_foreach),
        ("func", fnc_func),
        ("if", fnc_if),
        ("inc", fnc_inc),
        ("index", fnc_index),
        ("indexof", fnc_indexof),
        ("jaileval", fnc_jaileval),
        ("length", fnc_length),
        ("list", fnc_list),
        ("lmap", fnc_lmap),
        ("local", fnc_local),
        ("ltrim", fnc_ltrim),
        ("quote", fnc_quote),
        ("reflect", fnc_reflect),
        ("rename", fnc_rename),
        ("repstr", fnc_repstr),
        ("result", fnc_result),
        ("return", fnc_return),
        ("rtrim", fnc_rtrim),
        ("set", fnc_set),
        ("slice", fnc_slice),
        ("split", fnc_split),
        ("strcmp", fnc_strcmp),
        ("streq", fnc_streq),
        ("strpos", fnc_strpos),
        ("subst", fnc_subst),
        ("substr", fnc_substr),
        ("topeval", fnc_topeval),
        ("trim", fnc_trim),
        ("try", fnc_try),
        ("unusedname", fnc_unusedname),
        ("upeval", fnc_upeval),
        ("watch", fnc_watch),
        ("while", fnc_while),
    ];
    for (name, proc) in cmds {
        interp.register(name, *proc);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

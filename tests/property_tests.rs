use lilt::{Interp, List, Value};
use proptest::prelude::*;

proptest! {
    /// The parser never panics on arbitrary valid UTF-8 input; it either
    /// evaluates or records an error.  A recursion limit keeps pathological
    /// nesting from exhausting the stack.
    #[test]
    fn parser_does_not_panic(s in "\\PC*") {
        let result = std::panic::catch_unwind(|| {
            let mut interp = Interp::new();
            interp.set_recursion_limit(Some(32));
            let _ = interp.parse(&s, false);
            let _ = interp.error();
        });
        prop_assert!(result.is_ok());
    }
}

proptest! {
    /// List → Value → List round-trip: serializing with escaping and
    /// re-substituting yields the original entries (for entries free of
    /// control characters).
    #[test]
    fn list_value_round_trip(entries in prop::collection::vec("[ -~]{0,12}", 0..6)) {
        let list: List = entries.iter().map(|s| Value::from(s.as_str())).collect();
        let serialized = list.to_value(true);

        let mut interp = Interp::new();
        let reparsed = interp.subst_to_list(&serialized);
        prop_assert!(interp.error().is_none());

        prop_assert_eq!(reparsed.len(), list.len());
        for (a, b) in reparsed.iter().zip(list.iter()) {
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }
    }
}

proptest! {
    /// Quote transparency: `{s}` parses to a single word whose value is
    /// exactly `s` (for brace-free printable input).
    #[test]
    fn braced_literal_is_verbatim(s in "[ -z]{0,24}") {
        prop_assume!(!s.contains('{') && !s.contains('}'));
        let mut interp = Interp::new();
        let v = interp.run(&format!("quote {{{s}}}")).expect("quote failed");
        prop_assert_eq!(v.as_bytes(), s.as_bytes());
    }
}

proptest! {
    /// Dollar = set: after `set N V`, both `$N` and `[set N]` read back V.
    #[test]
    fn dollar_equals_set(name in "[a-z][a-z0-9]{0,8}", val in "[a-zA-Z0-9]{0,12}") {
        let mut interp = Interp::new();
        interp.run(&format!("set {name} {{{val}}}")).expect("set failed");
        let dollar = interp.run(&format!("quote ${name}")).expect("dollar read failed");
        let bracket = interp.run(&format!("quote [set {name}]")).expect("bracket read failed");
        prop_assert_eq!(dollar.as_bytes(), val.as_bytes());
        prop_assert_eq!(bracket.as_bytes(), val.as_bytes());
    }
}

proptest! {
    /// The expression evaluator never panics and wraps instead of
    /// overflowing, whatever the operand mix.
    #[test]
    fn expressions_do_not_panic(a in any::<i64>(), b in any::<i64>(), op in "[-+*/%]") {
        let mut interp = Interp::new();
        let src = format!("expr {a} {op} {b}");
        let _ = interp.parse(&src, false);
        let _ = interp.error();
    }
}

//! Word extraction and substitution.
//!
//! The parser shares a byte cursor with the evaluator (it lives on the
//! [`Interp`]) and produces one [`List`] of word values per command line.
//! Word forms: `$name` (dollar substitution through the configurable
//! prefix), `{…}` (verbatim braced literal), `[…]` (bracketed command,
//! evaluated with line terminators treated as whitespace), `"…"`/`'…'`
//! (quoted, with escapes and embedded `$`/`[` substitution) and bare words.
//! Adjacent word forms with no intervening whitespace concatenate into a
//! single word.

use std::rc::Rc;

use crate::interp::Interp;
use crate::value::{List, Value};

/// Characters with syntactic meaning; they terminate bare words.
fn is_special(b: u8) -> bool {
    matches!(b, b'$' | b'{' | b'}' | b'[' | b']' | b'"' | b'\'' | b';')
}

/// LF, CR and `;` separate commands.
pub(crate) fn eol_char(b: u8) -> bool {
    matches!(b, b'\n' | b'\r' | b';')
}

/// ASCII whitespace, including vertical tab.
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

impl Interp {
    /// Byte at `i`, or NUL past the end (the parser leans on this the way
    /// the usual C cursor leans on the terminator).
    fn at(&self, i: usize) -> u8 {
        self.code.get(i).copied().unwrap_or(0)
    }

    fn cur_byte(&self) -> u8 {
        self.at(self.head)
    }

    pub(crate) fn at_eol(&self) -> bool {
        !self.ignore_eol && eol_char(self.cur_byte())
    }

    /// Skip whitespace, comments (`#` to end of line, `##`…`##` multi-line,
    /// but `###` is an ordinary comment) and `\`-escaped line breaks.
    pub(crate) fn skip_spaces(&mut self) {
        while self.head < self.code.len() {
            if self.at(self.head) == b'#' {
                if self.at(self.head + 1) == b'#' && self.at(self.head + 2) != b'#' {
                    self.head += 2;
                    while self.head < self.code.len() {
                        if self.at(self.head) == b'#'
                            && self.at(self.head + 1) == b'#'
                            && self.at(self.head + 2) != b'#'
                        {
                            self.head += 2;
                            break;
                        }
                        self.head += 1;
                    }
                } else {
                    while self.head < self.code.len() && !eol_char(self.at(self.head)) {
                        self.head += 1;
                    }
                }
            } else if self.at(self.head) == b'\\' && eol_char(self.at(self.head + 1)) {
                self.head += 1;
                while self.head < self.code.len() && eol_char(self.at(self.head)) {
                    self.head += 1;
                }
            } else if eol_char(self.at(self.head)) {
                if self.ignore_eol {
                    self.head += 1;
                } else {
                    break;
                }
            } else if is_space(self.at(self.head)) {
                self.head += 1;
            } else {
                break;
            }
        }
    }

    /// `[…]`: balanced brackets, contents re-parsed as a command with line
    /// terminators treated as whitespace.
    fn bracket_part(&mut self) -> Value {
        let mut cnt = 1usize;
        let mut cmd = Value::new();
        let save_eol = self.ignore_eol;
        self.ignore_eol = false;
        self.head += 1;
        while self.head < self.code.len() {
            match self.cur_byte() {
                b'[' => {
                    self.head += 1;
                    cnt += 1;
                    cmd.push_byte(b'[');
                }
                b']' => {
                    self.head += 1;
                    cnt -= 1;
                    if cnt == 0 {
                        break;
                    }
                    cmd.push_byte(b']');
                }
                b => {
                    cmd.push_byte(b);
                    self.head += 1;
                }
            }
        }
        let val = if cnt != 0 {
            self.set_error_unbalanced(']');
            Value::new()
        } else {
            self.parse_value(&cmd, false)
        };
        self.ignore_eol = save_eol;
        val
    }

    /// `$name`: read the next word, prepend the dollar prefix and evaluate
    /// the fragment as a command.  This is how variable reads become
    /// commands.
    fn dollar_part(&mut self) -> Value {
        self.head += 1;
        let name = self.next_word();
        let mut cmd = Value::from(self.dollar_prefix.as_str());
        cmd.push_value(&name);
        self.parse_value(&cmd, false)
    }

    /// Extract one word at the cursor.  On a parse error the error slot is
    /// set and the empty value returned.
    pub(crate) fn next_word(&mut self) -> Value {
        self.skip_spaces();
        match self.cur_byte() {
            b'$' => self.dollar_part(),
            b'{' => {
                let mut cnt = 1usize;
                let mut val = Value::new();
                self.head += 1;
                while self.head < self.code.len() {
                    match self.cur_byte() {
                        b'{' => {
                            self.head += 1;
                            cnt += 1;
                            val.push_byte(b'{');
                        }
                        b'}' => {
                            self.head += 1;
                            cnt -= 1;
                            if cnt == 0 {
                                break;
                            }
                            val.push_byte(b'}');
                        }
                        b => {
                            val.push_byte(b);
                            self.head += 1;
                        }
                    }
                }
                if cnt != 0 {
                    self.set_error_unbalanced('}');
                    return Value::new();
                }
                val
            }
            b'[' => self.bracket_part(),
            quote @ (b'"' | b'\'') => {
                let mut matched = false;
                let mut val = Value::new();
                self.head += 1;
                while self.head < self.code.len() {
                    match self.cur_byte() {
                        b'[' | b'$' => {
                            let part = if self.cur_byte() == b'$' {
                                self.dollar_part()
                            } else {
                                self.bracket_part()
                            };
                            val.push_value(&part);
                            self.head -= 1; // re-advanced below
                        }
                        b'\\' => {
                            self.head += 1;
                            let b = match self.cur_byte() {
                                b'b' => 0x08,
                                b't' => b'\t',
                                b'n' => b'\n',
                                b'v' => 0x0b,
                                b'f' => 0x0c,
                                b'r' => b'\r',
                                b'0' => 0,
                                b'a' => 0x07,
                                b'c' => b'}',
                                b'o' => b'{',
                                other => other,
                            };
                            val.push_byte(b);
                        }
                        b if b == quote => {
                            matched = true;
                            self.head += 1;
                            break;
                        }
                        b => val.push_byte(b),
                    }
                    self.head += 1;
                }
                if !matched {
                    self.set_error_unbalanced(quote as char);
                    return Value::new();
                }
                val
            }
            _ => {
                let start = self.head;
                while self.head < self.code.len()
                    && !is_space(self.cur_byte())
                    && !is_special(self.cur_byte())
                {
                    self.head += 1;
                }
                Value::from_bytes(&self.code[start..self.head])
            }
        }
    }

    /// Extract one line of words.  `None` means the parser cannot make
    /// progress (a stray closing delimiter); the caller stops the current
    /// evaluation without recording an error.
    pub(crate) fn substitute(&mut self) -> Option<List> {
        let mut words = List::new();
        self.skip_spaces();
        while self.head < self.code.len() && !self.at_eol() && !self.error.is_set() {
            let mut word = Value::new();
            loop {
                let head = self.head;
                let part = self.next_word();
                if head == self.head {
                    return None;
                }
                word.push_value(&part);
                if self.head >= self.code.len()
                    || eol_char(self.cur_byte())
                    || is_space(self.cur_byte())
                    || self.error.is_set()
                {
                    break;
                }
            }
            self.skip_spaces();
            words.push(word);
        }
        Some(words)
    }

    /// Evaluate `code` as a single logical line (line terminators are
    /// whitespace) and return the resulting words.
    pub fn subst_to_list(&mut self, code: &Value) -> List {
        let save_code = Rc::clone(&self.code);
        let save_head = self.head;
        let save_eol = self.ignore_eol;

        self.code = Rc::from(code.as_bytes());
        self.head = 0;
        self.ignore_eol = true;

        let words = self.substitute().unwrap_or_default();

        self.code = save_code;
        self.head = save_head;
        self.ignore_eol = save_eol;
        words
    }

    /// Like [`subst_to_list`](Interp::subst_to_list), joined back into a
    /// single value without escaping.
    pub fn subst_to_value(&mut self, code: &Value) -> Value {
        self.subst_to_list(code).to_value(false)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Value {
        let mut interp = Interp::new();
        interp.run(src).expect("script failed")
    }

    #[test]
    fn braced_literal_is_verbatim() {
        assert_eq!(run("quote {a $b [c] ; d}"), "a $b [c] ; d");
    }

    #[test]
    fn nested_braces_balance() {
        assert_eq!(run("quote {a {b} c}"), "a {b} c");
    }

    #[test]
    fn bracket_evaluates_inline() {
        assert_eq!(run("quote [quote inner]"), "inner");
    }

    #[test]
    fn brackets_contain_multiple_commands() {
        assert_eq!(run("quote [quote a\n quote b]"), "b");
    }

    #[test]
    fn word_concatenation() {
        assert_eq!(run("set b X; quote a$b\"c\""), "aXc");
    }

    #[test]
    fn quoted_escapes() {
        assert_eq!(run("quote \"a\\tb\""), "a\tb");
        assert_eq!(run("quote \"\\o\\c\""), "{}");
        assert_eq!(run("quote \"\\q\""), "q");
    }

    #[test]
    fn quotes_substitute_embedded_parts() {
        assert_eq!(run("set x 5; quote \"x=$x y=[quote z]\""), "x=5 y=z");
    }

    #[test]
    fn single_and_double_quotes() {
        assert_eq!(run("quote 'a b'"), "a b");
        assert_eq!(run("quote \"a b\""), "a b");
    }

    #[test]
    fn semicolon_separates_commands() {
        assert_eq!(run("quote a; quote b"), "b");
    }

    #[test]
    fn line_comment() {
        assert_eq!(run("# a comment\nquote ok"), "ok");
    }

    #[test]
    fn comment_ends_at_semicolon() {
        assert_eq!(run("# comment ; quote ok"), "ok");
    }

    #[test]
    fn multiline_comment() {
        assert_eq!(run("## spans\nlines ##quote ok"), "ok");
    }

    #[test]
    fn triple_hash_is_a_plain_comment() {
        assert_eq!(run("### not multiline\nquote ok"), "ok");
    }

    #[test]
    fn line_continuation() {
        // The escaped line break joins both words onto one logical line.
        assert_eq!(run("quote a \\\nb"), "a b");
        assert_eq!(run("set l [list hello \\\n world]; count $l"), "2");
    }

    #[test]
    fn unbalanced_brace_reports_expected() {
        let mut interp = Interp::new();
        let err = interp.run("quote {oops").expect_err("should fail");
        assert_eq!(err.message, "expected }");
    }

    #[test]
    fn unbalanced_bracket_reports_expected() {
        let mut interp = Interp::new();
        let err = interp.run("quote [oops").expect_err("should fail");
        assert_eq!(err.message, "expected ]");
    }

    #[test]
    fn unterminated_quote_reports_expected() {
        let mut interp = Interp::new();
        let err = interp.run("quote \"oops").expect_err("should fail");
        assert_eq!(err.message, "expected \"");
    }

    #[test]
    fn stray_closing_brace_stops_quietly() {
        // No error is recorded; the evaluation just ends.
        let mut interp = Interp::new();
        assert_eq!(interp.run("quote ok\n} quote skipped").unwrap(), "");
    }

    #[test]
    fn subst_to_list_treats_eol_as_separator() {
        let mut interp = Interp::new();
        let list = interp.subst_to_list(&Value::from("a\nb;c"));
        let words: Vec<String> = list.iter().map(Value::to_string).collect();
        assert_eq!(words, ["a", "b", "c"]);
    }

    #[test]
    fn dollar_prefix_rewrites_reads() {
        // `$x` is sugar for `[set x]` through the configurable prefix.
        let src = "set x 42; quote $x";
        assert_eq!(run(src), "42");
    }

    #[test]
    fn dollar_dollar_resolves_twice() {
        let src = "set name x; set x deep; quote $$name";
        assert_eq!(run(src), "deep");
    }
}

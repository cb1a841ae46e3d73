//! The infix expression sub-evaluator.
//!
//! A second recursive-descent parser that runs over a string *after* it has
//! been passed through substitution, producing a signed integer.  All
//! arithmetic is `i64` with two's-complement wrap; `/` and `\` are both
//! integer division.  Non-numeric elements evaluate as 1 so that strings
//! behave as "true" in conditionals; an empty expression is 0.

use crate::interp::Interp;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExprError {
    Syntax,
    DivisionByZero,
    /// Raised by the element rule for non-numeric input; cleared at the
    /// top so the expression still yields 1.
    Invalid,
}

struct ExprEval<'a> {
    code: &'a [u8],
    head: usize,
    ival: i64,
    error: Option<ExprError>,
}

/// Punctuation that may not start the right operand of a binary operator
/// (lookahead disambiguation; the operator characters themselves and
/// parentheses are fine).
fn invalid_punct(b: u8) -> bool {
    b.is_ascii_punctuation() && !matches!(b, b'!' | b'~' | b'(' | b')' | b'-' | b'+')
}

impl<'a> ExprEval<'a> {
    fn new(code: &'a [u8]) -> Self {
        ExprEval {
            code,
            head: 0,
            ival: 0,
            error: None,
        }
    }

    fn at(&self, i: usize) -> u8 {
        self.code.get(i).copied().unwrap_or(0)
    }

    fn skip_spaces(&mut self) {
        while self.head < self.code.len() && self.at(self.head).is_ascii_whitespace() {
            self.head += 1;
        }
    }

    fn numeric_element(&mut self) {
        self.skip_spaces();
        self.ival = 0;
        while self.head < self.code.len() {
            let b = self.at(self.head);
            if !b.is_ascii_digit() {
                break;
            }
            self.ival = self.ival.wrapping_mul(10).wrapping_add((b - b'0') as i64);
            self.head += 1;
        }
    }

    fn element(&mut self) {
        if self.at(self.head).is_ascii_digit() {
            self.numeric_element();
            return;
        }
        // Anything else (usually leftover string data) counts as true.
        self.ival = 1;
        self.error = Some(ExprError::Invalid);
    }

    fn paren(&mut self) {
        self.skip_spaces();
        if self.at(self.head) == b'(' {
            self.head += 1;
            self.expr();
            self.skip_spaces();
            if self.at(self.head) == b')' {
                self.head += 1;
            } else {
                self.error = Some(ExprError::Syntax);
            }
        } else {
            self.element();
        }
    }

    fn unary(&mut self) {
        self.skip_spaces();
        if self.head < self.code.len()
            && self.error.is_none()
            && matches!(self.at(self.head), b'-' | b'+' | b'~' | b'!')
        {
            let op = self.at(self.head);
            self.head += 1;
            self.unary();
            if self.error.is_some() {
                return;
            }
            match op {
                b'-' => self.ival = self.ival.wrapping_neg(),
                b'+' => {}
                b'~' => self.ival = !self.ival,
                b'!' => self.ival = (self.ival == 0) as i64,
                _ => unreachable!(),
            }
        } else {
            self.paren();
        }
    }

    fn muldiv(&mut self) {
        self.unary();
        if self.error.is_some() {
            return;
        }
        self.skip_spaces();
        while self.head < self.code.len()
            && self.error.is_none()
            && !invalid_punct(self.at(self.head + 1))
            && matches!(self.at(self.head), b'*' | b'/' | b'\\' | b'%')
        {
            let op = self.at(self.head);
            let oival = self.ival;
            self.head += 1;
            self.unary();
            if self.error.is_some() {
                return;
            }
            match op {
                b'*' => self.ival = self.ival.wrapping_mul(oival),
                b'%' => {
                    if self.ival == 0 {
                        self.error = Some(ExprError::DivisionByZero);
                    } else {
                        self.ival = oival.wrapping_rem(self.ival);
                    }
                }
                // `/` and `\` share the same integer-division semantics.
                b'/' | b'\\' => {
                    if self.ival == 0 {
                        self.error = Some(ExprError::DivisionByZero);
                    } else {
                        self.ival = oival.wrapping_div(self.ival);
                    }
                }
                _ => unreachable!(),
            }
            self.skip_spaces();
        }
    }

    fn addsub(&mut self) {
        self.muldiv();
        self.skip_spaces();
        while self.head < self.code.len()
            && self.error.is_none()
            && !invalid_punct(self.at(self.head + 1))
            && matches!(self.at(self.head), b'+' | b'-')
        {
            let op = self.at(self.head);
            let oival = self.ival;
            self.head += 1;
            self.muldiv();
            if self.error.is_some() {
                return;
            }
            match op {
                b'+' => self.ival = oival.wrapping_add(self.ival),
                b'-' => self.ival = oival.wrapping_sub(self.ival),
                _ => unreachable!(),
            }
            self.skip_spaces();
        }
    }

    fn shift(&mut self) {
        self.addsub();
        self.skip_spaces();
        while self.head < self.code.len()
            && self.error.is_none()
            && ((self.at(self.head) == b'<' && self.at(self.head + 1) == b'<')
                || (self.at(self.head) == b'>' && self.at(self.head + 1) == b'>'))
        {
            let op = self.at(self.head);
            let oival = self.ival;
            self.head += 2;
            self.addsub();
            if self.error.is_some() {
                return;
            }
            match op {
                b'<' => self.ival = oival.wrapping_shl(self.ival as u32),
                b'>' => self.ival = oival.wrapping_shr(self.ival as u32),
                _ => unreachable!(),
            }
            self.skip_spaces();
        }
    }

    fn compare(&mut self) {
        self.shift();
        self.skip_spaces();
        loop {
            let lt = self.at(self.head) == b'<';
            let gt = self.at(self.head) == b'>';
            let next = self.at(self.head + 1);
            let op = if lt && next == b'=' {
                3
            } else if gt && next == b'=' {
                4
            } else if lt && !invalid_punct(next) {
                1
            } else if gt && !invalid_punct(next) {
                2
            } else {
                break;
            };
            if self.head >= self.code.len() || self.error.is_some() {
                break;
            }
            let oival = self.ival;
            self.head += if op > 2 { 2 } else { 1 };
            self.shift();
            if self.error.is_some() {
                return;
            }
            self.ival = match op {
                1 => (oival < self.ival) as i64,
                2 => (oival > self.ival) as i64,
                3 => (oival <= self.ival) as i64,
                _ => (oival >= self.ival) as i64,
            };
            self.skip_spaces();
        }
    }

    fn equals(&mut self) {
        self.compare();
        self.skip_spaces();
        while self.head < self.code.len()
            && self.error.is_none()
            && ((self.at(self.head) == b'=' && self.at(self.head + 1) == b'=')
                || (self.at(self.head) == b'!' && self.at(self.head + 1) == b'='))
        {
            let eq = self.at(self.head) == b'=';
            let oival = self.ival;
            self.head += 2;
            self.compare();
            if self.error.is_some() {
                return;
            }
            self.ival = if eq {
                (oival == self.ival) as i64
            } else {
                (oival != self.ival) as i64
            };
            self.skip_spaces();
        }
    }

    fn bitand(&mut self) {
        self.equals();
        self.skip_spaces();
        while self.head < self.code.len()
            && self.error.is_none()
            && self.at(self.head) == b'&'
            && !invalid_punct(self.at(self.head + 1))
        {
            let oival = self.ival;
            self.head += 1;
            self.equals();
            if self.error.is_some() {
                return;
            }
            self.ival = oival & self.ival;
            self.skip_spaces();
        }
    }

    fn bitor(&mut self) {
        self.bitand();
        self.skip_spaces();
        while self.head < self.code.len()
            && self.error.is_none()
            && self.at(self.head) == b'|'
            && !invalid_punct(self.at(self.head + 1))
        {
            let oival = self.ival;
            self.head += 1;
            self.bitand();
            if self.error.is_some() {
                return;
            }
            self.ival = oival | self.ival;
            self.skip_spaces();
        }
    }

    fn logand(&mut self) {
        self.bitor();
        self.skip_spaces();
        while self.head < self.code.len()
            && self.error.is_none()
            && self.at(self.head) == b'&'
            && self.at(self.head + 1) == b'&'
        {
            let oival = self.ival;
            self.head += 2;
            self.bitor();
            if self.error.is_some() {
                return;
            }
            self.ival = (oival != 0 && self.ival != 0) as i64;
            self.skip_spaces();
        }
    }

    fn logor(&mut self) {
        self.logand();
        self.skip_spaces();
        while self.head < self.code.len()
            && self.error.is_none()
            && self.at(self.head) == b'|'
            && self.at(self.head + 1) == b'|'
        {
            let oival = self.ival;
            self.head += 2;
            self.logand();
            if self.error.is_some() {
                return;
            }
            self.ival = (oival != 0 || self.ival != 0) as i64;
            self.skip_spaces();
        }
    }

    fn expr(&mut self) {
        self.logor();
        if self.error == Some(ExprError::Invalid) {
            // Only meant to stop the parse; non-numeric input is truthy.
            self.error = None;
            self.ival = 1;
        }
    }
}

/// Substitute `code` and evaluate the result as an expression.  Errors are
/// recorded in the interpreter's error slot and yield `None`.
pub(crate) fn eval(interp: &mut Interp, code: &Value) -> Option<Value> {
    if interp.host.interrupted() {
        interp.set_error("interrupted");
        return None;
    }

    let code = interp.subst_to_value(code);
    if interp.error.is_set() {
        return None;
    }
    if code.is_empty() {
        // An empty expression equals 0 so it reads as false in conditionals.
        return Some(Value::from(0i64));
    }

    let mut ee = ExprEval::new(code.as_bytes());
    ee.expr();
    match ee.error {
        Some(ExprError::DivisionByZero) => {
            interp.set_error("division by zero in expression");
            None
        }
        Some(_) => {
            interp.set_error("expression syntax error");
            None
        }
        None => Some(Value::from(ee.ival)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_raw(src: &str) -> Result<i64, ExprError> {
        let mut ee = ExprEval::new(src.as_bytes());
        ee.expr();
        match ee.error {
            Some(e) => Err(e),
            None => Ok(ee.ival),
        }
    }

    fn ev(src: &str) -> i64 {
        eval_raw(src).expect("expression failed")
    }

    #[test]
    fn precedence() {
        assert_eq!(ev("1 + 2 * 3"), 7);
        assert_eq!(ev("1+(2*3)"), 7);
        assert_eq!(ev("(1 + 2) * 3"), 9);
        assert_eq!(ev("1 + 2 * 3 == 7"), 1);
    }

    #[test]
    fn unary_chains() {
        assert_eq!(ev("-5"), -5);
        assert_eq!(ev("1+ ~(2*3)"), -6);
        assert_eq!(ev("~(2*3)+1"), -6);
        assert_eq!(ev("1 +~ (2*3 )"), -6);
        assert_eq!(ev("1*!(2+2)"), 0);
    }

    #[test]
    fn division_and_backslash() {
        assert_eq!(ev("10 / 3"), 3);
        assert_eq!(ev("10 \\ 3"), 3);
        assert_eq!(ev("10 % 3"), 1);
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(eval_raw("1 / 0"), Err(ExprError::DivisionByZero));
        assert_eq!(eval_raw("1 % 0"), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn logical_ops() {
        assert_eq!(ev("1 || 0 && 0"), 1);
        assert_eq!(ev("0 || 0"), 0);
        assert_eq!(ev("1 && 1"), 1);
        assert_eq!(ev("1 && 0"), 0);
    }

    #[test]
    fn bitwise_ops() {
        assert_eq!(ev("5 & 3"), 1);
        assert_eq!(ev("5 | 2"), 7);
        assert_eq!(ev("1 << 3"), 8);
        assert_eq!(ev("16 >> 2"), 4);
    }

    #[test]
    fn comparisons() {
        assert_eq!(ev("2 < 3"), 1);
        assert_eq!(ev("3 <= 3"), 1);
        assert_eq!(ev("4 > 5"), 0);
        assert_eq!(ev("5 >= 5"), 1);
        assert_eq!(ev("3 == 3"), 1);
        assert_eq!(ev("3 != 3"), 0);
    }

    #[test]
    fn non_numeric_elements_are_truthy() {
        assert_eq!(ev("hello"), 1);
        assert_eq!(ev("~!(!(  ))"), -1);
        assert_eq!(ev("1 +~*(2*3)"), 1);
    }

    #[test]
    fn unmatched_paren_is_syntax_error() {
        assert_eq!(eval_raw("(1 + 2"), Err(ExprError::Syntax));
    }

    #[test]
    fn wrapping_arithmetic() {
        assert_eq!(ev("9223372036854775807 + 1"), i64::MIN);
    }

    #[test]
    fn empty_parens_are_truthy() {
        assert_eq!(ev("()"), 1);
        assert_eq!(ev("( )"), 1);
    }
}

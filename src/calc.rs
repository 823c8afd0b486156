//! Line-number calculator for addresses such as `.+2`, `$-1` or `'a*2`.
//!
//! A small recursive descent evaluator. `+`/`-` with a missing right operand
//! count as 1, and a leading sign is relative to the current line.

use std::iter::Peekable;
use std::str::Chars;

use crate::buffer::Buffer;
use crate::cmd_result::{CmdFailure, parse_error};
use crate::marks::MarkId;

/// Evaluate `expr` against `buffer`. The result is 1-based and unclamped.
pub fn evaluate(expr: &str, buffer: &dyn Buffer) -> Result<i64, CmdFailure> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(parse_error("empty address"));
    }
    let mut calc = Calculator {
        chars: trimmed.chars().peekable(),
        buffer,
    };
    let value = if matches!(calc.chars.peek(), Some('+' | '-')) {
        let current = calc.current_line();
        calc.continue_sum(current)?
    } else {
        calc.sum()?
    };
    calc.skip_whitespace();
    if let Some(c) = calc.chars.peek() {
        return Err(parse_error(format!("unexpected '{c}' in address: {trimmed}")));
    }
    Ok(value)
}

fn too_large() -> CmdFailure {
    parse_error("number too large")
}

struct Calculator<'a> {
    chars: Peekable<Chars<'a>>,
    buffer: &'a dyn Buffer,
}

impl Calculator<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn current_line(&self) -> i64 {
        self.buffer.cursor_line() as i64 + 1
    }

    fn last_line(&self) -> i64 {
        self.buffer
            .line_count()
            .unwrap_or_else(|| self.buffer.char_to_line(self.buffer.len_chars()) + 1) as i64
    }

    fn sum(&mut self) -> Result<i64, CmdFailure> {
        let first = self.product()?;
        self.continue_sum(first)
    }

    fn continue_sum(&mut self, mut value: i64) -> Result<i64, CmdFailure> {
        loop {
            self.skip_whitespace();
            let sign: i64 = match self.chars.peek() {
                Some('+') => 1,
                Some('-') => -1,
                _ => return Ok(value),
            };
            self.chars.next();
            self.skip_whitespace();
            let operand = if self.at_operand() { self.product()? } else { 1 };
            value = sign
                .checked_mul(operand)
                .and_then(|term| value.checked_add(term))
                .ok_or_else(too_large)?;
        }
    }

    fn product(&mut self) -> Result<i64, CmdFailure> {
        let mut value = self.primary()?;
        loop {
            self.skip_whitespace();
            match self.chars.peek() {
                Some('*') => {
                    self.chars.next();
                    value = value.checked_mul(self.primary()?).ok_or_else(too_large)?;
                }
                Some('/') => {
                    self.chars.next();
                    let divisor = self.primary()?;
                    if divisor == 0 {
                        return Err(parse_error("division by zero in address"));
                    }
                    value = value.checked_div(divisor).ok_or_else(too_large)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn at_operand(&mut self) -> bool {
        matches!(self.chars.peek(), Some(&c) if c.is_ascii_digit() || matches!(c, '.' | '$' | '\'' | '('))
    }

    fn primary(&mut self) -> Result<i64, CmdFailure> {
        self.skip_whitespace();
        match self.chars.next() {
            Some(c) if c.is_ascii_digit() => {
                let mut digits = c.to_string();
                while let Some(d) = self.chars.next_if(char::is_ascii_digit) {
                    digits.push(d);
                }
                digits
                    .parse()
                    .map_err(|_| parse_error(format!("number too large: {digits}")))
            }
            Some('.') => Ok(self.current_line()),
            Some('$') => Ok(self.last_line()),
            Some('\'') => {
                let name = self.chars.next().ok_or_else(|| parse_error("missing mark name"))?;
                let id = MarkId::named(name)
                    .ok_or_else(|| parse_error(format!("invalid mark name: {name}")))?;
                let offset = self
                    .buffer
                    .mark(id)
                    .ok_or_else(|| CmdFailure::AddressUnresolved(format!("mark {name} not set")))?;
                Ok(self.buffer.char_to_line(offset) as i64 + 1)
            }
            Some('(') => {
                let value = self.sum()?;
                self.skip_whitespace();
                match self.chars.next() {
                    Some(')') => Ok(value),
                    _ => Err(parse_error("missing ) in address")),
                }
            }
            Some(c) => Err(parse_error(format!("unexpected '{c}' in address"))),
            None => Err(parse_error("incomplete address")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn frame() -> Frame {
        let mut frame = Frame::from_lines(&["one", "two", "three", "four", "five", "six"]);
        frame.set_cursor(frame.line_to_char(2));
        frame.set_mark(MarkId::Named('a'), frame.line_to_char(4));
        frame
    }

    fn eval(expr: &str) -> Result<i64, CmdFailure> {
        evaluate(expr, &frame())
    }

    #[test]
    fn symbols() {
        assert_eq!(eval("."), Ok(3));
        assert_eq!(eval("$"), Ok(6));
        assert_eq!(eval("'a"), Ok(5));
        assert_eq!(eval("42"), Ok(42));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval(".+2"), Ok(5));
        assert_eq!(eval("$-1"), Ok(5));
        assert_eq!(eval("'a - 1"), Ok(4));
        assert_eq!(eval("2*3+1"), Ok(7));
        assert_eq!(eval("$/2"), Ok(3));
        assert_eq!(eval("(1+2)*2"), Ok(6));
    }

    #[test]
    fn implicit_operands() {
        assert_eq!(eval("+"), Ok(4));
        assert_eq!(eval("-2"), Ok(1));
        assert_eq!(eval(".+"), Ok(4));
        assert_eq!(eval("$--"), Ok(4));
    }

    #[test]
    fn negative_results_are_returned_unclamped() {
        assert_eq!(eval("1-5"), Ok(-4));
    }

    #[test]
    fn errors() {
        assert!(matches!(eval("'b"), Err(CmdFailure::AddressUnresolved(_))));
        assert!(matches!(eval("4/0"), Err(CmdFailure::Parse(_))));
        assert!(matches!(eval("3x"), Err(CmdFailure::Parse(_))));
        assert!(matches!(eval("(1+2"), Err(CmdFailure::Parse(_))));
        assert!(matches!(eval(""), Err(CmdFailure::Parse(_))));
    }

    #[test]
    fn overflow_is_a_parse_error() {
        assert_eq!(eval("9223372036854775807+1"), Err(too_large()));
        assert_eq!(eval("9223372036854775807*2"), Err(too_large()));
        assert_eq!(eval("0-9223372036854775807-2"), Err(too_large()));
        assert_eq!(eval("(0-9223372036854775807-1)/(0-1)"), Err(too_large()));
        assert!(matches!(eval("99999999999999999999"), Err(CmdFailure::Parse(_))));
    }
}

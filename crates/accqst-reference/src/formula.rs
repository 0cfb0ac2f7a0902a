//! Arithmetic formulas over previously calculated variables.
//!
//! Supports numbers, `{name}` references, `+ - * / ^`, parentheses and
//! the functions `abs`, `round`, `min` and `max`.

use std::collections::BTreeMap;

use crate::error::ReferenceError;

/// Evaluate `formula` with `values` bound to `{name}` references.
pub fn evaluate(formula: &str, values: &BTreeMap<String, f64>) -> Result<f64, ReferenceError> {
    let mut parser = FormulaParser {
        source: formula,
        chars: formula.char_indices().peekable(),
        values,
    };
    let value = parser.expression()?;
    parser.skip_whitespace();
    if let Some((pos, c)) = parser.chars.peek().copied() {
        return Err(parser.error(format!("unexpected '{c}' at {pos}")));
    }
    if !value.is_finite() {
        return Err(parser.error("result is not a finite number"));
    }
    Ok(value)
}

struct FormulaParser<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    values: &'a BTreeMap<String, f64>,
}

impl FormulaParser<'_> {
    fn error(&self, reason: impl Into<String>) -> ReferenceError {
        ReferenceError::Formula {
            formula: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn eat(&mut self, wanted: char) -> bool {
        self.skip_whitespace();
        self.chars.next_if(|(_, c)| *c == wanted).is_some()
    }

    fn expect(&mut self, wanted: char) -> Result<(), ReferenceError> {
        if self.eat(wanted) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{wanted}'")))
        }
    }

    fn expression(&mut self) -> Result<f64, ReferenceError> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, ReferenceError> {
        let mut value = self.factor()?;
        loop {
            if self.eat('*') {
                value *= self.factor()?;
            } else if self.eat('/') {
                let divisor = self.factor()?;
                if divisor == 0.0 {
                    return Err(self.error("division by zero"));
                }
                value /= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    fn factor(&mut self) -> Result<f64, ReferenceError> {
        if self.eat('-') {
            return Ok(-self.factor()?);
        }
        if self.eat('+') {
            return self.factor();
        }
        let base = self.primary()?;
        if self.eat('^') {
            // right associative
            let exponent = self.factor()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, ReferenceError> {
        self.skip_whitespace();
        match self.chars.peek().copied() {
            Some((_, '(')) => {
                self.chars.next();
                let value = self.expression()?;
                self.expect(')')?;
                Ok(value)
            }
            Some((_, '{')) => {
                self.chars.next();
                let name = self.take_while(|c| c != '}');
                self.expect('}')?;
                self.values
                    .get(name.trim())
                    .copied()
                    .ok_or_else(|| ReferenceError::UnknownVariable(name.trim().to_string()))
            }
            Some((_, c)) if c.is_ascii_digit() || c == '.' => {
                let number = self.take_while(|c| c.is_ascii_digit() || c == '.');
                number
                    .parse()
                    .map_err(|_| self.error(format!("invalid number '{number}'")))
            }
            Some((_, c)) if c.is_ascii_alphabetic() => {
                let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                self.function(&name)
            }
            Some((pos, c)) => Err(self.error(format!("unexpected '{c}' at {pos}"))),
            None => Err(self.error("unexpected end of formula")),
        }
    }

    fn function(&mut self, name: &str) -> Result<f64, ReferenceError> {
        self.expect('(')?;
        let mut args = vec![self.expression()?];
        while self.eat(',') {
            args.push(self.expression()?);
        }
        self.expect(')')?;

        match (name, args.as_slice()) {
            ("abs", [x]) => Ok(x.abs()),
            ("round", [x]) => Ok(x.round()),
            ("round", [x, places]) => {
                let factor = 10f64.powi(*places as i32);
                Ok((x * factor).round() / factor)
            }
            ("min", [first, rest @ ..]) => Ok(rest.iter().fold(*first, |a, b| a.min(*b))),
            ("max", [first, rest @ ..]) => Ok(rest.iter().fold(*first, |a, b| a.max(*b))),
            _ => Err(self.error(format!(
                "unknown function {name} with {} argument(s)",
                args.len()
            ))),
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next_if(|(_, c)| keep(*c)) {
            out.push(c);
        }
        out
    }
}

//! Parsing and formatting of amounts typed by learners and authors.
//!
//! All locale-dependent coercion lives here so that scoring code only ever
//! sees `f64` values and a [`Tolerance`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Thousands delimiter used when rendering numbers for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThousandsDelim {
    #[default]
    None,
    Dot,
    Space,
    Apostrophe,
}

impl ThousandsDelim {
    /// The literal inserted between groups of three digits.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThousandsDelim::None => "",
            ThousandsDelim::Dot => ".",
            ThousandsDelim::Space => " ",
            ThousandsDelim::Apostrophe => "'",
        }
    }
}

impl fmt::Display for ThousandsDelim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThousandsDelim::None => write!(f, "none"),
            ThousandsDelim::Dot => write!(f, "dot"),
            ThousandsDelim::Space => write!(f, "space"),
            ThousandsDelim::Apostrophe => write!(f, "apostrophe"),
        }
    }
}

impl FromStr for ThousandsDelim {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(ThousandsDelim::None),
            "dot" | "." => Ok(ThousandsDelim::Dot),
            "space" | " " => Ok(ThousandsDelim::Space),
            "apostrophe" | "'" => Ok(ThousandsDelim::Apostrophe),
            other => Err(format!("unknown thousands delimiter: {other}")),
        }
    }
}

/// Separators shared by rendered amounts and the amounts learners type.
///
/// Anything rendered with [`NumberFormat::format`] parses back with
/// [`NumberFormat::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub thousands_delim: ThousandsDelim,
}

impl NumberFormat {
    pub fn new(decimal_separator: char, thousands_delim: ThousandsDelim) -> Self {
        Self {
            decimal_separator,
            thousands_delim,
        }
    }

    /// The grouping literal actually used.
    ///
    /// Empty when the delimiter is the decimal separator itself.
    pub fn grouping(&self) -> &'static str {
        let delim = self.thousands_delim.as_str();
        if delim.starts_with(self.decimal_separator) {
            ""
        } else {
            delim
        }
    }

    pub fn format(&self, value: f64, precision: u32) -> String {
        let mut sep = [0u8; 4];
        format_number(
            value,
            precision,
            self.decimal_separator.encode_utf8(&mut sep),
            self.grouping(),
        )
    }

    /// Parse learner input, dropping the grouping delimiter first.
    pub fn parse(&self, text: &str) -> f64 {
        match self.grouping().chars().next() {
            Some(delim) => {
                let ungrouped: String = text.chars().filter(|c| *c != delim).collect();
                parse_amount(&ungrouped, self.decimal_separator)
            }
            None => parse_amount(text, self.decimal_separator),
        }
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::new(',', ThousandsDelim::None)
    }
}

/// How variable values are rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayFormat {
    /// Decimal places used when a variable does not define its own.
    pub precision: u32,
    pub number: NumberFormat,
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self {
            precision: 2,
            number: NumberFormat::default(),
        }
    }
}

/// Numeric comparison with a per-question precision.
///
/// Two values are equal when they differ by less than `0.1^precision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerance {
    precision: u32,
}

impl Tolerance {
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Smallest difference that makes two values unequal.
    pub fn step(&self) -> f64 {
        0.1f64.powi(self.precision as i32)
    }

    pub fn equals(&self, a: f64, b: f64) -> bool {
        // A difference within float noise of one step counts as a full step.
        (a - b).abs() < self.step() * (1.0 - 1e-9)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Parse an amount typed with the given decimal separator.
///
/// Spaces are dropped and the other separator is treated as a thousands
/// delimiter. Only the leading numeric part is used; text without one
/// parses to `0.0`.
pub fn parse_amount(text: &str, decimal_sep: char) -> f64 {
    let other = if decimal_sep == ',' { '.' } else { ',' };
    let normalized: String = text
        .chars()
        .filter(|c| *c != ' ' && *c != other)
        .map(|c| if c == decimal_sep { '.' } else { c })
        .collect();
    leading_float(&normalized)
}

/// Longest leading `[+-]digits[.digits][e[+-]digits]` prefix as a float.
pub fn leading_float(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return 0.0;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

/// Integer coercion of free text: leading sign and digits, otherwise `0`.
///
/// `"4000: Sales"` is `4000`, `"Cash"` is `0`.
pub fn leading_int(text: &str) -> i64 {
    let s = text.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: &str = match rest.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    if digits.is_empty() {
        return 0;
    }
    match digits.parse::<i64>() {
        Ok(value) if negative => -value,
        Ok(value) => value,
        Err(_) if negative => i64::MIN,
        Err(_) => i64::MAX,
    }
}

/// Format a number with fixed decimals and grouped thousands.
///
/// Rounds half away from zero.
pub fn format_number(value: f64, precision: u32, decimal_sep: &str, thousands: &str) -> String {
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    let fixed = format!("{:.*}", precision as usize, rounded.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    let len = int_part.len();
    for (idx, digit) in int_part.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push_str(thousands);
        }
        out.push(digit);
    }
    if let Some(frac) = frac_part {
        out.push_str(decimal_sep);
        out.push_str(frac);
    }
    out
}

/// Shortest decimal representation with `.` as separator.
pub fn format_plain(value: f64) -> String {
    value.to_string()
}

//! Free-format textual values: quoting, scanning, and printf-style
//! rendering
//!
//! The canonical quoting rule: a string is written quoted when it is empty,
//! all-whitespace, contains whitespace or a double quote, or already begins
//! with one; inside quotes, `"` and `\` are backslash-escaped. The scanner
//! accepts both quoted and bare tokens and reverses the same two escapes.

use crate::error::{Result, SdfError};
use crate::types::{is_blank, ScalarType, Value};
use std::fmt::Write as _;

/// Whether a string value must be quoted on the wire
///
/// A leading `!` would otherwise scan as a comment.
pub fn needs_quoting(s: &str) -> bool {
    is_blank(s)
        || s.chars().any(|c| c.is_whitespace() || c == '"')
        || s.starts_with('"')
        || s.starts_with('!')
}

/// Append a string value, quoting and escaping as needed
pub fn push_string(out: &mut String, s: &str) {
    if !needs_quoting(s) {
        out.push_str(s);
        return;
    }
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

/// Append one value rendered with an optional printf-style format
pub fn push_value(out: &mut String, value: &Value, format: Option<&str>) {
    match value {
        Value::String(s) => push_string(out, s),
        Value::Char(c) => {
            let ch = *c as char;
            if ch.is_ascii_graphic() && ch != '!' && ch != '"' {
                out.push(ch);
            } else {
                push_string(out, &ch.to_string());
            }
        }
        _ => {
            let rendered = format
                .and_then(|f| format_with(f, value))
                .unwrap_or_else(|| value.to_plain_string());
            out.push_str(&rendered);
        }
    }
}

/// Render a numeric value with a printf-style format string
///
/// Supports the subset the toolkit actually uses: `%[-+0 #][width][.prec]`
/// with conversions `d i u f F e E g G s c`. Returns `None` when the format
/// cannot be applied, in which case the caller falls back to the default
/// rendering.
pub fn format_with(format: &str, value: &Value) -> Option<String> {
    let spec = FormatSpec::parse(format)?;
    spec.apply(value)
}

struct FormatSpec {
    left: bool,
    plus: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

impl FormatSpec {
    fn parse(format: &str) -> Option<FormatSpec> {
        let rest = format.strip_prefix('%')?;
        let mut chars = rest.chars().peekable();
        let mut spec = FormatSpec {
            left: false,
            plus: false,
            zero: false,
            width: 0,
            precision: None,
            conversion: ' ',
        };
        while let Some(&c) = chars.peek() {
            match c {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                '0' => spec.zero = true,
                ' ' | '#' => {}
                _ => break,
            }
            chars.next();
        }
        while let Some(&c) = chars.peek() {
            if let Some(d) = c.to_digit(10) {
                spec.width = spec.width * 10 + d as usize;
                chars.next();
            } else {
                break;
            }
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut prec = 0usize;
            while let Some(&c) = chars.peek() {
                if let Some(d) = c.to_digit(10) {
                    prec = prec * 10 + d as usize;
                    chars.next();
                } else {
                    break;
                }
            }
            spec.precision = Some(prec);
        }
        // length modifiers are irrelevant to the in-memory widths
        while matches!(chars.peek(), Some('h') | Some('l') | Some('L')) {
            chars.next();
        }
        spec.conversion = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Some(spec)
    }

    fn pad(&self, body: String, numeric: bool) -> String {
        if body.len() >= self.width {
            return body;
        }
        let fill = self.width - body.len();
        if self.left {
            let mut out = body;
            out.extend(std::iter::repeat(' ').take(fill));
            out
        } else if self.zero && numeric {
            // zero padding goes after any sign
            let (sign, digits) = match body.strip_prefix('-') {
                Some(d) => ("-", d),
                None => match body.strip_prefix('+') {
                    Some(d) => ("+", d),
                    None => ("", body.as_str()),
                },
            };
            let mut out = String::with_capacity(self.width);
            out.push_str(sign);
            out.extend(std::iter::repeat('0').take(fill));
            out.push_str(digits);
            out
        } else {
            let mut out = String::with_capacity(self.width);
            out.extend(std::iter::repeat(' ').take(fill));
            out.push_str(&body);
            out
        }
    }

    fn signed(&self, body: String, negative: bool) -> String {
        if self.plus && !negative {
            format!("+{body}")
        } else {
            body
        }
    }

    fn apply(&self, value: &Value) -> Option<String> {
        match self.conversion {
            'd' | 'i' | 'u' => {
                let v = value.as_i64()?;
                let body = self.signed(v.to_string(), v < 0);
                Some(self.pad(body, true))
            }
            'f' | 'F' => {
                let v = value.as_f64()?;
                let prec = self.precision.unwrap_or(6);
                let body = self.signed(format!("{v:.prec$}"), v.is_sign_negative());
                Some(self.pad(body, true))
            }
            'e' | 'E' => {
                let v = value.as_f64()?;
                let prec = self.precision.unwrap_or(6);
                let mut body = c_style_exponent(v, prec);
                if self.conversion == 'E' {
                    body = body.to_uppercase();
                }
                let body = self.signed(body, v.is_sign_negative());
                Some(self.pad(body, true))
            }
            'g' | 'G' => {
                let v = value.as_f64()?;
                let prec = self.precision.unwrap_or(6).max(1);
                let exp = if v == 0.0 {
                    0
                } else {
                    v.abs().log10().floor() as i32
                };
                let mut body = if exp < -4 || exp >= prec as i32 {
                    trim_g_zeros(&c_style_exponent(v, prec - 1), true)
                } else {
                    let frac = (prec as i32 - 1 - exp).max(0) as usize;
                    trim_g_zeros(&format!("{v:.frac$}"), false)
                };
                if self.conversion == 'G' {
                    body = body.to_uppercase();
                }
                let body = self.signed(body, v.is_sign_negative());
                Some(self.pad(body, true))
            }
            's' => {
                let mut body = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_plain_string(),
                };
                if let Some(prec) = self.precision {
                    body.truncate(prec);
                }
                Some(self.pad(body, false))
            }
            'c' => {
                let body = match value {
                    Value::Char(c) => (*c as char).to_string(),
                    Value::String(s) => s.chars().next()?.to_string(),
                    _ => return None,
                };
                Some(self.pad(body, false))
            }
            _ => None,
        }
    }
}

/// Format like C's `%e`: one leading digit, sign, two-digit exponent
fn c_style_exponent(v: f64, prec: usize) -> String {
    let raw = format!("{v:.prec$e}");
    // Rust renders "1.5e2"; rewrite the exponent as "e+02"
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            let mut out = String::with_capacity(raw.len() + 3);
            let _ = write!(out, "{mantissa}e{sign}{digits:0>2}");
            out
        }
        None => raw,
    }
}

fn trim_g_zeros(s: &str, exponent_form: bool) -> String {
    if exponent_form {
        match s.split_once('e') {
            Some((mantissa, exp)) if mantissa.contains('.') => {
                let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
                format!("{trimmed}e{exp}")
            }
            _ => s.to_string(),
        }
    } else if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// Token scanner over one logical line of page data
///
/// Bare tokens end at whitespace; quoted tokens follow the canonical
/// escape rule. A `!` outside quotes starts a comment that runs to the end
/// of the line.
pub struct TokenScanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> TokenScanner<'a> {
    pub fn new(line: &'a str) -> Self {
        TokenScanner {
            chars: line.chars().peekable(),
        }
    }

    /// Next raw token; `None` when the line is exhausted
    pub fn next_token(&mut self) -> Result<Option<String>> {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
        match self.chars.peek() {
            None => return Ok(None),
            Some('!') => return Ok(None),
            _ => {}
        }
        let mut out = String::new();
        if self.chars.peek() == Some(&'"') {
            self.chars.next();
            loop {
                match self.chars.next() {
                    None => {
                        return Err(SdfError::truncated("unterminated quoted token"));
                    }
                    Some('\\') => match self.chars.next() {
                        Some('"') => out.push('"'),
                        Some('\\') => out.push('\\'),
                        Some(c) => {
                            out.push('\\');
                            out.push(c);
                        }
                        None => {
                            return Err(SdfError::truncated("unterminated quoted token"));
                        }
                    },
                    Some('"') => break,
                    Some(c) => out.push(c),
                }
            }
        } else {
            while let Some(&c) = self.chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                out.push(c);
                self.chars.next();
            }
        }
        Ok(Some(out))
    }

    /// Next token scanned as a value of the given type
    pub fn next_value(&mut self, ty: ScalarType) -> Result<Option<Value>> {
        match self.next_token()? {
            None => Ok(None),
            Some(token) => Value::parse(&token, ty).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(value: &Value, format: Option<&str>) -> String {
        let mut out = String::new();
        push_value(&mut out, value, format);
        out
    }

    #[test]
    fn test_quoting_rule() {
        assert!(!needs_quoting("plain"));
        assert!(needs_quoting(""));
        assert!(needs_quoting("  "));
        assert!(needs_quoting("two words"));
        assert!(needs_quoting("a\"b"));
    }

    #[test]
    fn test_string_round_trip_through_scanner() {
        for s in ["plain", "", "two words", "quote\"inside", "back\\slash", " lead"] {
            let mut line = String::new();
            push_string(&mut line, s);
            let mut scanner = TokenScanner::new(&line);
            assert_eq!(scanner.next_token().unwrap().as_deref(), Some(s));
        }
    }

    #[test]
    fn test_scanner_stops_at_comment() {
        let mut scanner = TokenScanner::new("1.5 ! trailing note");
        assert_eq!(scanner.next_token().unwrap().as_deref(), Some("1.5"));
        assert_eq!(scanner.next_token().unwrap(), None);
    }

    #[test]
    fn test_default_float_rendering_round_trips() {
        for v in [0.0, 1.5, -2.25e-8, 12345.678] {
            let text = rendered(&Value::F64(v), None);
            assert_eq!(text.parse::<f64>().unwrap(), v);
        }
    }

    #[test]
    fn test_random_strings_survive_quoting() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(0x5df_0001);
        let alphabet: Vec<char> = " \t\"\\abcXYZ09!,&=".chars().collect();
        for _ in 0..500 {
            let len = rng.gen_range(0..24);
            let s: String = (0..len)
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect();
            let mut line = String::new();
            push_string(&mut line, &s);
            line.push_str(" next");
            let mut scanner = TokenScanner::new(&line);
            assert_eq!(scanner.next_token().unwrap().as_deref(), Some(s.as_str()), "{line:?}");
        }
    }

    #[test]
    fn test_random_doubles_round_trip_default_rendering() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(0x5df_0002);
        for _ in 0..500 {
            let v = f64::from_bits(rng.gen::<u64>());
            if !v.is_finite() {
                continue;
            }
            let text = rendered(&Value::F64(v), None);
            assert_eq!(text.parse::<f64>().unwrap(), v);
        }
    }

    #[test]
    fn test_printf_subset() {
        assert_eq!(format_with("%5d", &Value::I32(42)).unwrap(), "   42");
        assert_eq!(format_with("%-5d", &Value::I32(42)).unwrap(), "42   ");
        assert_eq!(format_with("%05d", &Value::I32(-42)).unwrap(), "-0042");
        assert_eq!(format_with("%.2f", &Value::F64(3.14159)).unwrap(), "3.14");
        assert_eq!(
            format_with("%10.3e", &Value::F64(1250.0)).unwrap(),
            " 1.250e+03"
        );
        assert_eq!(format_with("%g", &Value::F64(0.0001)).unwrap(), "0.0001");
        assert_eq!(format_with("%g", &Value::F64(1e7)).unwrap(), "1e+07");
        assert_eq!(format_with("%ld", &Value::I64(7)).unwrap(), "7");
    }
}

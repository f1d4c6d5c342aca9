//! Standard streams
//!
//! [`OutputBuffer`] collects everything written to `cout`. [`InputStream`]
//! holds text supplied for `cin` and extracts formatted values from it the
//! way `operator>>` does: leading whitespace is skipped, the longest valid
//! prefix is consumed, and a malformed token sets `fail` and stores zero.
//! An empty buffer blocks the reading program until more input is supplied
//! or the stream is closed.

use crate::memory::Value;
use crate::parser::ast::SourceLocation;
use crate::types::{AtomicKind, Type};

/// One write to the output stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputWrite {
    pub text: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    text: String,
    writes: Vec<OutputWrite>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, text: &str, location: SourceLocation) {
        self.text.push_str(text);
        self.writes.push(OutputWrite {
            text: text.to_string(),
            location,
        });
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn writes(&self) -> &[OutputWrite] {
        &self.writes
    }

    /// Output split into lines; a trailing newline does not start a new line
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.text.split('\n').map(str::to_string).collect();
        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        lines
    }
}

/// Error state flags of an input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoState {
    pub eof: bool,
    pub fail: bool,
    pub bad: bool,
}

impl IoState {
    pub fn good(&self) -> bool {
        !self.eof && !self.fail && !self.bad
    }
}

/// Outcome of one extraction
#[derive(Debug, Clone, PartialEq)]
pub enum InputRead {
    /// A value was extracted; `consumed` is the text taken from the buffer
    Value { value: Value, consumed: String },
    /// Extraction failed; zero is stored into the target
    Failed { value: Value },
    /// The stream was already in a failed state; the target is untouched
    Inactive,
    /// Nothing to read until more input arrives
    Blocked,
}

#[derive(Debug, Clone, Default)]
pub struct InputStream {
    buffer: String,
    state: IoState,
    closed: bool,
}

impl InputStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn supply(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// No more input will arrive; reads past the end set `eof` and `fail`
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    pub fn state(&self) -> IoState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Extract one value of type `ty`
    pub fn read(&mut self, ty: &Type) -> InputRead {
        if !self.state.good() {
            return InputRead::Inactive;
        }
        let skipped = self.buffer.len() - self.buffer.trim_start().len();
        let rest = &self.buffer[skipped..];
        if rest.is_empty() {
            if !self.closed {
                return InputRead::Blocked;
            }
            self.buffer.clear();
            self.state.eof = true;
            return self.fail(ty);
        }

        let ty = ty.cv_unqualified();
        let token_len = match ty.atomic_kind() {
            Some(AtomicKind::Char) => rest.chars().next().map_or(0, char::len_utf8),
            Some(AtomicKind::Bool) => usize::from(rest.starts_with(['0', '1'])),
            Some(AtomicKind::Int) => integer_prefix(rest),
            Some(AtomicKind::Float | AtomicKind::Double) => floating_prefix(rest),
            None => 0,
        };
        if token_len == 0 {
            return self.fail(&ty);
        }

        let token = rest[..token_len].to_string();
        let value = match ty.atomic_kind() {
            Some(AtomicKind::Char) => token.bytes().next().map(|b| Value::int(i64::from(b as i8), ty.clone())),
            Some(AtomicKind::Float | AtomicKind::Double) => token.parse::<f64>().ok().map(|f| Value::float(f, ty.clone())),
            _ => token
                .parse::<i64>()
                .ok()
                .filter(|v| *v >= i64::from(i32::MIN) && *v <= i64::from(i32::MAX))
                .map(|v| Value::int(v, ty.clone())),
        };
        let consumed: String = self.buffer.drain(..skipped + token_len).collect();
        match value {
            Some(value) => InputRead::Value { value, consumed },
            None => self.fail(&ty),
        }
    }

    fn fail(&mut self, ty: &Type) -> InputRead {
        self.state.fail = true;
        InputRead::Failed {
            value: Value::zero(ty.cv_unqualified()),
        }
    }
}

fn integer_prefix(text: &str) -> usize {
    let bytes = text.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = bytes[sign..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        0
    } else {
        sign + digits
    }
}

fn floating_prefix(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = bytes[end..].iter().take_while(|b| b.is_ascii_digit()).count();
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = bytes[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return 0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = bytes[exp_end.min(bytes.len())..].iter().take_while(|b| b.is_ascii_digit()).count();
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }
    end
}

/// Text `operator<<` writes for an atomic value (strings are handled by the caller)
pub fn format_value(value: &Value) -> String {
    match value.ty.atomic_kind() {
        Some(AtomicKind::Bool) => if value.is_true() { "1" } else { "0" }.to_string(),
        Some(AtomicKind::Char) => char::from(value.as_int() as u8).to_string(),
        Some(AtomicKind::Int) => value.as_int().to_string(),
        Some(AtomicKind::Float | AtomicKind::Double) => format_floating(value.as_float()),
        None => format!("0x{:x}", value.address()),
    }
}

/// Default `ostream` formatting of a floating value: six significant digits,
/// trailing zeros removed, scientific notation for very large or small values
pub fn format_floating(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.5e}", v);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_zeros(mantissa), sign, exponent.abs());
    }
    let decimals = (5 - exponent).max(0) as usize;
    trim_zeros(&format!("{:.*}", decimals, v)).to_string()
}

fn trim_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_lines() {
        let mut out = OutputBuffer::new();
        out.write("a", SourceLocation::new(1, 1));
        out.write("b\nc\n", SourceLocation::new(2, 1));
        assert_eq!(out.text(), "ab\nc\n");
        assert_eq!(out.lines(), vec!["ab".to_string(), "c".to_string()]);
        assert_eq!(out.writes().len(), 2);
    }

    #[test]
    fn test_format_floating() {
        assert_eq!(format_floating(3.5), "3.5");
        assert_eq!(format_floating(2.0), "2");
        assert_eq!(format_floating(0.1), "0.1");
        assert_eq!(format_floating(1.0 / 3.0), "0.333333");
        assert_eq!(format_floating(123456.0), "123456");
        assert_eq!(format_floating(1234567.0), "1.23457e+06");
        assert_eq!(format_floating(0.00001), "1e-05");
    }

    #[test]
    fn test_format_values() {
        assert_eq!(format_value(&Value::bool(true)), "1");
        assert_eq!(format_value(&Value::int(65, Type::char())), "A");
        assert_eq!(format_value(&Value::int(-4, Type::int())), "-4");
    }

    #[test]
    fn test_reads_tokens_in_order() {
        let mut input = InputStream::new();
        input.supply("  42 x 2.5\n");
        assert!(matches!(input.read(&Type::int()), InputRead::Value { value, .. } if value.as_int() == 42));
        assert!(matches!(input.read(&Type::char()), InputRead::Value { value, .. } if value.as_int() == 120));
        assert!(matches!(input.read(&Type::double()), InputRead::Value { value, .. } if value.as_float() == 2.5));
        assert_eq!(input.read(&Type::int()), InputRead::Blocked);
        assert!(input.state().good());
    }

    #[test]
    fn test_malformed_input_fails_and_stores_zero() {
        let mut input = InputStream::new();
        input.supply("abc 5");
        assert_eq!(
            input.read(&Type::int()),
            InputRead::Failed {
                value: Value::int(0, Type::int())
            }
        );
        assert!(input.state().fail);
        assert_eq!(input.read(&Type::int()), InputRead::Inactive);
        assert_eq!(input.buffered(), "abc 5");
    }

    #[test]
    fn test_closed_stream_reports_eof() {
        let mut input = InputStream::new();
        input.supply("   ");
        input.close();
        assert!(matches!(input.read(&Type::int()), InputRead::Failed { .. }));
        assert!(input.state().eof);
        assert!(input.state().fail);
    }
}

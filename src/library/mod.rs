//! Library headers and intrinsic functions
//!
//! A [`LibraryRegistry`] maps header names (`iostream`, `cmath`, ...) to a
//! [`LibraryHeader`]: source text compiled into every translation unit that
//! includes it, plus [`IntrinsicDef`]s whose bodies are host functions rather
//! than compiled constructs.
//!
//! The registry is an ordinary value. [`LibraryRegistry::standard`] builds
//! the built-in headers; callers may register more before compiling.
//!
//! # Built-in headers
//!
//! | Header    | Provides                                         |
//! |-----------|--------------------------------------------------|
//! | iostream  | `ostream`, `istream`, `cout`, `cin`, `endl`      |
//! | cassert   | `assert(bool)`                                   |
//! | cmath     | `sqrt(double)`, `pow(double, double)`, `fabs(double)` |
//! | cstdlib   | `abs(int)`                                       |

use std::fmt;

use indexmap::IndexMap;

use crate::errors::{Result, SimError};
use crate::memory::Value;
use crate::parser::ast::SourceLocation;
use crate::runtime::EventKind;
use crate::types::Type;

/// Host implementation of an intrinsic function
pub type IntrinsicFn = fn(&mut IntrinsicCall) -> Result<Option<Value>>;

/// One host-provided function
#[derive(Clone)]
pub struct IntrinsicDef {
    pub name: String,
    pub param_types: Vec<Type>,
    pub return_type: Type,
    pub operate: IntrinsicFn,
}

impl IntrinsicDef {
    pub fn new(name: &str, param_types: Vec<Type>, return_type: Type, operate: IntrinsicFn) -> Self {
        IntrinsicDef {
            name: name.to_string(),
            param_types,
            return_type,
            operate,
        }
    }
}

impl fmt::Debug for IntrinsicDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrinsicDef")
            .field("name", &self.name)
            .field("param_types", &self.param_types)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

/// Arguments and event sink handed to an intrinsic
#[derive(Debug, Clone)]
pub struct IntrinsicCall {
    pub name: String,
    pub args: Vec<Value>,
    pub location: SourceLocation,
    /// Events the intrinsic raised, reported by the runtime after it returns
    pub raised: Vec<(EventKind, String)>,
}

impl IntrinsicCall {
    pub fn new(name: impl Into<String>, args: Vec<Value>, location: SourceLocation) -> Self {
        IntrinsicCall {
            name: name.into(),
            args,
            location,
            raised: Vec::new(),
        }
    }

    pub fn raise(&mut self, kind: EventKind, message: impl Into<String>) {
        self.raised.push((kind, message.into()));
    }

    fn arg(&self, index: usize) -> Result<&Value> {
        self.args.get(index).ok_or_else(|| SimError::IntrinsicFailed {
            name: self.name.clone(),
            message: format!("missing argument {}", index + 1),
            location: self.location,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LibraryHeader {
    pub source: String,
    pub intrinsics: Vec<IntrinsicDef>,
}

#[derive(Debug, Clone, Default)]
pub struct LibraryRegistry {
    headers: IndexMap<String, LibraryHeader>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in headers
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            "iostream",
            LibraryHeader {
                source: IOSTREAM_SOURCE.to_string(),
                intrinsics: Vec::new(),
            },
        );
        registry.register(
            "cassert",
            LibraryHeader {
                source: String::new(),
                intrinsics: vec![IntrinsicDef::new("assert", vec![Type::bool()], Type::void(), assert_intrinsic)],
            },
        );
        registry.register(
            "cmath",
            LibraryHeader {
                source: String::new(),
                intrinsics: vec![
                    IntrinsicDef::new("sqrt", vec![Type::double()], Type::double(), sqrt_intrinsic),
                    IntrinsicDef::new("pow", vec![Type::double(), Type::double()], Type::double(), pow_intrinsic),
                    IntrinsicDef::new("fabs", vec![Type::double()], Type::double(), fabs_intrinsic),
                ],
            },
        );
        registry.register(
            "cstdlib",
            LibraryHeader {
                source: String::new(),
                intrinsics: vec![IntrinsicDef::new("abs", vec![Type::int()], Type::int(), abs_intrinsic)],
            },
        );
        registry
    }

    /// Add or replace a header
    pub fn register(&mut self, name: &str, header: LibraryHeader) {
        self.headers.insert(name.to_string(), header);
    }

    pub fn header(&self, name: &str) -> Option<&LibraryHeader> {
        self.headers.get(name)
    }

    pub fn header_names(&self) -> impl Iterator<Item = &str> {
        self.headers.keys().map(String::as_str)
    }
}

const IOSTREAM_SOURCE: &str = "
class ostream { char buffer_id; };
class istream { char buffer_id; };
ostream cout;
istream cin;
const char endl = '\\n';
";

/// Header names named by the `#include` lines of a source text
pub fn preprocess(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.trim_start().strip_prefix('#'))
        .filter_map(|directive| directive.trim_start().strip_prefix("include"))
        .filter_map(|rest| {
            let rest = rest.trim();
            let (open, close) = match rest.chars().next()? {
                '<' => ('<', '>'),
                '"' => ('"', '"'),
                _ => return None,
            };
            let inner = rest.strip_prefix(open)?;
            let end = inner.find(close)?;
            Some(inner[..end].trim().to_string())
        })
        .collect()
}

fn assert_intrinsic(call: &mut IntrinsicCall) -> Result<Option<Value>> {
    if !call.arg(0)?.is_true() {
        let message = format!("Assertion failed on line {}.", call.location.line);
        call.raise(EventKind::AssertionFailure, message);
    }
    Ok(None)
}

fn sqrt_intrinsic(call: &mut IntrinsicCall) -> Result<Option<Value>> {
    let x = call.arg(0)?.as_float();
    if x < 0.0 {
        call.raise(
            EventKind::ImplementationDefined,
            format!("sqrt of the negative value {} is not a number", x),
        );
    }
    Ok(Some(Value::float(x.sqrt(), Type::double())))
}

fn pow_intrinsic(call: &mut IntrinsicCall) -> Result<Option<Value>> {
    let base = call.arg(0)?.as_float();
    let exponent = call.arg(1)?.as_float();
    Ok(Some(Value::float(base.powf(exponent), Type::double())))
}

fn fabs_intrinsic(call: &mut IntrinsicCall) -> Result<Option<Value>> {
    Ok(Some(Value::float(call.arg(0)?.as_float().abs(), Type::double())))
}

fn abs_intrinsic(call: &mut IntrinsicCall) -> Result<Option<Value>> {
    let x = call.arg(0)?.as_int();
    if x == i64::from(i32::MIN) {
        call.raise(EventKind::UndefinedBehavior, "abs of the most negative int overflows");
    }
    Ok(Some(Value::int(x.wrapping_abs(), Type::int())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_collects_includes() {
        let source = "#include <iostream>\n  # include \"cmath\"\nint main() {}\n#define X 1\n";
        assert_eq!(preprocess(source), vec!["iostream".to_string(), "cmath".to_string()]);
    }

    #[test]
    fn test_standard_headers() {
        let registry = LibraryRegistry::standard();
        let names: Vec<&str> = registry.header_names().collect();
        assert_eq!(names, vec!["iostream", "cassert", "cmath", "cstdlib"]);
        assert!(registry.header("vector").is_none());
        assert!(registry
            .header("iostream")
            .is_some_and(|h| h.source.contains("ostream cout;")));
    }

    #[test]
    fn test_failed_assert_raises_event() {
        let mut call = IntrinsicCall::new("assert", vec![Value::bool(false)], SourceLocation::new(7, 3));
        let result = assert_intrinsic(&mut call);
        assert!(matches!(result, Ok(None)));
        assert_eq!(
            call.raised,
            vec![(EventKind::AssertionFailure, "Assertion failed on line 7.".to_string())]
        );

        let mut passing = IntrinsicCall::new("assert", vec![Value::bool(true)], SourceLocation::new(8, 3));
        assert!(assert_intrinsic(&mut passing).is_ok());
        assert!(passing.raised.is_empty());
    }

    #[test]
    fn test_math_intrinsics() {
        let mut call = IntrinsicCall::new("pow", vec![Value::float(2.0, Type::double()), Value::float(10.0, Type::double())], SourceLocation::default());
        let result = pow_intrinsic(&mut call).ok().flatten().map(|v| v.as_float());
        assert_eq!(result, Some(1024.0));

        let mut missing = IntrinsicCall::new("sqrt", Vec::new(), SourceLocation::default());
        assert!(matches!(sqrt_intrinsic(&mut missing), Err(SimError::IntrinsicFailed { .. })));
    }
}

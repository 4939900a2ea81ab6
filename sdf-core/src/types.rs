//! Scalar type tags, type-tagged value carriers, and numeric conversion
//!
//! The type set is closed: eight numeric widths, single characters, and
//! variable-length strings. Conversion between numeric tags follows standard
//! widening/narrowing; narrowing that would change the value is reported as
//! [`SdfError::NumericLoss`] unless the lossy variant is used.

use crate::error::{Result, SdfError};

/// Closed set of scalar types carried by parameters, columns, and arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarType {
    /// 16-bit signed integer (`short` on the wire)
    I16,
    /// 16-bit unsigned integer (`ushort` on the wire)
    U16,
    /// 32-bit signed integer (`long` on the wire)
    I32,
    /// 32-bit unsigned integer (`ulong` on the wire)
    U32,
    /// 64-bit signed integer (`long64` on the wire)
    I64,
    /// 64-bit unsigned integer (`ulong64` on the wire)
    U64,
    /// 32-bit floating point (`float` on the wire)
    F32,
    /// 64-bit floating point (`double` on the wire)
    F64,
    /// Single byte character (`character` on the wire)
    Char,
    /// Variable-length string, length-prefixed in binary mode
    String,
}

impl ScalarType {
    /// All tags in wire-token order
    pub const ALL: [ScalarType; 10] = [
        ScalarType::I16,
        ScalarType::U16,
        ScalarType::I32,
        ScalarType::U32,
        ScalarType::I64,
        ScalarType::U64,
        ScalarType::F32,
        ScalarType::F64,
        ScalarType::Char,
        ScalarType::String,
    ];

    /// Fixed encoded size in bytes; `None` for variable-length strings
    pub const fn size(self) -> Option<usize> {
        match self {
            ScalarType::I16 | ScalarType::U16 => Some(2),
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => Some(4),
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => Some(8),
            ScalarType::Char => Some(1),
            ScalarType::String => None,
        }
    }

    /// Whether the tag participates in numeric conversion
    pub const fn is_numeric(self) -> bool {
        !matches!(self, ScalarType::Char | ScalarType::String)
    }

    /// Whether the tag is one of the integer widths
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarType::I16
                | ScalarType::U16
                | ScalarType::I32
                | ScalarType::U32
                | ScalarType::I64
                | ScalarType::U64
        )
    }

    /// Whether the tag is one of the floating widths
    pub const fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    /// Wire token used in header clauses
    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::I16 => "short",
            ScalarType::U16 => "ushort",
            ScalarType::I32 => "long",
            ScalarType::U32 => "ulong",
            ScalarType::I64 => "long64",
            ScalarType::U64 => "ulong64",
            ScalarType::F32 => "float",
            ScalarType::F64 => "double",
            ScalarType::Char => "character",
            ScalarType::String => "string",
        }
    }

    /// Parse a wire token back into a tag
    pub fn from_name(name: &str) -> Option<Self> {
        ScalarType::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl core::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-tagged scalar value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(u8),
    String(String),
}

impl Value {
    /// The tag this value carries
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Value::I16(_) => ScalarType::I16,
            Value::U16(_) => ScalarType::U16,
            Value::I32(_) => ScalarType::I32,
            Value::U32(_) => ScalarType::U32,
            Value::I64(_) => ScalarType::I64,
            Value::U64(_) => ScalarType::U64,
            Value::F32(_) => ScalarType::F32,
            Value::F64(_) => ScalarType::F64,
            Value::Char(_) => ScalarType::Char,
            Value::String(_) => ScalarType::String,
        }
    }

    /// Zero / empty value for a tag
    pub fn default_for(ty: ScalarType) -> Value {
        match ty {
            ScalarType::I16 => Value::I16(0),
            ScalarType::U16 => Value::U16(0),
            ScalarType::I32 => Value::I32(0),
            ScalarType::U32 => Value::U32(0),
            ScalarType::I64 => Value::I64(0),
            ScalarType::U64 => Value::U64(0),
            ScalarType::F32 => Value::F32(0.0),
            ScalarType::F64 => Value::F64(0.0),
            ScalarType::Char => Value::Char(b' '),
            ScalarType::String => Value::String(String::new()),
        }
    }

    /// Extract as `f64`; `None` for strings
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I16(v) => Some(*v as f64),
            Value::U16(v) => Some(*v as f64),
            Value::I32(v) => Some(*v as f64),
            Value::U32(v) => Some(*v as f64),
            Value::I64(v) => Some(*v as f64),
            Value::U64(v) => Some(*v as f64),
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            Value::Char(c) => Some(*c as f64),
            Value::String(_) => None,
        }
    }

    /// Extract as `i64` when the value is an in-range integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I16(v) => Some(*v as i64),
            Value::U16(v) => Some(*v as i64),
            Value::I32(v) => Some(*v as i64),
            Value::U32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            Value::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    /// Borrow the string payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to another tag, rejecting any representation change
    ///
    /// Permitted silently: widening, integer→float, and float→float
    /// rounding (documented loss). Rejected with `NumericLoss`: integer
    /// narrowing out of range, float→integer with a fractional part or out
    /// of range, and NaN→integer. Strings convert to numerics by scanning
    /// and from numerics by default formatting.
    pub fn convert(&self, to: ScalarType) -> Result<Value> {
        self.convert_inner(to, false)
    }

    /// Convert to another tag, permitting loss
    ///
    /// Narrowing saturates at the destination range; float→integer
    /// truncates toward zero; NaN becomes zero.
    pub fn convert_lossy(&self, to: ScalarType) -> Result<Value> {
        self.convert_inner(to, true)
    }

    fn loss(&self, to: ScalarType) -> SdfError {
        SdfError::NumericLoss {
            from: self.scalar_type(),
            to,
            value: self.to_plain_string(),
        }
    }

    fn mismatch(&self, to: ScalarType) -> SdfError {
        SdfError::TypeMismatch {
            kind: crate::layout::EntityKind::Parameter,
            name: String::new(),
            declared: self.scalar_type(),
            requested: to,
        }
    }

    fn convert_inner(&self, to: ScalarType, lossy: bool) -> Result<Value> {
        if self.scalar_type() == to {
            return Ok(self.clone());
        }
        match self {
            Value::String(s) => {
                if to == ScalarType::Char {
                    return Ok(Value::Char(*s.as_bytes().first().unwrap_or(&b' ')));
                }
                let trimmed = s.trim();
                if to.is_float() {
                    let v: f64 = trimmed
                        .parse()
                        .map_err(|_| self.loss(to))?;
                    Value::F64(v).convert_inner(to, lossy)
                } else if to.is_integer() {
                    let v: i128 = trimmed
                        .parse()
                        .map_err(|_| self.loss(to))?;
                    integer_to(v, to, lossy).ok_or_else(|| self.loss(to))
                } else {
                    Err(self.mismatch(to))
                }
            }
            Value::Char(c) => match to {
                ScalarType::String => Ok(Value::String((*c as char).to_string())),
                _ if to.is_numeric() => Value::U16(*c as u16).convert_inner(to, lossy),
                _ => Err(self.mismatch(to)),
            },
            _ if to == ScalarType::String => Ok(Value::String(self.to_plain_string())),
            _ if to == ScalarType::Char => Err(self.mismatch(to)),
            Value::F32(v) => float_to(*v as f64, to, lossy).ok_or_else(|| self.loss(to)),
            Value::F64(v) => float_to(*v, to, lossy).ok_or_else(|| self.loss(to)),
            _ => {
                // remaining sources are integers
                let wide: i128 = match self {
                    Value::I16(v) => *v as i128,
                    Value::U16(v) => *v as i128,
                    Value::I32(v) => *v as i128,
                    Value::U32(v) => *v as i128,
                    Value::I64(v) => *v as i128,
                    Value::U64(v) => *v as i128,
                    _ => unreachable!(),
                };
                if to.is_float() {
                    let v = wide as f64;
                    return Ok(if to == ScalarType::F32 {
                        Value::F32(v as f32)
                    } else {
                        Value::F64(v)
                    });
                }
                integer_to(wide, to, lossy).ok_or_else(|| self.loss(to))
            }
        }
    }

    /// Default (format-string-free) textual rendering
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::I16(v) => v.to_string(),
            Value::U16(v) => v.to_string(),
            Value::I32(v) => v.to_string(),
            Value::U32(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::F32(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::Char(c) => (*c as char).to_string(),
            Value::String(s) => s.clone(),
        }
    }

    /// Scan a bare textual token into a value of the given tag
    pub fn parse(token: &str, ty: ScalarType) -> Result<Value> {
        let bad = || SdfError::truncated(format!("cannot scan {:?} as {}", token, ty));
        Ok(match ty {
            ScalarType::I16 => Value::I16(token.parse().map_err(|_| bad())?),
            ScalarType::U16 => Value::U16(token.parse().map_err(|_| bad())?),
            ScalarType::I32 => Value::I32(token.parse().map_err(|_| bad())?),
            ScalarType::U32 => Value::U32(token.parse().map_err(|_| bad())?),
            ScalarType::I64 => Value::I64(token.parse().map_err(|_| bad())?),
            ScalarType::U64 => Value::U64(token.parse().map_err(|_| bad())?),
            ScalarType::F32 => Value::F32(token.parse().map_err(|_| bad())?),
            ScalarType::F64 => Value::F64(token.parse().map_err(|_| bad())?),
            ScalarType::Char => Value::Char(*token.as_bytes().first().ok_or_else(bad)?),
            ScalarType::String => Value::String(token.to_string()),
        })
    }
}

fn integer_to(v: i128, to: ScalarType, lossy: bool) -> Option<Value> {
    macro_rules! narrow {
        ($t:ty, $ctor:ident) => {{
            match <$t>::try_from(v) {
                Ok(x) => Some(Value::$ctor(x)),
                Err(_) if lossy => Some(Value::$ctor(if v < <$t>::MIN as i128 {
                    <$t>::MIN
                } else {
                    <$t>::MAX
                })),
                Err(_) => None,
            }
        }};
    }
    match to {
        ScalarType::I16 => narrow!(i16, I16),
        ScalarType::U16 => narrow!(u16, U16),
        ScalarType::I32 => narrow!(i32, I32),
        ScalarType::U32 => narrow!(u32, U32),
        ScalarType::I64 => narrow!(i64, I64),
        ScalarType::U64 => narrow!(u64, U64),
        _ => None,
    }
}

fn float_to(v: f64, to: ScalarType, lossy: bool) -> Option<Value> {
    if to == ScalarType::F32 {
        return Some(Value::F32(v as f32));
    }
    if to == ScalarType::F64 {
        return Some(Value::F64(v));
    }
    if !to.is_integer() {
        return None;
    }
    if v.is_nan() {
        return lossy.then(|| Value::default_for(to));
    }
    let truncated = v.trunc();
    if !lossy && truncated != v {
        return None;
    }
    if truncated.abs() >= i128::MAX as f64 {
        return lossy.then(|| {
            integer_to(if v < 0.0 { i128::MIN + 1 } else { i128::MAX }, to, true).unwrap()
        });
    }
    integer_to(truncated as i128, to, lossy)
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::I16(v)
    }
}
impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}
impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Whether a string is empty or all whitespace
///
/// The textual codec quotes such values so they survive free-format
/// scanning.
pub fn is_blank(s: &str) -> bool {
    s.chars().all(|c| c.is_whitespace())
}

/// Whether a string contains any whitespace
pub fn contains_whitespace(s: &str) -> bool {
    s.chars().any(|c| c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for ty in ScalarType::ALL {
            assert_eq!(ScalarType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(ScalarType::from_name("int"), None);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(ScalarType::I16.size(), Some(2));
        assert_eq!(ScalarType::F64.size(), Some(8));
        assert_eq!(ScalarType::Char.size(), Some(1));
        assert_eq!(ScalarType::String.size(), None);
    }

    #[test]
    fn test_widening_is_silent() {
        assert_eq!(
            Value::I16(-7).convert(ScalarType::I64).unwrap(),
            Value::I64(-7)
        );
        assert_eq!(
            Value::I32(3).convert(ScalarType::F64).unwrap(),
            Value::F64(3.0)
        );
    }

    #[test]
    fn test_narrowing_out_of_range_is_loss() {
        assert!(matches!(
            Value::I32(70000).convert(ScalarType::I16),
            Err(SdfError::NumericLoss { .. })
        ));
        assert!(matches!(
            Value::I32(-1).convert(ScalarType::U32),
            Err(SdfError::NumericLoss { .. })
        ));
        // lossy variant saturates
        assert_eq!(
            Value::I32(70000).convert_lossy(ScalarType::I16).unwrap(),
            Value::I16(i16::MAX)
        );
    }

    #[test]
    fn test_float_to_integer() {
        assert_eq!(
            Value::F64(12.0).convert(ScalarType::I32).unwrap(),
            Value::I32(12)
        );
        assert!(Value::F64(12.5).convert(ScalarType::I32).is_err());
        assert_eq!(
            Value::F64(12.5).convert_lossy(ScalarType::I32).unwrap(),
            Value::I32(12)
        );
    }

    #[test]
    fn test_string_conversions() {
        assert_eq!(
            Value::from(" 42 ").convert(ScalarType::I32).unwrap(),
            Value::I32(42)
        );
        assert_eq!(
            Value::F64(1.5).convert(ScalarType::String).unwrap(),
            Value::from("1.5")
        );
        assert!(Value::from("x").convert(ScalarType::I32).is_err());
    }

    #[test]
    fn test_blank_predicates() {
        assert!(is_blank(""));
        assert!(is_blank(" \t "));
        assert!(!is_blank(" a "));
        assert!(contains_whitespace("a b"));
        assert!(!contains_whitespace("ab"));
    }
}

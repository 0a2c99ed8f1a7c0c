//! Runtime values held by the variable store.
//!
//! Slots are dynamically typed. Booleans behave as `0`/`1` wherever an
//! integer is expected; arrays never coerce to scalars.

use core::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A value: integer, boolean or growable integer array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// Signed 64-bit integer.
    Int(i64),
    /// Boolean (result of comparisons).
    Bool(bool),
    /// Flat array of integers.
    Array(Vec<i64>),
}

impl Default for Value {
    /// Unbound slots read as zero.
    fn default() -> Self {
        Self::Int(0)
    }
}

impl Value {
    /// Integer view of a scalar; `None` for arrays.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Array(_) => None,
        }
    }

    /// Truthiness: non-zero, `true`, non-empty.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Int(v) => *v != 0,
            Self::Bool(b) => *b,
            Self::Array(items) => !items.is_empty(),
        }
    }

    /// Equality as used by `=` / `!=`: scalars compare numerically, arrays
    /// element-wise, an array never equals a scalar.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Array(_), _) | (_, Self::Array(_)) => false,
            (a, b) => a.as_int() == b.as_int(),
        }
    }

    /// Short type name, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Array(_) => "array",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<i64>> for Value {
    fn from(items: Vec<i64>) -> Self {
        Self::Array(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Error returned by [`Value::from_str`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueParseError(pub String);

impl fmt::Display for ValueParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value `{}` (expected integer, true/false or [a, b, ...])", self.0)
    }
}

impl std::error::Error for ValueParseError {}

impl FromStr for Value {
    type Err = ValueParseError;

    /// Parses `42`, `-7`, `true`, `false`, `[1, 2, 3]` or `[]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ValueParseError(s.to_string());
        match s {
            "true" => return Ok(Self::Bool(true)),
            "false" => return Ok(Self::Bool(false)),
            _ => {}
        }
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            if inner.trim().is_empty() {
                return Ok(Self::Array(Vec::new()));
            }
            return inner
                .split(',')
                .map(|item| item.trim().parse::<i64>().map_err(|_| err()))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Array);
        }
        s.parse::<i64>().map(Self::Int).map_err(|_| err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bools_coerce_to_ints() {
        assert_eq!(Value::Bool(true).as_int(), Some(1));
        assert_eq!(Value::Array(vec![1]).as_int(), None);
        assert!(Value::Bool(false).loose_eq(&Value::Int(0)));
        assert!(!Value::Array(vec![0]).loose_eq(&Value::Int(0)));
    }

    #[test]
    fn parse_forms() {
        assert_eq!("42".parse::<Value>(), Ok(Value::Int(42)));
        assert_eq!(" -3 ".parse::<Value>(), Ok(Value::Int(-3)));
        assert_eq!("true".parse::<Value>(), Ok(Value::Bool(true)));
        assert_eq!("[1, 2,3]".parse::<Value>(), Ok(Value::Array(vec![1, 2, 3])));
        assert_eq!("[]".parse::<Value>(), Ok(Value::Array(vec![])));
        assert!("[1, x]".parse::<Value>().is_err());
        assert!("abc".parse::<Value>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Value::Array(vec![1, 0, 3]).to_string(), "[1, 0, 3]");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }
}

//! Parameter-group parser
//!
//! Parses one raw response or notification body into the protocol's only
//! structured-data shape: a list of rows (pipe-separated), each an ordered
//! sequence of `key=value` or bare `key` fields (space-separated).
//!
//! Splitting operates on the raw, still-escaped text: literal `|` and
//! space inside values arrive as `\p` and `\s`, so the separators are
//! unambiguous. Keys and values are decoded independently afterwards.

use crate::error::{QueryError, Result};
use crate::protocol::escape;

// =============================================================================
// Typed value coercion
// =============================================================================

/// Conversion from a decoded wire value to a semantic type
pub trait FromWireValue: Sized {
    /// Parse a decoded value string
    fn from_wire(raw: &str) -> Result<Self>;
}

impl FromWireValue for String {
    fn from_wire(raw: &str) -> Result<Self> {
        Ok(raw.to_string())
    }
}

impl FromWireValue for u32 {
    /// The server's signed 32-bit representation may overflow into a
    /// negative decimal on the wire; reinterpret the same bit pattern as
    /// unsigned instead of failing ("-1" parses as 4294967295).
    fn from_wire(raw: &str) -> Result<Self> {
        raw.parse::<u32>()
            .or_else(|_| raw.parse::<i32>().map(|v| v as u32))
            .map_err(|_| QueryError::parse("expected a 32-bit integer", raw))
    }
}

impl FromWireValue for u64 {
    /// Same bit-pattern rule as `u32`, against the signed 64-bit range
    fn from_wire(raw: &str) -> Result<Self> {
        raw.parse::<u64>()
            .or_else(|_| raw.parse::<i64>().map(|v| v as u64))
            .map_err(|_| QueryError::parse("expected a 64-bit integer", raw))
    }
}

impl FromWireValue for bool {
    fn from_wire(raw: &str) -> Result<Self> {
        match raw {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(QueryError::parse("expected a 0/1 boolean", raw)),
        }
    }
}

macro_rules! from_wire_via_fromstr {
    ($($ty:ty),*) => {
        $(
            impl FromWireValue for $ty {
                fn from_wire(raw: &str) -> Result<Self> {
                    raw.parse::<$ty>().map_err(|_| {
                        QueryError::parse(
                            concat!("expected a ", stringify!($ty), " value"),
                            raw,
                        )
                    })
                }
            }
        )*
    };
}

from_wire_via_fromstr!(i8, u8, i16, u16, i32, i64);

// =============================================================================
// Parameter groups
// =============================================================================

/// One decoded field of a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParameter {
    name: String,
    value: Option<String>,
}

impl GroupParameter {
    /// Field name (decoded)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field value (decoded), absent for bare keys
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// One row of a response or notification body
///
/// Lookup by name is case-insensitive, first match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterGroup {
    parameters: Vec<GroupParameter>,
}

impl ParameterGroup {
    /// Parse one raw (still-escaped) row
    pub fn parse(raw_row: &str) -> Self {
        let parameters = raw_row
            .split(' ')
            .filter(|token| !token.is_empty())
            .map(|token| match token.split_once('=') {
                Some((key, value)) => GroupParameter {
                    name: escape::decode(key).into_owned(),
                    value: Some(escape::decode(value).into_owned()),
                },
                None => GroupParameter {
                    name: escape::decode(token).into_owned(),
                    value: None,
                },
            })
            .collect();

        Self { parameters }
    }

    /// Ordered fields of this row
    pub fn parameters(&self) -> &[GroupParameter] {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// First field matching `name`, ignoring case
    pub fn get(&self, name: &str) -> Option<&GroupParameter> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Whether a field named `name` exists (with or without a value)
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Decoded value of the field named `name`, if present and non-bare
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|p| p.value())
    }

    /// Typed value of a required field
    ///
    /// A missing field or a bare key (no value) is a parse error.
    pub fn value_of<T: FromWireValue>(&self, name: &str) -> Result<T> {
        match self.get(name) {
            Some(parameter) => match parameter.value() {
                Some(value) => T::from_wire(value),
                None => Err(QueryError::parse(
                    format!("parameter {:?} has no value", name),
                    name,
                )),
            },
            None => Err(QueryError::parse(
                format!("missing parameter {:?}", name),
                name,
            )),
        }
    }

    /// Typed value of an optional field
    ///
    /// Absent field or bare key yields `Ok(None)`; a present value that
    /// fails to convert is still an error.
    pub fn value_of_opt<T: FromWireValue>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name).and_then(|p| p.value()) {
            Some(value) => T::from_wire(value).map(Some),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Parameter group lists
// =============================================================================

/// All rows of a response or notification body, in wire order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterGroupList {
    groups: Vec<ParameterGroup>,
}

impl ParameterGroupList {
    /// Parse a raw (still-escaped) body into rows
    ///
    /// Empty or blank input yields an empty list, never an error.
    pub fn parse(raw_body: &str) -> Self {
        if raw_body.trim().is_empty() {
            return Self::default();
        }

        let groups = raw_body
            .split('|')
            .map(ParameterGroup::parse)
            .filter(|group| !group.is_empty())
            .collect();

        Self { groups }
    }

    /// Rows in wire order
    pub fn groups(&self) -> &[ParameterGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// First row, if any
    pub fn first(&self) -> Option<&ParameterGroup> {
        self.groups.first()
    }

    pub fn get(&self, index: usize) -> Option<&ParameterGroup> {
        self.groups.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParameterGroup> {
        self.groups.iter()
    }
}

impl<'a> IntoIterator for &'a ParameterGroupList {
    type Item = &'a ParameterGroup;
    type IntoIter = std::slice::Iter<'a, ParameterGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

//! Command model
//!
//! Represents one outgoing request: a command name plus an ordered list of
//! named parameters, serialized to a single protocol line.

use crate::error::{QueryError, Result};
use crate::protocol::escape;

/// One named parameter of a command
///
/// A parameter without a value serializes as just its name (flag style,
/// e.g. the `-uid` switch of `clientlist -uid`). `encode_bare_name`
/// controls whether such a bare name goes through the wire codec; names of
/// `key=value` parameters are always encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    value: Option<String>,
    encode_bare_name: bool,
}

impl Parameter {
    /// Create a `key=value` parameter
    ///
    /// The name is trimmed and must not be empty; the value is trimmed.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        Self::build(name.into(), Some(value.into()), true)
    }

    /// Create a value-less flag parameter
    pub fn flag(name: impl Into<String>) -> Result<Self> {
        Self::build(name.into(), None, false)
    }

    /// Create a value-less parameter whose name is wire-encoded
    pub fn encoded_flag(name: impl Into<String>) -> Result<Self> {
        Self::build(name.into(), None, true)
    }

    fn build(name: String, value: Option<String>, encode_bare_name: bool) -> Result<Self> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(QueryError::InvalidArgument(
                "parameter name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            name,
            value: value.map(|v| v.trim().to_string()),
            encode_bare_name,
        })
    }

    /// Parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter value, if any
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Render this parameter as wire text
    fn serialize(&self) -> String {
        match &self.value {
            Some(value) => format!("{}={}", escape::encode(&self.name), escape::encode(value)),
            None if self.encode_bare_name => escape::encode(&self.name).into_owned(),
            None => self.name.clone(),
        }
    }
}

/// One outgoing request
///
/// Immutable once built; callers construct a fresh command per dispatch.
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    parameters: Vec<Parameter>,
}

impl Command {
    /// Create a command with no parameters
    ///
    /// The name is trimmed and must be a non-empty single token.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(QueryError::InvalidArgument(
                "command name must not be empty".to_string(),
            ));
        }
        if name.contains(char::is_whitespace) {
            return Err(QueryError::InvalidArgument(format!(
                "command name must be a single token, got {:?}",
                name
            )));
        }

        Ok(Self {
            name,
            parameters: Vec::new(),
        })
    }

    /// Append a `key=value` parameter
    pub fn arg(mut self, name: impl Into<String>, value: impl ToString) -> Result<Self> {
        self.parameters.push(Parameter::new(name, value.to_string())?);
        Ok(self)
    }

    /// Append a value-less flag parameter
    pub fn switch(mut self, name: impl Into<String>) -> Result<Self> {
        self.parameters.push(Parameter::flag(name)?);
        Ok(self)
    }

    /// Append an already-built parameter
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Command name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Render the full command line (without the line terminator)
    pub fn serialize(&self) -> String {
        let mut line = self.name.clone();
        for parameter in &self.parameters {
            line.push(' ');
            line.push_str(&parameter.serialize());
        }
        line
    }
}

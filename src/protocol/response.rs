//! Response model
//!
//! Splits a raw query message into body and status line, classifies the
//! protocol error code and ban markers, and offers typed fill helpers for
//! the three payload shapes the protocol produces (single value, entity
//! list, custom entity).

use crate::error::{QueryError, Result};
use crate::protocol::group::{FromWireValue, ParameterGroup, ParameterGroupList};
use crate::protocol::LINE_TERMINATOR;

// =============================================================================
// Sentinel error codes
// =============================================================================

/// Success
pub const ERROR_ID_OK: u32 = 0;

/// Success with an empty result set; not erroneous
pub const ERROR_ID_EMPTY_RESULT: u32 = 1281;

/// Connection/account banned
pub const ERROR_ID_BANNED: u32 = 3329;

/// Banned, with an extra message attached
pub const ERROR_ID_BANNED_WITH_MESSAGE: u32 = 3331;

// =============================================================================
// Entity construction
// =============================================================================

/// Construction of one typed entity from a body row
///
/// `defaults` is always the very first row of the response. Multi-entity
/// responses omit repeated values from later rows, so a field missing from
/// `row` may be looked up there instead.
pub trait FromGroup: Sized {
    fn from_group(row: &ParameterGroup, defaults: &ParameterGroup) -> Result<Self>;
}

// =============================================================================
// Response
// =============================================================================

/// One parsed query response
///
/// Constructed once per dispatch via [`Response::parse`]; immutable
/// thereafter. A protocol-level error (`is_erroneous`) is normal data the
/// caller inspects, not a Rust error.
#[derive(Debug, Clone)]
pub struct Response {
    error_id: u32,
    error_message: String,
    failed_permission_id: Option<u32>,
    ban_extra_message: Option<String>,
    body: Option<String>,
    status_line: String,
    raw: String,
}

impl Response {
    /// Parse a complete raw response (body rows plus status line)
    ///
    /// The last occurrence of the line terminator separates body from
    /// status; a message without a terminator is status-only.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QueryError::parse("empty response text", raw));
        }

        let (body, status_line) = match trimmed.rfind(LINE_TERMINATOR) {
            Some(index) => (
                Some(trimmed[..index].to_string()),
                &trimmed[index + LINE_TERMINATOR.len()..],
            ),
            None => (None, trimmed),
        };

        let status_groups = ParameterGroupList::parse(status_line);
        let status = status_groups.first().cloned().unwrap_or_default();

        let error_id = status.value_of_opt::<u32>("id")?.unwrap_or(ERROR_ID_OK);
        let error_message = status
            .value("msg")
            .map(str::to_string)
            .unwrap_or_default();
        let failed_permission_id = status.value_of_opt::<u32>("failed_permid")?;
        let ban_extra_message = status.value("extra_msg").map(str::to_string);

        Ok(Self {
            error_id,
            error_message,
            failed_permission_id,
            ban_extra_message,
            body,
            status_line: status_line.to_string(),
            raw: raw.to_string(),
        })
    }

    // =========================================================================
    // Status accessors
    // =========================================================================

    /// Protocol error code from the status line
    pub fn error_id(&self) -> u32 {
        self.error_id
    }

    /// Decoded error message from the status line
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Permission that caused the failure, when the server names one
    pub fn failed_permission_id(&self) -> Option<u32> {
        self.failed_permission_id
    }

    /// Whether the peer banned this connection
    pub fn is_banned(&self) -> bool {
        matches!(self.error_id, ERROR_ID_BANNED | ERROR_ID_BANNED_WITH_MESSAGE)
    }

    /// Extra message attached to a ban, if any
    pub fn ban_extra_message(&self) -> Option<&str> {
        self.ban_extra_message.as_deref()
    }

    /// Whether this response reports a protocol-level failure
    ///
    /// The empty-result sentinel counts as success; any ban counts as
    /// failure.
    pub fn is_erroneous(&self) -> bool {
        !(self.error_id == ERROR_ID_OK || self.error_id == ERROR_ID_EMPTY_RESULT)
            || self.is_banned()
    }

    // =========================================================================
    // Text accessors
    // =========================================================================

    /// Raw body text (still escaped), absent for status-only responses
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Raw status line text
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    /// The complete raw response text as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    // =========================================================================
    // Typed fill
    // =========================================================================

    /// Body rows as parameter groups (empty for status-only responses)
    pub fn groups(&self) -> ParameterGroupList {
        ParameterGroupList::parse(self.body.as_deref().unwrap_or(""))
    }

    /// Single named value from the first body row
    pub fn scalar<T: FromWireValue>(&self, name: &str) -> Result<T> {
        let groups = self.groups();
        let first = groups
            .first()
            .ok_or_else(|| self.fill_error("response has no body rows"))?;

        first
            .value_of::<T>(name)
            .map_err(|e| self.wrap_fill_error(e))
    }

    /// One typed entity per body row
    ///
    /// Each row is combined with the very first row so later rows can fall
    /// back to it for values the server only sent once.
    pub fn entities<E: FromGroup>(&self) -> Result<Vec<E>> {
        let groups = self.groups();
        let Some(defaults) = groups.first() else {
            return Ok(Vec::new());
        };

        groups
            .iter()
            .map(|row| E::from_group(row, defaults).map_err(|e| self.wrap_fill_error(e)))
            .collect()
    }

    /// Attach the full raw response text to a fill failure
    fn wrap_fill_error(&self, error: QueryError) -> QueryError {
        match error {
            QueryError::Parse { reason, .. } => QueryError::parse(reason, self.raw.clone()),
            other => other,
        }
    }

    fn fill_error(&self, reason: &str) -> QueryError {
        QueryError::parse(reason, self.raw.clone())
    }
}

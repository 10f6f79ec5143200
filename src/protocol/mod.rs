//! Protocol Module
//!
//! The text wire protocol shared by ServerQuery and ClientQuery.
//!
//! ## Wire Format
//!
//! ### Request
//! ```text
//! commandName [key[=value]]*\n\r
//! ```
//!
//! ### Response
//! ```text
//! [row[|row]*\n\r]                      zero or more body lines
//! error id=<uint> msg=<string> [extra_msg=<string>] [failed_permid=<uint>]\n\r
//! ```
//!
//! ### Notification
//! ```text
//! notify<event> key=value [key=value]*\n\r
//! ```
//!
//! Every line ends with LF+CR (in that order). Literal occurrences of the
//! terminator bytes, spaces, pipes and a few control characters inside
//! values are escaped (see [`escape`]), so the separators never collide
//! with payload data.

pub mod command;
pub mod escape;
pub mod group;
pub mod response;

pub use command::{Command, Parameter};
pub use group::{FromWireValue, GroupParameter, ParameterGroup, ParameterGroupList};
pub use response::{
    FromGroup, Response, ERROR_ID_BANNED, ERROR_ID_BANNED_WITH_MESSAGE, ERROR_ID_EMPTY_RESULT,
    ERROR_ID_OK,
};

/// The protocol line terminator: LF before CR, on both directions
pub const LINE_TERMINATOR: &str = "\n\r";

/// Decoded key prefix that marks an unsolicited notification line
pub const NOTIFICATION_PREFIX: &str = "notify";

/// First key of every status line
pub const STATUS_LINE_KEY: &str = "error";

//! # ts3query
//!
//! A client engine for the TeamSpeak 3 "Query" text protocol (ServerQuery
//! and ClientQuery), with:
//! - Wire codec for the protocol's escaped character set
//! - Command model and parameter-group response parsing
//! - Typed response classification with error/ban semantics
//! - A blocking and an event-driven dispatcher over plain TCP
//! - A notification router with typed event payloads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌────────────┐   serialize    ┌─────────────────────────────────────┐
//! │  Command   ├───────────────▶│            Dispatcher               │
//! │  (escaped) │                │  owns the socket, frames \n\r lines │
//! └────────────┘                │  one command in flight at a time    │
//!                               └───────┬──────────────────┬──────────┘
//!                                response│        unsolicited│
//!                                       ▼                  ▼
//!                               ┌──────────────┐   ┌────────────────────┐
//!                               │   Response   │   │ NotificationRouter │
//!                               │ (status/ban) │   │ (typed handlers)   │
//!                               └──────────────┘   └────────────────────┘
//! ```
//!
//! The protocol allows exactly one outstanding request per socket; both
//! dispatchers enforce that, while unsolicited notifications interleave
//! freely with the pending response.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod dispatch;
pub mod notify;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{QueryError, Result};
pub use config::{Config, QueryFlavor};

pub use protocol::{
    Command, FromGroup, FromWireValue, Parameter, ParameterGroup, ParameterGroupList, Response,
};
pub use dispatch::{
    BlockingDispatcher, CloseReason, Dispatch, DispatchEvents, EventDispatcher, PendingReply,
};
pub use notify::{HandlerId, Notification, NotificationEvent, NotificationRouter, RouteOutcome};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ts3query
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Dispatch Module
//!
//! Connection ownership, framing and message classification.
//!
//! ## Architecture
//! - One dispatcher exclusively owns one TCP connection
//! - At most one command in flight per connection (the protocol does not
//!   support client-side pipelining)
//! - Inbound lines are classified as notification, status line or body
//!   line; a status line completes the pending response
//!
//! Two variants implement the same contract: [`BlockingDispatcher`]
//! performs socket I/O on the caller's thread, [`EventDispatcher`] runs a
//! reader thread and hands out reply handles.

mod blocking;
mod framer;
mod threaded;

pub use blocking::BlockingDispatcher;
pub use framer::LineFramer;
pub use threaded::{EventDispatcher, PendingReply};

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::Config;
use crate::error::{QueryError, Result};
use crate::protocol::{escape, Command, Response, NOTIFICATION_PREFIX, STATUS_LINE_KEY};

// =============================================================================
// Dispatch contract
// =============================================================================

/// The dispatch contract shared by both transport variants
pub trait Dispatch {
    /// Send a command and wait for its complete raw response text
    fn dispatch(&self, command: &Command) -> Result<String>;

    /// Send raw command text and wait for its complete raw response text
    fn dispatch_raw(&self, raw: &str) -> Result<String>;

    /// Whether this dispatcher has been disposed
    fn is_disposed(&self) -> bool;

    /// Tear down the connection without disposing the dispatcher
    ///
    /// Any dispatch blocked on the connection is released with a
    /// connection-lost outcome; no close event fires for a deliberate
    /// local disconnect. Idempotent.
    fn disconnect(&self);

    /// Tear down the connection and mark the dispatcher disposed
    ///
    /// Idempotent; any dispatch blocked on the connection is released.
    fn dispose(&self);
}

/// Why the connection went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the connection gracefully
    PeerClosed,

    /// A socket error terminated the session
    SocketError,

    /// The peer banned this connection
    Banned,
}

/// Event sink for dispatcher signals
///
/// All methods default to no-ops; implementors override the ones they
/// care about. The event-driven dispatcher invokes these on its reader
/// thread; callers must not assume any particular thread.
pub trait DispatchEvents: Send + Sync {
    /// Connection established and greeting consumed; commands may be sent
    fn ready(&self) {}

    /// A response carried one of the ban sentinel codes
    ///
    /// The dispatcher disconnects right after this returns.
    fn banned(&self, _response: &Response) {}

    /// The session ended; fired exactly once per connection
    fn connection_closed(&self, _reason: CloseReason) {}

    /// The socket error that ended the session, when there was one
    fn socket_error(&self, _error: &io::Error) {}

    /// An unsolicited notification line arrived (raw, still escaped)
    fn notification(&self, _raw: &str) {}
}

/// Sink that ignores every signal
impl DispatchEvents for () {}

// =============================================================================
// Shared connection plumbing
// =============================================================================

/// Lifecycle of a dispatcher connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchState {
    Disconnected,
    Connecting,
    Ready,
}

/// Classification of one framed inbound line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineClass {
    /// Unsolicited push, routed independently of any pending command
    Notification,

    /// Status line; terminates the pending response
    Status,

    /// Body line of the pending response
    Body,
}

/// Classify a framed line by the decoded key of its first field
///
/// The ClientQuery `selected schandlerid=N` push is not `notify`-prefixed
/// but is equally unsolicited; it goes down the notification path so it
/// can never be merged into a pending response.
pub(crate) fn classify_line(line: &str) -> LineClass {
    let first_token = line.split(' ').next().unwrap_or("");
    let raw_key = first_token.split('=').next().unwrap_or("");
    let key = escape::decode(raw_key);

    let has_notify_prefix = key
        .get(..NOTIFICATION_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(NOTIFICATION_PREFIX));

    if has_notify_prefix {
        LineClass::Notification
    } else if key.eq_ignore_ascii_case("selected") {
        LineClass::Notification
    } else if key.eq_ignore_ascii_case(STATUS_LINE_KEY) {
        LineClass::Status
    } else {
        LineClass::Body
    }
}

/// Banner prefix both flavors send as their first greeting line
pub(crate) const GREETING_BANNER_PREFIX: &str = "TS3";

/// Open the TCP connection per the config
pub(crate) fn open_stream(config: &Config) -> Result<TcpStream> {
    let addr = config
        .addr()
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| QueryError::InvalidArgument(format!("unresolvable host {:?}", config.host)))?;

    let stream = if config.connect_timeout_ms > 0 {
        TcpStream::connect_timeout(&addr, Duration::from_millis(config.connect_timeout_ms))?
    } else {
        TcpStream::connect(addr)?
    };

    // Query traffic is small request/response lines; don't batch them
    stream.set_nodelay(true)?;

    if config.write_timeout_ms > 0 {
        stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
    }

    Ok(stream)
}

/// Consume the greeting: one banner line plus one welcome line
///
/// The banner must start with `TS3` (`TS3 Client` for ClientQuery); any
/// other first line means this is not a query peer and the connect fails.
pub(crate) fn read_greeting(stream: &mut TcpStream, framer: &mut LineFramer) -> Result<()> {
    let banner = read_framed_line(stream, framer)?;
    if !banner.starts_with(GREETING_BANNER_PREFIX) {
        return Err(QueryError::Protocol(format!(
            "unexpected greeting banner {:?}",
            banner
        )));
    }

    let welcome = read_framed_line(stream, framer)?;
    tracing::debug!(banner = %banner, welcome = %welcome, "greeting consumed");

    Ok(())
}

/// Block until the framer yields one complete line
fn read_framed_line(stream: &mut TcpStream, framer: &mut LineFramer) -> Result<String> {
    use std::io::Read;

    loop {
        if let Some(line) = framer.next_line() {
            return Ok(line);
        }

        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(QueryError::ConnectionLost);
        }
        framer.extend(&buf[..n]);
    }
}

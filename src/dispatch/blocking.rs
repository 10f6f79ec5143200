//! Blocking dispatcher
//!
//! Performs all socket I/O on the caller's thread: `dispatch` suspends the
//! caller until the full response has been framed. The connection mutex is
//! held for the whole round trip, so a second concurrent `dispatch` simply
//! blocks until the first completes; the single-in-flight invariant falls
//! out of the locking.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::dispatch::{
    classify_line, open_stream, read_greeting, CloseReason, Dispatch, DispatchEvents,
    DispatchState, LineClass, LineFramer,
};
use crate::error::{QueryError, Result};
use crate::protocol::{Command, Response, LINE_TERMINATOR};

/// Socket plus framer, locked together for a full round trip
struct Io {
    stream: TcpStream,
    framer: LineFramer,
}

/// Lifecycle state, lockable without waiting on an in-flight dispatch
struct Control {
    state: DispatchState,

    /// Cloned handle used to shut the socket down from another thread
    shutdown: Option<TcpStream>,

    /// The first close/error transition reports exactly once; a reset
    /// arriving right after a close must not double-report
    fault_reported: bool,
}

/// Synchronous dispatcher over a blocking [`TcpStream`]
pub struct BlockingDispatcher {
    io: Mutex<Io>,
    control: Mutex<Control>,
    events: Arc<dyn DispatchEvents>,
    disposed: AtomicBool,
}

impl BlockingDispatcher {
    /// Connect, consume the greeting and become ready for commands
    ///
    /// Fires `ready` on the event sink before returning. No command can be
    /// sent before that transition because no dispatcher exists yet.
    pub fn connect(config: &Config, events: Arc<dyn DispatchEvents>) -> Result<Self> {
        tracing::debug!(addr = %config.addr(), flavor = ?config.flavor, "connecting");

        let mut stream = open_stream(config)?;

        // Guard the greeting with the connect timeout when no read timeout
        // is configured, so a silent peer cannot hang the constructor
        let greeting_timeout = match (config.read_timeout_ms, config.connect_timeout_ms) {
            (0, 0) => None,
            (0, connect) => Some(Duration::from_millis(connect)),
            (read, _) => Some(Duration::from_millis(read)),
        };
        stream.set_read_timeout(greeting_timeout)?;

        let mut framer = LineFramer::new();
        read_greeting(&mut stream, &mut framer)?;

        let read_timeout = if config.read_timeout_ms > 0 {
            Some(Duration::from_millis(config.read_timeout_ms))
        } else {
            None
        };
        stream.set_read_timeout(read_timeout)?;

        let shutdown = stream.try_clone()?;
        let dispatcher = Self {
            io: Mutex::new(Io { stream, framer }),
            control: Mutex::new(Control {
                state: DispatchState::Connecting,
                shutdown: Some(shutdown),
                fault_reported: false,
            }),
            events,
            disposed: AtomicBool::new(false),
        };

        dispatcher.control.lock().state = DispatchState::Ready;
        tracing::debug!(addr = %config.addr(), "ready for commands");
        dispatcher.events.ready();

        Ok(dispatcher)
    }

    /// Transition to Disconnected and report the fault exactly once
    fn fault(&self, reason: CloseReason, error: Option<&std::io::Error>) {
        let mut control = self.control.lock();
        control.state = DispatchState::Disconnected;
        if let Some(handle) = control.shutdown.take() {
            let _ = handle.shutdown(Shutdown::Both);
        }

        if control.fault_reported {
            tracing::trace!(?reason, "suppressing duplicate fault report");
            return;
        }
        control.fault_reported = true;
        drop(control);

        match reason {
            CloseReason::PeerClosed => {
                tracing::debug!("peer closed the connection");
                self.events.connection_closed(CloseReason::PeerClosed);
            }
            CloseReason::SocketError => {
                if let Some(e) = error {
                    tracing::warn!(error = %e, "socket error");
                    self.events.socket_error(e);
                }
                self.events.connection_closed(CloseReason::SocketError);
            }
            CloseReason::Banned => {
                tracing::warn!("disconnecting after ban");
                self.events.connection_closed(CloseReason::Banned);
            }
        }
    }

    /// Run one full request/response round trip with the io lock held
    fn round_trip(&self, io: &mut Io, line: &str) -> Result<String> {
        tracing::trace!(command = %line, "sending");
        io.stream.write_all(line.as_bytes())?;
        io.stream.write_all(LINE_TERMINATOR.as_bytes())?;
        io.stream.flush()?;

        let mut response_lines: Vec<String> = Vec::new();

        loop {
            while let Some(framed) = io.framer.next_line() {
                match classify_line(&framed) {
                    LineClass::Notification => {
                        tracing::debug!(line = %framed, "notification during dispatch");
                        self.events.notification(&framed);
                    }
                    LineClass::Body => response_lines.push(framed),
                    LineClass::Status => {
                        response_lines.push(framed);
                        return Ok(response_lines.join(LINE_TERMINATOR));
                    }
                }
            }

            let mut buf = [0u8; 4096];
            let n = io.stream.read(&mut buf)?;
            if n == 0 {
                return Err(QueryError::ConnectionLost);
            }
            io.framer.extend(&buf[..n]);
        }
    }
}

impl Dispatch for BlockingDispatcher {
    fn dispatch(&self, command: &Command) -> Result<String> {
        self.dispatch_raw(&command.serialize())
    }

    /// Send one command line and block until its response is framed
    ///
    /// A timeout (configured read timeout elapsing) aborts the wait but
    /// leaves request/response alignment broken; tear the session down
    /// rather than dispatching again after one.
    fn dispatch_raw(&self, raw: &str) -> Result<String> {
        if self.is_disposed() {
            return Err(QueryError::Disposed);
        }

        let line = raw.trim();
        if line.is_empty() {
            return Err(QueryError::InvalidArgument(
                "command text must not be empty".to_string(),
            ));
        }

        // Taken for the whole round trip: this is the single-in-flight
        // invariant for the blocking variant
        let mut io = self.io.lock();

        if self.control.lock().state != DispatchState::Ready {
            return Err(QueryError::NotReady);
        }

        match self.round_trip(&mut io, line) {
            Ok(text) => {
                drop(io);
                if let Ok(response) = Response::parse(&text) {
                    if response.is_banned() {
                        self.events.banned(&response);
                        self.fault(CloseReason::Banned, None);
                    }
                }
                Ok(text)
            }
            Err(QueryError::ConnectionLost) => {
                drop(io);
                self.fault(CloseReason::PeerClosed, None);
                Err(QueryError::ConnectionLost)
            }
            Err(QueryError::Io(e)) => {
                drop(io);
                match e.kind() {
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                        tracing::warn!("dispatch timed out waiting for a response");
                        Err(QueryError::Timeout)
                    }
                    _ => {
                        self.fault(CloseReason::SocketError, Some(&e));
                        Err(QueryError::ConnectionLost)
                    }
                }
            }
            Err(other) => Err(other),
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn disconnect(&self) {
        let mut control = self.control.lock();
        control.state = DispatchState::Disconnected;
        // Suppress the read error the shutdown provokes in any blocked
        // dispatch; this close is deliberate
        control.fault_reported = true;
        if let Some(handle) = control.shutdown.take() {
            let _ = handle.shutdown(Shutdown::Both);
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.disconnect();
    }
}

impl Drop for BlockingDispatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

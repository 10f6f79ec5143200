//! Event-driven dispatcher
//!
//! A reader thread owns the inbound half of the connection and delivers
//! completions through channels: `dispatch` hands back a [`PendingReply`]
//! immediately, and commands issued while one is in flight are queued and
//! transmitted in FIFO order by the completion path. Event callbacks run
//! on the reader thread; callers must not assume otherwise.
//!
//! Caller deadlines belong on [`PendingReply::wait_timeout`]; the
//! configured socket read timeout is not used by this variant (the reader
//! only wakes early for keep-alive scheduling).

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::Config;
use crate::dispatch::{
    classify_line, open_stream, read_greeting, CloseReason, Dispatch, DispatchEvents,
    DispatchState, LineClass, LineFramer,
};
use crate::error::{QueryError, Result};
use crate::protocol::{Command, Response, LINE_TERMINATOR};

/// Handle to a response that has not necessarily arrived yet
pub struct PendingReply {
    rx: Receiver<Result<String>>,
}

impl PendingReply {
    /// Block until the response is framed (or the connection dies)
    pub fn wait(self) -> Result<String> {
        match self.rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(QueryError::ConnectionLost),
        }
    }

    /// Block with a deadline; elapsing yields a timeout error
    ///
    /// The dispatcher itself is unaffected and can still be disconnected
    /// or disposed afterwards.
    pub fn wait_timeout(self, timeout: Duration) -> Result<String> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(QueryError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(QueryError::ConnectionLost),
        }
    }

    /// Non-blocking poll
    pub fn try_wait(&self) -> Option<Result<String>> {
        self.rx.try_recv().ok()
    }
}

/// The command currently on the wire
struct InFlight {
    reply: Sender<Result<String>>,
    lines: Vec<String>,
}

/// A command waiting for the wire to free up
struct Waiting {
    line: String,
    reply: Sender<Result<String>>,
}

#[derive(Default)]
struct Queue {
    in_flight: Option<InFlight>,
    waiting: VecDeque<Waiting>,
}

struct Control {
    state: DispatchState,
    shutdown: Option<TcpStream>,
    fault_reported: bool,
}

struct Shared {
    events: Arc<dyn DispatchEvents>,
    writer: Mutex<Option<TcpStream>>,
    queue: Mutex<Queue>,
    control: Mutex<Control>,
    disposed: AtomicBool,
}

impl Shared {
    /// Write one command line; queue lock must not be held
    fn transmit(&self, line: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        let Some(stream) = writer.as_mut() else {
            return Err(QueryError::ConnectionLost);
        };

        tracing::trace!(command = %line, "sending");
        stream.write_all(line.as_bytes())?;
        stream.write_all(LINE_TERMINATOR.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    /// Release every pending and queued reply with a connection-lost outcome
    fn release_all(&self) {
        let mut queue = self.queue.lock();
        let in_flight = queue.in_flight.take();
        let waiting = std::mem::take(&mut queue.waiting);
        drop(queue);

        if let Some(in_flight) = in_flight {
            let _ = in_flight.reply.send(Err(QueryError::ConnectionLost));
        }
        for waiting in waiting {
            let _ = waiting.reply.send(Err(QueryError::ConnectionLost));
        }
    }

    /// Transition to Disconnected, report the fault once, release replies
    fn fault(&self, reason: CloseReason, error: Option<&std::io::Error>) {
        let report = {
            let mut control = self.control.lock();
            control.state = DispatchState::Disconnected;
            if let Some(handle) = control.shutdown.take() {
                let _ = handle.shutdown(Shutdown::Both);
            }
            let first = !control.fault_reported;
            control.fault_reported = true;
            first
        };

        *self.writer.lock() = None;

        if report && !self.disposed.load(Ordering::SeqCst) {
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
        } else if !report {
            tracing::trace!(?reason, "suppressing duplicate fault report");
        }

        self.release_all();
    }

    /// Route one framed line
    fn handle_line(&self, line: String) {
        match classify_line(&line) {
            LineClass::Notification => {
                tracing::debug!(line = %line, "notification");
                self.events.notification(&line);
            }
            LineClass::Body => {
                let mut queue = self.queue.lock();
                match queue.in_flight.as_mut() {
                    Some(in_flight) => in_flight.lines.push(line),
                    None => {
                        tracing::warn!(line = %line, "dropping body line outside any dispatch")
                    }
                }
            }
            LineClass::Status => self.complete_response(line),
        }
    }

    /// A status line terminates the pending response
    fn complete_response(&self, status_line: String) {
        let mut queue = self.queue.lock();
        let Some(mut in_flight) = queue.in_flight.take() else {
            drop(queue);
            tracing::warn!(line = %status_line, "dropping status line outside any dispatch");
            return;
        };

        in_flight.lines.push(status_line);
        let text = in_flight.lines.join(LINE_TERMINATOR);

        // Ban terminates the session; whatever is queued can never be sent
        if let Ok(response) = Response::parse(&text) {
            if response.is_banned() {
                drop(queue);
                let _ = in_flight.reply.send(Ok(text));
                self.events.banned(&response);
                self.fault(CloseReason::Banned, None);
                return;
            }
        }

        // Start the next queued command before releasing the lock so no
        // later dispatch can overtake it
        let mut next_line = None;
        if let Some(waiting) = queue.waiting.pop_front() {
            queue.in_flight = Some(InFlight {
                reply: waiting.reply,
                lines: Vec::new(),
            });
            next_line = Some(waiting.line);
        }
        drop(queue);

        let _ = in_flight.reply.send(Ok(text));

        if let Some(line) = next_line {
            if let Err(e) = self.transmit(&line) {
                match e {
                    QueryError::Io(io_err) => self.fault(CloseReason::SocketError, Some(&io_err)),
                    _ => self.fault(CloseReason::SocketError, None),
                }
            }
        }
    }
}

/// Non-blocking dispatcher backed by a reader thread
pub struct EventDispatcher {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    reader_thread: ThreadId,
}

impl EventDispatcher {
    /// Connect, consume the greeting, start the reader thread
    ///
    /// Fires `ready` on the event sink once commands may be sent.
    pub fn connect(config: &Config, events: Arc<dyn DispatchEvents>) -> Result<Self> {
        tracing::debug!(addr = %config.addr(), flavor = ?config.flavor, "connecting");

        let mut stream = open_stream(config)?;

        let greeting_timeout = if config.connect_timeout_ms > 0 {
            Some(Duration::from_millis(config.connect_timeout_ms))
        } else {
            None
        };
        stream.set_read_timeout(greeting_timeout)?;

        let mut framer = LineFramer::new();
        read_greeting(&mut stream, &mut framer)?;

        let keep_alive = if config.keep_alive_interval_ms > 0 {
            Some(Duration::from_millis(config.keep_alive_interval_ms))
        } else {
            None
        };
        // The reader blocks indefinitely unless it must wake for keep-alive
        stream.set_read_timeout(keep_alive)?;

        let writer = stream.try_clone()?;
        let shutdown = stream.try_clone()?;

        let shared = Arc::new(Shared {
            events,
            writer: Mutex::new(Some(writer)),
            queue: Mutex::new(Queue::default()),
            control: Mutex::new(Control {
                state: DispatchState::Connecting,
                shutdown: Some(shutdown),
                fault_reported: false,
            }),
            disposed: AtomicBool::new(false),
        });

        // Must be Ready before the reader starts; its loop exits on any
        // other state
        shared.control.lock().state = DispatchState::Ready;

        let reader_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("ts3query-reader".to_string())
            .spawn(move || read_loop(reader_shared, stream, framer, keep_alive))?;
        let reader_thread = handle.thread().id();

        tracing::debug!(addr = %config.addr(), "ready for commands");
        shared.events.ready();

        Ok(Self {
            shared,
            reader: Mutex::new(Some(handle)),
            reader_thread,
        })
    }

    /// Submit a command; the reply arrives through the returned handle
    pub fn dispatch_async(&self, command: &Command) -> Result<PendingReply> {
        self.dispatch_raw_async(&command.serialize())
    }

    /// Submit raw command text; the reply arrives through the returned handle
    ///
    /// If another command is in flight this one is queued and transmitted
    /// in dispatch order once the wire frees up.
    pub fn dispatch_raw_async(&self, raw: &str) -> Result<PendingReply> {
        if self.is_disposed() {
            return Err(QueryError::Disposed);
        }

        let line = raw.trim();
        if line.is_empty() {
            return Err(QueryError::InvalidArgument(
                "command text must not be empty".to_string(),
            ));
        }

        if self.shared.control.lock().state != DispatchState::Ready {
            return Err(QueryError::NotReady);
        }

        let (tx, rx) = bounded(1);
        let transmit_now = {
            let mut queue = self.shared.queue.lock();
            if queue.in_flight.is_none() {
                queue.in_flight = Some(InFlight {
                    reply: tx,
                    lines: Vec::new(),
                });
                true
            } else {
                tracing::trace!(command = %line, "queueing behind in-flight command");
                queue.waiting.push_back(Waiting {
                    line: line.to_string(),
                    reply: tx,
                });
                false
            }
        };

        if transmit_now {
            if let Err(e) = self.shared.transmit(line) {
                match e {
                    QueryError::Io(io_err) => {
                        self.shared.fault(CloseReason::SocketError, Some(&io_err))
                    }
                    _ => self.shared.fault(CloseReason::SocketError, None),
                }
                return Err(QueryError::ConnectionLost);
            }
        }

        Ok(PendingReply { rx })
    }

}

impl Dispatch for EventDispatcher {
    fn dispatch(&self, command: &Command) -> Result<String> {
        self.dispatch_async(command)?.wait()
    }

    fn dispatch_raw(&self, raw: &str) -> Result<String> {
        self.dispatch_raw_async(raw)?.wait()
    }

    fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    fn disconnect(&self) {
        {
            let mut control = self.shared.control.lock();
            control.state = DispatchState::Disconnected;
            control.fault_reported = true;
            if let Some(handle) = control.shutdown.take() {
                let _ = handle.shutdown(Shutdown::Both);
            }
        }
        *self.shared.writer.lock() = None;
        self.shared.release_all();
    }

    fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.disconnect();

        // Joining from a reader-thread callback would deadlock
        if thread::current().id() != self.reader_thread {
            if let Some(handle) = self.reader.lock().take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

// =============================================================================
// Reader thread
// =============================================================================

fn read_loop(
    shared: Arc<Shared>,
    mut stream: TcpStream,
    mut framer: LineFramer,
    keep_alive: Option<Duration>,
) {
    let mut last_activity = Instant::now();

    loop {
        while let Some(line) = framer.next_line() {
            shared.handle_line(line);
        }

        if shared.control.lock().state != DispatchState::Ready {
            break;
        }

        let mut buf = [0u8; 4096];
        match stream.read(&mut buf) {
            Ok(0) => {
                shared.fault(CloseReason::PeerClosed, None);
                break;
            }
            Ok(n) => {
                framer.extend(&buf[..n]);
                last_activity = Instant::now();
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                if let Some(interval) = keep_alive {
                    if last_activity.elapsed() >= interval && send_keep_alive(&shared) {
                        last_activity = Instant::now();
                    }
                }
            }
            Err(e) => {
                shared.fault(CloseReason::SocketError, Some(&e));
                break;
            }
        }
    }

    tracing::debug!("reader thread exiting");
}

/// Send a `whoami` probe when the wire is idle; its reply is discarded
fn send_keep_alive(shared: &Shared) -> bool {
    let (tx, _discard) = bounded::<Result<String>>(1);
    {
        let mut queue = shared.queue.lock();
        if queue.in_flight.is_some() || !queue.waiting.is_empty() {
            return false;
        }
        queue.in_flight = Some(InFlight {
            reply: tx,
            lines: Vec::new(),
        });
    }

    tracing::trace!("sending keep-alive probe");
    if let Err(e) = shared.transmit("whoami") {
        match e {
            QueryError::Io(io_err) => shared.fault(CloseReason::SocketError, Some(&io_err)),
            _ => shared.fault(CloseReason::SocketError, None),
        }
        return false;
    }
    true
}

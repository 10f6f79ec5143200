//! Dispatcher tests
//!
//! Framing, classification, single-in-flight behavior, ban handling and
//! connection-fault reporting, exercised against a scripted in-process
//! TCP peer.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};

use ts3query::dispatch::LineFramer;
use ts3query::{
    BlockingDispatcher, CloseReason, Command, Config, Dispatch, DispatchEvents, EventDispatcher,
    QueryError, Response,
};

// =============================================================================
// Scripted peer
// =============================================================================

const GREETING: &str =
    "TS3\n\rWelcome to the TeamSpeak 3 ServerQuery interface, type \"help\" for a list of commands.\n\r";

/// One accepted query connection, driven by the test script
struct Peer {
    stream: TcpStream,
    framer: LineFramer,
}

impl Peer {
    /// Send text verbatim (terminators included by the caller)
    fn send(&mut self, text: &str) {
        self.stream.write_all(text.as_bytes()).unwrap();
        self.stream.flush().unwrap();
    }

    /// Send one line, appending the terminator
    fn send_line(&mut self, line: &str) {
        self.send(&format!("{}\n\r", line));
    }

    /// Read the next complete command line from the client
    fn read_line(&mut self) -> String {
        loop {
            if let Some(line) = self.framer.next_line() {
                return line;
            }
            let mut buf = [0u8; 1024];
            let n = self.stream.read(&mut buf).unwrap();
            assert!(n > 0, "client closed while the peer expected a command");
            self.framer.extend(&buf[..n]);
        }
    }
}

/// Bind a listener, run `script` against the first accepted connection
fn spawn_peer<F>(script: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(&mut Peer) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut peer = Peer {
            stream,
            framer: LineFramer::new(),
        };
        peer.send(GREETING);
        script(&mut peer);
    });

    (addr, handle)
}

fn config_for(addr: SocketAddr) -> Config {
    Config::builder()
        .host(addr.ip().to_string())
        .port(addr.port())
        .connect_timeout_ms(5000)
        .build()
}

// =============================================================================
// Recording event sink
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Signal {
    Ready,
    Banned(u32),
    Closed(CloseReason),
    SocketError,
    Notification(String),
}

struct Recorder {
    tx: Sender<Signal>,
}

fn recorder() -> (Arc<Recorder>, Receiver<Signal>) {
    let (tx, rx) = unbounded();
    (Arc::new(Recorder { tx }), rx)
}

impl DispatchEvents for Recorder {
    fn ready(&self) {
        let _ = self.tx.send(Signal::Ready);
    }

    fn banned(&self, response: &Response) {
        let _ = self.tx.send(Signal::Banned(response.error_id()));
    }

    fn connection_closed(&self, reason: CloseReason) {
        let _ = self.tx.send(Signal::Closed(reason));
    }

    fn socket_error(&self, _error: &std::io::Error) {
        let _ = self.tx.send(Signal::SocketError);
    }

    fn notification(&self, raw: &str) {
        let _ = self.tx.send(Signal::Notification(raw.to_string()));
    }
}

/// Drain every signal currently queued plus those arriving within a grace
/// period, so once-only assertions are meaningful
fn drain(rx: &Receiver<Signal>) -> Vec<Signal> {
    let mut signals = Vec::new();
    while let Ok(signal) = rx.recv_timeout(Duration::from_millis(300)) {
        signals.push(signal);
    }
    signals
}

// =============================================================================
// Framer Tests
// =============================================================================

#[test]
fn test_framer_yields_lines_per_terminator() {
    let mut framer = LineFramer::new();
    framer.extend(b"first\n\rsecond\n\r");
    assert_eq!(framer.next_line().as_deref(), Some("first"));
    assert_eq!(framer.next_line().as_deref(), Some("second"));
    assert_eq!(framer.next_line(), None);
}

#[test]
fn test_framer_buffers_partial_lines() {
    let mut framer = LineFramer::new();
    framer.extend(b"par");
    assert_eq!(framer.next_line(), None);
    framer.extend(b"tial\n");
    assert_eq!(framer.next_line(), None);
    framer.extend(b"\rrest");
    assert_eq!(framer.next_line().as_deref(), Some("partial"));
    assert_eq!(framer.pending_len(), 4);
}

#[test]
fn test_framer_requires_lf_before_cr() {
    let mut framer = LineFramer::new();
    // CR+LF is not the protocol terminator
    framer.extend(b"line\r\n");
    assert_eq!(framer.next_line(), None);
    framer.extend(b"\n\r");
    assert_eq!(framer.next_line().as_deref(), Some("line\r\n"));
}

// =============================================================================
// Blocking Dispatcher Tests
// =============================================================================

#[test]
fn test_blocking_dispatch_round_trip() {
    let (addr, peer) = spawn_peer(|peer| {
        assert_eq!(peer.read_line(), "whoami");
        peer.send_line("virtualserver_status=online client_id=1");
        peer.send_line("error id=0 msg=ok");
    });

    let (events, signals) = recorder();
    let dispatcher = BlockingDispatcher::connect(&config_for(addr), events).unwrap();

    let raw = dispatcher
        .dispatch(&Command::new("whoami").unwrap())
        .unwrap();
    assert_eq!(
        raw,
        "virtualserver_status=online client_id=1\n\rerror id=0 msg=ok"
    );

    let response = Response::parse(&raw).unwrap();
    assert!(!response.is_erroneous());
    assert_eq!(response.scalar::<u32>("client_id").unwrap(), 1);

    assert_eq!(signals.recv_timeout(Duration::from_secs(1)).unwrap(), Signal::Ready);

    dispatcher.dispose();
    peer.join().unwrap();
}

#[test]
fn test_blocking_dispatch_rejects_empty_command() {
    let (addr, peer) = spawn_peer(|_| {});

    let (events, _signals) = recorder();
    let dispatcher = BlockingDispatcher::connect(&config_for(addr), events).unwrap();

    assert!(matches!(
        dispatcher.dispatch_raw("   "),
        Err(QueryError::InvalidArgument(_))
    ));

    dispatcher.dispose();
    peer.join().unwrap();
}

#[test]
fn test_notification_during_dispatch_is_not_merged() {
    let (addr, peer) = spawn_peer(|peer| {
        assert_eq!(peer.read_line(), "channellist");
        // Unsolicited push lands between the command and its response
        peer.send_line("notifytalkstatuschange schandlerid=1 status=1 clid=7");
        peer.send_line("cid=1 channel_name=Lobby|cid=2 channel_name=AFK");
        peer.send_line("error id=0 msg=ok");
    });

    let (events, signals) = recorder();
    let dispatcher = BlockingDispatcher::connect(&config_for(addr), events).unwrap();

    let raw = dispatcher.dispatch_raw("channellist").unwrap();
    assert_eq!(
        raw,
        "cid=1 channel_name=Lobby|cid=2 channel_name=AFK\n\rerror id=0 msg=ok"
    );

    let observed = drain(&signals);
    assert!(observed.contains(&Signal::Notification(
        "notifytalkstatuschange schandlerid=1 status=1 clid=7".to_string()
    )));

    dispatcher.dispose();
    peer.join().unwrap();
}

#[test]
fn test_notification_mid_body_is_routed_not_merged() {
    let (addr, peer) = spawn_peer(|peer| {
        assert_eq!(peer.read_line(), "clientlist");
        // The push arrives between two body chunks of the same response
        peer.send("clid=1 client_nickname=A\n\r");
        peer.send_line("notifyclientmoved clid=9 ctid=4 reasonid=0");
        peer.send("clid=2 client_nickname=B\n\r");
        peer.send_line("error id=0 msg=ok");
    });

    let (events, signals) = recorder();
    let dispatcher = BlockingDispatcher::connect(&config_for(addr), events).unwrap();

    let raw = dispatcher.dispatch_raw("clientlist").unwrap();
    assert_eq!(
        raw,
        "clid=1 client_nickname=A\n\rclid=2 client_nickname=B\n\rerror id=0 msg=ok"
    );

    let observed = drain(&signals);
    assert!(observed.contains(&Signal::Notification(
        "notifyclientmoved clid=9 ctid=4 reasonid=0".to_string()
    )));

    dispatcher.dispose();
    peer.join().unwrap();
}

#[test]
fn test_blocking_single_in_flight() {
    let (addr, peer) = spawn_peer(|peer| {
        // Strictly sequential: each command is echoed back before the
        // next line is read, so interleaved transmission would misecho
        for _ in 0..2 {
            let line = peer.read_line();
            peer.send_line(&format!("echo={}", line));
            peer.send_line("error id=0 msg=ok");
        }
    });

    let (events, _signals) = recorder();
    let dispatcher = Arc::new(BlockingDispatcher::connect(&config_for(addr), events).unwrap());

    let mut workers = Vec::new();
    for name in ["first", "second"] {
        let dispatcher = Arc::clone(&dispatcher);
        workers.push(thread::spawn(move || {
            let raw = dispatcher.dispatch_raw(name).unwrap();
            assert_eq!(raw, format!("echo={}\n\rerror id=0 msg=ok", name));
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    dispatcher.dispose();
    peer.join().unwrap();
}

#[test]
fn test_ban_forces_disconnect() {
    let (addr, peer) = spawn_peer(|peer| {
        assert_eq!(peer.read_line(), "whoami");
        peer.send_line("error id=3329 msg=connection\\sfailed extra_msg=banned");
    });

    let (events, signals) = recorder();
    let dispatcher = BlockingDispatcher::connect(&config_for(addr), events).unwrap();

    let raw = dispatcher.dispatch_raw("whoami").unwrap();
    let response = Response::parse(&raw).unwrap();
    assert!(response.is_banned());
    assert!(response.is_erroneous());

    let observed = drain(&signals);
    assert!(observed.contains(&Signal::Banned(3329)));
    assert!(observed.contains(&Signal::Closed(CloseReason::Banned)));

    // The forced disconnect rejects further commands
    assert!(matches!(
        dispatcher.dispatch_raw("whoami"),
        Err(QueryError::NotReady)
    ));

    dispatcher.dispose();
    peer.join().unwrap();
}

#[test]
fn test_peer_close_reports_exactly_once() {
    let (addr, peer) = spawn_peer(|peer| {
        assert_eq!(peer.read_line(), "whoami");
        // Close without responding
    });

    let (events, signals) = recorder();
    let dispatcher = BlockingDispatcher::connect(&config_for(addr), events).unwrap();

    assert!(matches!(
        dispatcher.dispatch_raw("whoami"),
        Err(QueryError::ConnectionLost)
    ));

    // A dispatch after the close must not produce a second close event
    assert!(matches!(
        dispatcher.dispatch_raw("whoami"),
        Err(QueryError::NotReady)
    ));

    let observed = drain(&signals);
    let closes = observed
        .iter()
        .filter(|s| matches!(s, Signal::Closed(_)))
        .count();
    assert_eq!(closes, 1);

    dispatcher.dispose();
    peer.join().unwrap();
}

#[test]
fn test_rejects_non_query_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"HTTP/1.1 400 Bad Request\n\r\n\r").unwrap();
    });

    let (events, _signals) = recorder();
    let result = BlockingDispatcher::connect(&config_for(addr), events);
    assert!(matches!(result, Err(QueryError::Protocol(_))));

    peer.join().unwrap();
}

#[test]
fn test_dispose_is_idempotent_and_rejects_dispatch() {
    let (addr, peer) = spawn_peer(|_| {});

    let (events, _signals) = recorder();
    let dispatcher = BlockingDispatcher::connect(&config_for(addr), events).unwrap();

    assert!(!dispatcher.is_disposed());
    dispatcher.dispose();
    dispatcher.dispose();
    assert!(dispatcher.is_disposed());

    assert!(matches!(
        dispatcher.dispatch_raw("whoami"),
        Err(QueryError::Disposed)
    ));

    peer.join().unwrap();
}

// =============================================================================
// Event Dispatcher Tests
// =============================================================================

#[test]
fn test_event_dispatch_round_trip() {
    let (addr, peer) = spawn_peer(|peer| {
        assert_eq!(peer.read_line(), "whoami");
        peer.send_line("client_id=1");
        peer.send_line("error id=0 msg=ok");
    });

    let (events, signals) = recorder();
    let dispatcher = EventDispatcher::connect(&config_for(addr), events).unwrap();

    let reply = dispatcher.dispatch_raw_async("whoami").unwrap();
    let raw = reply.wait_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(raw, "client_id=1\n\rerror id=0 msg=ok");

    assert_eq!(signals.recv_timeout(Duration::from_secs(1)).unwrap(), Signal::Ready);

    dispatcher.dispose();
    peer.join().unwrap();
}

#[test]
fn test_event_dispatch_queues_in_fifo_order() {
    let (addr, peer) = spawn_peer(|peer| {
        for _ in 0..3 {
            let line = peer.read_line();
            peer.send_line(&format!("echo={}", line));
            peer.send_line("error id=0 msg=ok");
        }
    });

    let (events, _signals) = recorder();
    let dispatcher = EventDispatcher::connect(&config_for(addr), events).unwrap();

    // Submitted back to back; at most one may be on the wire at a time
    let first = dispatcher.dispatch_raw_async("one").unwrap();
    let second = dispatcher.dispatch_raw_async("two").unwrap();
    let third = dispatcher.dispatch_raw_async("three").unwrap();

    assert_eq!(
        first.wait_timeout(Duration::from_secs(2)).unwrap(),
        "echo=one\n\rerror id=0 msg=ok"
    );
    assert_eq!(
        second.wait_timeout(Duration::from_secs(2)).unwrap(),
        "echo=two\n\rerror id=0 msg=ok"
    );
    assert_eq!(
        third.wait_timeout(Duration::from_secs(2)).unwrap(),
        "echo=three\n\rerror id=0 msg=ok"
    );

    dispatcher.dispose();
    peer.join().unwrap();
}

#[test]
fn test_event_dispatcher_delivers_spontaneous_notifications() {
    let (addr, peer) = spawn_peer(|peer| {
        peer.send_line("selected schandlerid=1");
        peer.send_line("notifytalkstatuschange schandlerid=1 status=1 clid=7");
    });

    let (events, signals) = recorder();
    let dispatcher = EventDispatcher::connect(&config_for(addr), events).unwrap();
    peer.join().unwrap();

    let observed = drain(&signals);
    assert!(observed.contains(&Signal::Notification("selected schandlerid=1".to_string())));
    assert!(observed.contains(&Signal::Notification(
        "notifytalkstatuschange schandlerid=1 status=1 clid=7".to_string()
    )));

    dispatcher.dispose();
}

#[test]
fn test_pending_reply_timeout_leaves_dispatcher_usable() {
    let (addr, peer) = spawn_peer(|peer| {
        assert_eq!(peer.read_line(), "slow");
        // Deliberately never respond; wait for the client to hang up
        let mut buf = [0u8; 64];
        let _ = peer.stream.read(&mut buf);
    });

    let (events, _signals) = recorder();
    let dispatcher = EventDispatcher::connect(&config_for(addr), events).unwrap();

    let reply = dispatcher.dispatch_raw_async("slow").unwrap();
    assert!(matches!(
        reply.wait_timeout(Duration::from_millis(200)),
        Err(QueryError::Timeout)
    ));

    // The caller-side deadline does not poison disposal
    dispatcher.dispose();
    assert!(dispatcher.is_disposed());
    peer.join().unwrap();
}

#[test]
fn test_connection_loss_releases_pending_replies() {
    let (addr, peer) = spawn_peer(|peer| {
        assert_eq!(peer.read_line(), "one");
        // Drop the connection with one command in flight and one queued
    });

    let (events, signals) = recorder();
    let dispatcher = EventDispatcher::connect(&config_for(addr), events).unwrap();

    let first = dispatcher.dispatch_raw_async("one").unwrap();
    let second = dispatcher.dispatch_raw_async("two").unwrap();
    peer.join().unwrap();

    assert!(matches!(
        first.wait_timeout(Duration::from_secs(2)),
        Err(QueryError::ConnectionLost)
    ));
    assert!(matches!(
        second.wait_timeout(Duration::from_secs(2)),
        Err(QueryError::ConnectionLost)
    ));

    let observed = drain(&signals);
    let closes = observed
        .iter()
        .filter(|s| matches!(s, Signal::Closed(_)))
        .count();
    assert_eq!(closes, 1);

    dispatcher.dispose();
}

#[test]
fn test_event_dispatcher_ban_releases_queued_commands() {
    let (addr, peer) = spawn_peer(|peer| {
        assert_eq!(peer.read_line(), "whoami");
        peer.send_line("error id=3331 msg=flood\\sban extra_msg=retry\\slater");
    });

    let (events, signals) = recorder();
    let dispatcher = EventDispatcher::connect(&config_for(addr), events).unwrap();

    let first = dispatcher.dispatch_raw_async("whoami").unwrap();
    let second = dispatcher.dispatch_raw_async("queued").unwrap();

    let raw = first.wait_timeout(Duration::from_secs(2)).unwrap();
    assert!(Response::parse(&raw).unwrap().is_banned());

    // The queued command can never be sent on a banned session
    assert!(matches!(
        second.wait_timeout(Duration::from_secs(2)),
        Err(QueryError::ConnectionLost)
    ));

    let observed = drain(&signals);
    assert!(observed.contains(&Signal::Banned(3331)));

    dispatcher.dispose();
    peer.join().unwrap();
}

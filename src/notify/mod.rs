//! Notification Router
//!
//! Maps the logical event name of an unsolicited message to registered
//! handlers. Exact-name handlers win; a fallback handler catches events
//! nobody subscribed to by name; anything else is surfaced as an unknown
//! notification carrying the raw text, never dropped silently.

pub mod events;

pub use events::{
    ClientEnterView, ClientLeftView, ClientMoved, TalkStatusChanged, TextMessageReceived,
};

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{QueryError, Result};
use crate::protocol::ParameterGroupList;

// =============================================================================
// Notification payload
// =============================================================================

/// One parsed unsolicited message
///
/// The event name is the name of the first field of the first row (e.g.
/// `notifytalkstatuschange`).
#[derive(Debug, Clone)]
pub struct Notification {
    event: String,
    groups: ParameterGroupList,
    raw: String,
}

impl Notification {
    /// Parse a raw notification line
    pub fn parse(raw: &str) -> Result<Self> {
        let groups = ParameterGroupList::parse(raw);
        let event = groups
            .first()
            .and_then(|group| group.parameters().first())
            .map(|parameter| parameter.name().to_string())
            .ok_or_else(|| QueryError::parse("notification has no event name", raw))?;

        Ok(Self {
            event,
            groups,
            raw: raw.to_string(),
        })
    }

    /// Logical event name, as received
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Parsed rows of the notification
    pub fn groups(&self) -> &ParameterGroupList {
        &self.groups
    }

    /// The raw line as received
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Typed notification payload constructible from a routed message
pub trait NotificationEvent: Sized {
    /// Event name this payload type corresponds to (matched case-insensitively)
    const NAME: &'static str;

    /// Build the typed payload
    fn from_notification(notification: &Notification) -> Result<Self>;
}

// =============================================================================
// Router
// =============================================================================

/// Where a routed notification ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// At least one handler ran
    Handled { event: String, invoked: usize },

    /// No exact handler and no fallback; raw text preserved for the caller
    Unknown { event: String, raw: String },
}

/// Token returned by a subscription, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = std::sync::Arc<dyn Fn(&Notification) -> Result<()> + Send + Sync>;

#[derive(Default)]
struct RouterInner {
    next_id: u64,
    by_event: HashMap<String, Vec<(HandlerId, Handler)>>,
    fallback: Vec<(HandlerId, Handler)>,
}

impl RouterInner {
    fn add(&mut self, event: Option<String>, handler: Handler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        match event {
            Some(event) => self.by_event.entry(event).or_default().push((id, handler)),
            None => self.fallback.push((id, handler)),
        }
        id
    }
}

/// Case-insensitive event-name registry with a fallback handler
///
/// Safe to share between the registering thread and a dispatcher's reader
/// thread.
#[derive(Default)]
pub struct NotificationRouter {
    inner: Mutex<RouterInner>,
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a typed handler for `E::NAME`
    ///
    /// The payload is built from the routed message; a construction
    /// failure propagates out of [`route`](Self::route) as a parse error.
    pub fn subscribe<E, F>(&self, handler: F) -> HandlerId
    where
        E: NotificationEvent,
        F: Fn(E) + Send + Sync + 'static,
    {
        let wrapped: Handler = std::sync::Arc::new(move |notification: &Notification| {
            let event = E::from_notification(notification)?;
            handler(event);
            Ok(())
        });
        self.inner
            .lock()
            .add(Some(E::NAME.to_ascii_lowercase()), wrapped)
    }

    /// Subscribe a raw handler for one event name
    pub fn subscribe_raw<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let wrapped: Handler = std::sync::Arc::new(move |notification: &Notification| {
            handler(notification);
            Ok(())
        });
        self.inner.lock().add(Some(event.to_ascii_lowercase()), wrapped)
    }

    /// Subscribe the fallback, invoked when no exact handler matches
    pub fn subscribe_fallback<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let wrapped: Handler = std::sync::Arc::new(move |notification: &Notification| {
            handler(notification);
            Ok(())
        });
        self.inner.lock().add(None, wrapped)
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut inner = self.inner.lock();

        for handlers in inner.by_event.values_mut() {
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            if handlers.len() != before {
                return true;
            }
        }

        let before = inner.fallback.len();
        inner.fallback.retain(|(handler_id, _)| *handler_id != id);
        inner.fallback.len() != before
    }

    /// Route one raw notification line
    ///
    /// Exact-name handlers run in registration order; with none, the
    /// fallback handlers run; with neither, the outcome is `Unknown` with
    /// the raw text attached. Handler construction failures propagate.
    pub fn route(&self, raw: &str) -> Result<RouteOutcome> {
        let notification = Notification::parse(raw)?;
        let key = notification.event().to_ascii_lowercase();

        // Snapshot the matching handlers so none of them can deadlock the
        // registry by subscribing or unsubscribing from inside the callback
        let handlers: Vec<Handler> = {
            let inner = self.inner.lock();
            match inner.by_event.get(&key) {
                Some(handlers) if !handlers.is_empty() => {
                    handlers.iter().map(|(_, h)| Handler::clone(h)).collect()
                }
                _ => inner.fallback.iter().map(|(_, h)| Handler::clone(h)).collect(),
            }
        };

        if handlers.is_empty() {
            tracing::debug!(event = %notification.event(), "unhandled notification");
            return Ok(RouteOutcome::Unknown {
                event: notification.event().to_string(),
                raw: raw.to_string(),
            });
        }

        let mut invoked = 0;
        for handler in &handlers {
            handler(&notification)?;
            invoked += 1;
        }

        Ok(RouteOutcome::Handled {
            event: notification.event().to_string(),
            invoked,
        })
    }
}

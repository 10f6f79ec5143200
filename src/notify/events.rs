//! Typed notification payloads
//!
//! The handful of events the router ships with. Anything else is reachable
//! through a raw or fallback subscription.

use crate::error::{QueryError, Result};
use crate::notify::{Notification, NotificationEvent};
use crate::protocol::ParameterGroup;

/// First row of a notification, or a parse error naming the event
fn first_row<'a>(notification: &'a Notification, event: &str) -> Result<&'a ParameterGroup> {
    notification.groups().first().ok_or_else(|| {
        QueryError::parse(
            format!("{} notification has no parameters", event),
            notification.raw(),
        )
    })
}

/// A client started or stopped talking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkStatusChanged {
    /// Server connection handler the event belongs to (ClientQuery)
    pub connection_id: u64,
    pub client_id: u32,
    pub talking: bool,
    pub received_whisper: bool,
}

impl NotificationEvent for TalkStatusChanged {
    const NAME: &'static str = "notifytalkstatuschange";

    fn from_notification(notification: &Notification) -> Result<Self> {
        let row = first_row(notification, Self::NAME)?;
        Ok(Self {
            connection_id: row.value_of_opt::<u64>("schandlerid")?.unwrap_or(0),
            client_id: row.value_of::<u32>("clid")?,
            talking: row.value_of::<bool>("status")?,
            received_whisper: row.value_of_opt::<bool>("isreceivedwhisper")?.unwrap_or(false),
        })
    }
}

/// A text message arrived (private, channel or server target)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessageReceived {
    /// 1 = client, 2 = channel, 3 = server
    pub target_mode: u32,
    pub message: String,
    pub invoker_id: u32,
    pub invoker_name: String,
    pub invoker_unique_id: Option<String>,
}

impl NotificationEvent for TextMessageReceived {
    const NAME: &'static str = "notifytextmessage";

    fn from_notification(notification: &Notification) -> Result<Self> {
        let row = first_row(notification, Self::NAME)?;
        Ok(Self {
            target_mode: row.value_of::<u32>("targetmode")?,
            message: row.value_of::<String>("msg")?,
            invoker_id: row.value_of::<u32>("invokerid")?,
            invoker_name: row.value_of::<String>("invokername")?,
            invoker_unique_id: row.value_of_opt::<String>("invokeruid")?,
        })
    }
}

/// A client was moved to another channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMoved {
    pub client_id: u32,
    pub target_channel_id: u64,
    pub reason_id: u32,
    /// Client that caused the move, when the server names one
    pub invoker_id: Option<u32>,
}

impl NotificationEvent for ClientMoved {
    const NAME: &'static str = "notifyclientmoved";

    fn from_notification(notification: &Notification) -> Result<Self> {
        let row = first_row(notification, Self::NAME)?;
        Ok(Self {
            client_id: row.value_of::<u32>("clid")?,
            target_channel_id: row.value_of::<u64>("ctid")?,
            reason_id: row.value_of_opt::<u32>("reasonid")?.unwrap_or(0),
            invoker_id: row.value_of_opt::<u32>("invokerid")?,
        })
    }
}

/// A client became visible (connected or entered a subscribed channel)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEnterView {
    pub client_id: u32,
    pub source_channel_id: u64,
    pub target_channel_id: u64,
    pub nickname: String,
    pub unique_id: Option<String>,
    pub reason_id: u32,
}

impl NotificationEvent for ClientEnterView {
    const NAME: &'static str = "notifycliententerview";

    fn from_notification(notification: &Notification) -> Result<Self> {
        let row = first_row(notification, Self::NAME)?;
        Ok(Self {
            client_id: row.value_of::<u32>("clid")?,
            source_channel_id: row.value_of_opt::<u64>("cfid")?.unwrap_or(0),
            target_channel_id: row.value_of::<u64>("ctid")?,
            nickname: row.value_of::<String>("client_nickname")?,
            unique_id: row.value_of_opt::<String>("client_unique_identifier")?,
            reason_id: row.value_of_opt::<u32>("reasonid")?.unwrap_or(0),
        })
    }
}

/// A client left view (disconnected, kicked or moved out of sight)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientLeftView {
    pub client_id: u32,
    pub source_channel_id: u64,
    pub target_channel_id: u64,
    pub reason_id: u32,
    pub reason_message: Option<String>,
}

impl NotificationEvent for ClientLeftView {
    const NAME: &'static str = "notifyclientleftview";

    fn from_notification(notification: &Notification) -> Result<Self> {
        let row = first_row(notification, Self::NAME)?;
        Ok(Self {
            client_id: row.value_of::<u32>("clid")?,
            source_channel_id: row.value_of_opt::<u64>("cfid")?.unwrap_or(0),
            target_channel_id: row.value_of_opt::<u64>("ctid")?.unwrap_or(0),
            reason_id: row.value_of_opt::<u32>("reasonid")?.unwrap_or(0),
            reason_message: row.value_of_opt::<String>("reasonmsg")?,
        })
    }
}

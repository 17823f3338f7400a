//! Best-effort broadcast of accepted events to live subscribers.
//!
//! ```text
//!                    Publisher::publish(event)
//!                              │
//!        ┌─────────────────────┼──────────────────────┐
//!        ▼                     ▼                      ▼
//!    new_log          new_<category>        error_detected
//!   (every event)   (info|error|request)  (error/warn/warning only)
//!
//!                 Publisher::publish_stats(snapshot)
//!                              │
//!                              ▼
//!                        stats_update
//! ```
//!
//! Every message goes through one `tokio::sync::broadcast` channel and is
//! tagged with its logical [`Channel`]; a [`Subscription`] filters to the
//! channels it asked for. Sending never blocks: with no subscribers the
//! message is discarded, and a subscriber that falls more than the channel
//! capacity behind loses the oldest messages.

use crate::stats::StatsSnapshot;
use crate::types::{Category, Event};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Channels and messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `new_log`: every accepted event.
    AllEvents,
    /// `new_<category>`: events of one category.
    Category(Category),
    /// `error_detected`: events at an alert level.
    Alert,
    /// `stats_update`: aggregate snapshots.
    Stats,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::AllEvents => "new_log",
            Channel::Category(Category::Info) => "new_info",
            Channel::Category(Category::Error) => "new_error",
            Channel::Category(Category::Request) => "new_request",
            Channel::Alert => "error_detected",
            Channel::Stats => "stats_update",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "new_log" => Channel::AllEvents,
            "new_info" => Channel::Category(Category::Info),
            "new_error" => Channel::Category(Category::Error),
            "new_request" => Channel::Category(Category::Request),
            "error_detected" => Channel::Alert,
            "stats_update" => Channel::Stats,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Event(Arc<Event>),
    Stats(Arc<StatsSnapshot>),
}

#[derive(Debug, Clone)]
pub struct Broadcast {
    pub channel: Channel,
    pub payload: Payload,
}

impl Broadcast {
    pub fn event(&self) -> Option<&Event> {
        match &self.payload {
            Payload::Event(event) => Some(&**event),
            Payload::Stats(_) => None,
        }
    }

    pub fn stats(&self) -> Option<&StatsSnapshot> {
        match &self.payload {
            Payload::Stats(stats) => Some(&**stats),
            Payload::Event(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Publisher {
    tx: broadcast::Sender<Broadcast>,
}

impl Publisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every channel. Narrow with [`Subscription::only`].
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            channels: None,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Announce an accepted event on `new_log`, its category channel and,
    /// for alert levels, `error_detected`. Returns the channels used.
    pub fn publish(&self, event: Event) -> Vec<Channel> {
        let mut channels = vec![Channel::AllEvents, Channel::Category(event.category())];
        if event.is_alert() {
            channels.push(Channel::Alert);
        }
        let event = Arc::new(event);
        for channel in &channels {
            self.send(Broadcast {
                channel: *channel,
                payload: Payload::Event(Arc::clone(&event)),
            });
        }
        channels
    }

    pub fn publish_stats(&self, snapshot: StatsSnapshot) {
        self.send(Broadcast {
            channel: Channel::Stats,
            payload: Payload::Stats(Arc::new(snapshot)),
        });
    }

    fn send(&self, message: Broadcast) {
        // Err only means nobody is listening right now.
        if self.tx.send(message).is_err() {
            tracing::trace!("no subscribers; broadcast discarded");
        }
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

pub struct Subscription {
    rx: broadcast::Receiver<Broadcast>,
    channels: Option<HashSet<Channel>>,
}

impl Subscription {
    pub fn only(mut self, channels: impl IntoIterator<Item = Channel>) -> Self {
        self.channels = Some(channels.into_iter().collect());
        self
    }

    fn wants(&self, channel: Channel) -> bool {
        self.channels.as_ref().is_none_or(|set| set.contains(&channel))
    }

    /// Next message on a subscribed channel. Messages lost to lag are
    /// skipped with a warning. `None` once every publisher is dropped.
    pub async fn recv(&mut self) -> Option<Broadcast> {
        loop {
            match self.rx.recv().await {
                Ok(message) if self.wants(message.channel) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "subscriber lagged; messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::recv`]. `None` when nothing
    /// is pending.
    pub fn try_recv(&mut self) -> Option<Broadcast> {
        loop {
            match self.rx.try_recv() {
                Ok(message) if self.wants(message.channel) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "subscriber lagged; messages dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Everything currently pending on subscribed channels.
    pub fn drain(&mut self) -> Vec<Broadcast> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

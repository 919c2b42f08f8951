//! Optional process-level event channel.
//!
//! When [`ServerOptions::socket`](crate::ServerOptions::socket) is set, one
//! [`EventChannel`] is created per server. Application code publishes on it
//! and subscribes to it; kiwi itself only creates it and hands it out,
//! through [`Server::socket`](crate::Server::socket),
//! [`Dispatcher::socket`](crate::Dispatcher::socket), or as a provided
//! dependency (`Dependency::provided::<EventChannel>()`).

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

const CAPACITY: usize = 1024;

/// One published message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
}

/// Cheaply cloneable broadcast handle.
#[derive(Clone, Debug)]
pub struct EventChannel {
    tx: broadcast::Sender<Event>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self { tx }
    }

    /// Sends to every current subscriber. Returns how many received it;
    /// zero when nobody is listening.
    pub fn publish(&self, topic: impl Into<String>, payload: Value) -> usize {
        self.tx
            .send(Event { topic: topic.into(), payload })
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventChannel {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let channel = EventChannel::new();
        assert_eq!(channel.publish("ignored", Value::Null), 0);

        let mut rx = channel.subscribe();
        assert_eq!(channel.clone().publish("items", json!({ "count": 3 })), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "items");
        assert_eq!(event.payload, json!({ "count": 3 }));
    }
}

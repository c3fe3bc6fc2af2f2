use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use uuid::Uuid;

/// An event pushed to SSE subscribers. `event_type` becomes the SSE `event:` line;
/// `data` is pre-serialized JSON so publishers don't need the subscriber's codec.
#[derive(Debug, Clone)]
pub struct BrokerEvent {
    pub event_type: &'static str,
    pub data: serde_json::Value,
}

struct Subscriber {
    id: Uuid,
    tx: mpsc::Sender<BrokerEvent>,
}

/// In-process SSE pub/sub. Per spec: a publish never blocks; a subscriber whose buffer is
/// full is dropped rather than making `publish` wait on it.
pub struct Broker {
    topics: Mutex<HashMap<String, Vec<Subscriber>>>,
    capacity: usize,
}

impl Broker {
    pub fn new(capacity: usize) -> Self {
        Broker {
            topics: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to a topic (an account id, or `session:<id>`). Returns a receiver to read
    /// events from; the subscription is removed when the handle is dropped or when a
    /// publish finds its buffer full.
    pub fn subscribe(&self, topic: &str) -> (Uuid, mpsc::Receiver<BrokerEvent>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();
        let mut topics = self.topics.lock().unwrap();
        topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        (id, rx)
    }

    pub fn unsubscribe(&self, topic: &str, id: Uuid) {
        let mut topics = self.topics.lock().unwrap();
        if let Some(subs) = topics.get_mut(topic) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Publish to every current subscriber of `topic`. Never blocks: a subscriber whose
    /// buffer is full (a slow consumer) is dropped instead of stalling the publisher.
    pub fn publish(&self, topic: &str, event: BrokerEvent) {
        let mut topics = self.topics.lock().unwrap();
        let Some(subs) = topics.get_mut(topic) else {
            return;
        };
        subs.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                eprintln!("⚠️ broker: dropping slow subscriber on topic {topic}");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if subs.is_empty() {
            topics.remove(topic);
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .unwrap()
            .get(topic)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(64)
    }
}

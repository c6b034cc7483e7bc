// src/broadcast/mod.rs
//!
//! Topic-partitioned broadcast hub
//!
//! One registry of live subscribers per topic (general, threat-only,
//! stats-only). Producers publish named events; delivery to each subscriber
//! is one `try_send`. A subscriber whose channel is full or closed is
//! dropped from its registry without affecting the others, and the
//! publisher never sees an error. There is no queueing, retry, or
//! backpressure: missed events are gone, and a reconnecting client starts
//! over with a fresh `connect` acknowledgment.
//!
//! All four termination paths (normal completion, timeout, transport
//! error, failed delivery) converge on [`Broadcaster::unsubscribe`], which
//! is idempotent.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use log::{debug, warn};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique handle for one live subscriber
pub type SubscriberId = Uuid;

/// Broadcast channel a subscriber joins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Observes every event
    General,
    /// Threat events only
    Threat,
    /// Statistics events only
    Stats,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::General => "general",
            Topic::Threat => "threat",
            Topic::Stats => "stats",
        }
    }
}

/// Delivery scope of one publish call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every active subscriber on every topic
    All,
    /// One topic; threat and stats additionally fan out to general
    Topic(Topic),
}

/// A named payload delivered to subscribers. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub payload: Value,
}

impl Event {
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
        }
    }
}

type Registry = Mutex<HashMap<SubscriberId, mpsc::Sender<Event>>>;

/// The subscriber hub
pub struct Broadcaster {
    channel_capacity: usize,
    general: Registry,
    threat: Registry,
    stats: Registry,
}

impl Broadcaster {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
            general: Mutex::new(HashMap::new()),
            threat: Mutex::new(HashMap::new()),
            stats: Mutex::new(HashMap::new()),
        }
    }

    fn registry(&self, topic: Topic) -> &Registry {
        match topic {
            Topic::General => &self.general,
            Topic::Threat => &self.threat,
            Topic::Stats => &self.stats,
        }
    }

    /// Attach a new subscriber to a topic.
    ///
    /// The `connect` acknowledgment is queued synchronously before the
    /// subscriber becomes visible to publishers, so it is always the first
    /// event a client sees.
    pub fn subscribe(self: &Arc<Self>, topic: Topic) -> SubscriptionHandle {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        let ack = Event::new(
            "connect",
            json!({
                "message": "stream connected",
                "topic": topic.as_str(),
            }),
        );
        // Fresh channel with capacity >= 1, cannot fail
        let _ = tx.try_send(ack);

        let mut registry = self.registry(topic).lock().unwrap_or_else(|e| e.into_inner());
        registry.insert(id, tx);
        drop(registry);

        debug!("subscriber {} attached to topic {}", id, topic.as_str());
        SubscriptionHandle {
            id,
            topic,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Publish a named event.
    ///
    /// Delivery is attempted independently per subscriber; failures only
    /// ever remove the failing subscriber. Reports nothing back to the
    /// caller.
    pub fn publish(&self, scope: Scope, name: &str, payload: Value) {
        let event = Event::new(name, payload);
        match scope {
            Scope::All => {
                self.deliver(Topic::General, &event);
                self.deliver(Topic::Threat, &event);
                self.deliver(Topic::Stats, &event);
            }
            Scope::Topic(Topic::General) => {
                self.deliver(Topic::General, &event);
            }
            Scope::Topic(topic) => {
                // General subscribers observe everything
                self.deliver(topic, &event);
                self.deliver(Topic::General, &event);
            }
        }
    }

    /// Publish a threat event to the threat topic (and general observers)
    pub fn send_threat(&self, payload: Value) {
        self.publish(Scope::Topic(Topic::Threat), "threat", payload);
    }

    /// Publish a statistics event to the stats topic (and general observers)
    pub fn send_stats(&self, payload: Value) {
        self.publish(Scope::Topic(Topic::Stats), "stats", payload);
    }

    /// Notify general observers that an analysis became available
    pub fn send_analysis_ready(&self, payload: Value) {
        self.publish(Scope::Topic(Topic::General), "analysis_ready", payload);
    }

    /// Liveness signal to every active subscriber
    pub fn heartbeat(&self) {
        let payload = json!({
            "type": "heartbeat",
            "timestamp": chrono::Utc::now().timestamp_millis(),
        });
        self.publish(Scope::All, "heartbeat", payload);
    }

    /// Detach one subscriber. Safe to call any number of times from any
    /// termination path.
    pub fn unsubscribe(&self, topic: Topic, id: SubscriberId) {
        let mut registry = self.registry(topic).lock().unwrap_or_else(|e| e.into_inner());
        if registry.remove(&id).is_some() {
            debug!("subscriber {} detached from topic {}", id, topic.as_str());
        }
    }

    /// Number of active subscribers on one topic
    pub fn active_connections(&self, topic: Topic) -> usize {
        let registry = self.registry(topic).lock().unwrap_or_else(|e| e.into_inner());
        registry.len()
    }

    /// Number of active subscribers across all topics
    pub fn total_connections(&self) -> usize {
        self.active_connections(Topic::General)
            + self.active_connections(Topic::Threat)
            + self.active_connections(Topic::Stats)
    }

    fn deliver(&self, topic: Topic, event: &Event) {
        let mut registry = self.registry(topic).lock().unwrap_or_else(|e| e.into_inner());
        registry.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "dropping slow subscriber {} on topic {} (channel full)",
                    id,
                    topic.as_str()
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(
                    "dropping closed subscriber {} on topic {}",
                    id,
                    topic.as_str()
                );
                false
            }
        });
    }
}

/// One live subscription.
///
/// Yields events as a [`Stream`]; dropping the handle detaches the
/// subscriber from its registry.
pub struct SubscriptionHandle {
    id: SubscriberId,
    topic: Topic,
    rx: mpsc::Receiver<Event>,
    hub: Weak<Broadcaster>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Receive the next event; `None` once the subscriber was detached and
    /// the channel drained
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Stream for SubscriptionHandle {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.topic, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(capacity: usize) -> Arc<Broadcaster> {
        Arc::new(Broadcaster::new(capacity))
    }

    async fn drain_ack(handle: &mut SubscriptionHandle) {
        let ack = handle.recv().await.expect("connect ack");
        assert_eq!(ack.name, "connect");
    }

    #[tokio::test]
    async fn connect_ack_is_the_first_event() {
        let hub = hub(8);
        let mut handle = hub.subscribe(Topic::General);

        hub.publish(Scope::Topic(Topic::General), "threat", json!({"n": 1}));

        let first = handle.recv().await.unwrap();
        assert_eq!(first.name, "connect");
        assert_eq!(first.payload["topic"], "general");

        let second = handle.recv().await.unwrap();
        assert_eq!(second.name, "threat");
    }

    #[tokio::test]
    async fn general_observes_topic_scoped_events() {
        let hub = hub(8);
        let mut general = hub.subscribe(Topic::General);
        let mut stats = hub.subscribe(Topic::Stats);
        drain_ack(&mut general).await;
        drain_ack(&mut stats).await;

        hub.send_threat(json!({"threat_id": "ML-1"}));
        hub.send_stats(json!({"total": 3}));

        assert_eq!(general.recv().await.unwrap().name, "threat");
        assert_eq!(general.recv().await.unwrap().name, "stats");

        // The stats subscriber never sees the threat event
        let first_for_stats = stats.recv().await.unwrap();
        assert_eq!(first_for_stats.name, "stats");
    }

    #[tokio::test]
    async fn failed_delivery_drops_only_the_failing_subscriber() {
        let hub = hub(1);
        let mut healthy = hub.subscribe(Topic::Threat);
        drain_ack(&mut healthy).await;

        // Never drained: the pending connect ack keeps its channel full
        let stuck = hub.subscribe(Topic::Threat);
        assert_eq!(hub.active_connections(Topic::Threat), 2);

        hub.send_threat(json!({"threat_id": "DL-9"}));

        assert_eq!(hub.active_connections(Topic::Threat), 1);
        let delivered = healthy.recv().await.unwrap();
        assert_eq!(delivered.name, "threat");
        assert_eq!(delivered.payload["threat_id"], "DL-9");

        drop(stuck);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let hub = hub(8);
        let keeper = hub.subscribe(Topic::General);
        let victim = hub.subscribe(Topic::General);
        let victim_id = victim.id();

        hub.unsubscribe(Topic::General, victim_id);
        hub.unsubscribe(Topic::General, victim_id);

        assert_eq!(hub.active_connections(Topic::General), 1);
        drop(keeper);
        drop(victim);
        assert_eq!(hub.active_connections(Topic::General), 0);
    }

    #[tokio::test]
    async fn dropping_the_handle_detaches_the_subscriber() {
        let hub = hub(8);
        let handle = hub.subscribe(Topic::Stats);
        assert_eq!(hub.active_connections(Topic::Stats), 1);

        drop(handle);
        assert_eq!(hub.active_connections(Topic::Stats), 0);
    }

    #[tokio::test]
    async fn heartbeat_reaches_only_active_subscribers() {
        let hub = hub(8);
        let mut active = hub.subscribe(Topic::General);
        let mut removed = hub.subscribe(Topic::Stats);
        drain_ack(&mut active).await;
        drain_ack(&mut removed).await;

        hub.unsubscribe(Topic::Stats, removed.id());
        hub.heartbeat();

        assert_eq!(active.recv().await.unwrap().name, "heartbeat");
        // Detached before the tick: channel closes without another event
        assert!(removed.recv().await.is_none());
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let hub = hub(8);
        let mut handle = hub.subscribe(Topic::General);
        drain_ack(&mut handle).await;

        for n in 0..3 {
            hub.publish(Scope::Topic(Topic::General), "threat", json!({ "n": n }));
        }
        for n in 0..3 {
            assert_eq!(handle.recv().await.unwrap().payload["n"], n);
        }
    }
}

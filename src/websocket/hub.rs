//! Broadcast Hub
//!
//! Single authority over subscriber membership and record fan-out.
//!
//! All membership changes and broadcasts are messages into one control
//! loop ([`HubLoop`]), which owns the [`SubscriberSet`] outright and
//! handles one request to completion before taking the next. Nothing else
//! ever touches the set, so no lock guards it.
//!
//! ```text
//!   register ───┐
//!   unregister ─┼─► HubLoop ──try_send──► [queue S1] ─► outbound drain S1
//!   broadcast ──┘      │      ──try_send──► [queue S2] ─► outbound drain S2
//!                      └── full queue ⇒ subscriber evicted, queue closed
//! ```
//!
//! Fan-out never waits on a subscriber. A subscriber whose queue is full
//! when a record arrives is removed from the set in the same pass and its
//! queue is closed; its drain then sees end-of-stream and hangs up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::subscriber::{Offer, Subscriber, SubscriberId};
use crate::storage::LogRecord;

/// Configuration for the hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Records buffered per subscriber before it is evicted
    pub queue_capacity: usize,
    /// Pending requests buffered in front of the control loop
    pub request_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            request_capacity: 1024,
        }
    }
}

/// Membership set owned by the control loop
#[derive(Debug, Default)]
pub struct SubscriberSet {
    subscribers: HashMap<SubscriberId, Subscriber>,
}

/// Result of one fan-out pass
#[derive(Debug, Default)]
pub struct Fanout {
    /// Subscribers that accepted the record
    pub delivered: usize,
    /// Subscribers removed during the pass; dropping them closes their queues
    pub evicted: Vec<Subscriber>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber; later broadcasts include it
    pub fn register(&mut self, subscriber: Subscriber) {
        tracing::info!(
            subscriber_id = %subscriber.id(),
            peer = ?subscriber.peer(),
            "Subscriber registered"
        );
        self.subscribers.insert(subscriber.id(), subscriber);
    }

    /// Remove a subscriber if it is still a member
    ///
    /// Returns the removed handle; dropping it closes the queue. A second
    /// call for the same id finds nothing and returns `None`.
    pub fn unregister(&mut self, id: &SubscriberId) -> Option<Subscriber> {
        let removed = self.subscribers.remove(id);
        if let Some(subscriber) = &removed {
            tracing::info!(
                subscriber_id = %id,
                peer = ?subscriber.peer(),
                "Subscriber unregistered"
            );
        }
        removed
    }

    /// Offer `record` to every member without waiting
    ///
    /// Members whose queue is full (or whose drain is gone) are removed in
    /// the same pass and handed back in [`Fanout::evicted`].
    pub fn broadcast(&mut self, record: &Arc<LogRecord>) -> Fanout {
        let mut fanout = Fanout::default();
        let mut dropped = Vec::new();

        for (id, subscriber) in &self.subscribers {
            match subscriber.offer(record) {
                Offer::Queued => fanout.delivered += 1,
                Offer::Full => {
                    tracing::warn!(
                        subscriber_id = %id,
                        peer = ?subscriber.peer(),
                        record_id = record.id,
                        "Subscriber queue full, evicting"
                    );
                    dropped.push(*id);
                }
                Offer::Closed => {
                    tracing::debug!(subscriber_id = %id, "Subscriber drain gone, evicting");
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            if let Some(subscriber) = self.subscribers.remove(&id) {
                fanout.evicted.push(subscriber);
            }
        }

        tracing::trace!(
            record_id = record.id,
            delivered = fanout.delivered,
            evicted = fanout.evicted.len(),
            "Broadcast record"
        );

        fanout
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

struct Registration {
    subscriber: Subscriber,
    ack: oneshot::Sender<()>,
}

/// Cloneable handle for sending requests to the control loop
#[derive(Clone)]
pub struct Hub {
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::Sender<SubscriberId>,
    broadcast_tx: mpsc::Sender<LogRecord>,
    live: Arc<AtomicUsize>,
    config: Arc<HubConfig>,
}

/// The control loop; drive it with [`HubLoop::run`]
pub struct HubLoop {
    register_rx: mpsc::Receiver<Registration>,
    unregister_rx: mpsc::Receiver<SubscriberId>,
    broadcast_rx: mpsc::Receiver<LogRecord>,
    set: SubscriberSet,
    live: Arc<AtomicUsize>,
}

impl Hub {
    /// Create a hub handle and the loop that serves it
    pub fn new(config: HubConfig) -> (Hub, HubLoop) {
        let capacity = config.request_capacity.max(1);
        let (register_tx, register_rx) = mpsc::channel(capacity);
        let (unregister_tx, unregister_rx) = mpsc::channel(capacity);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(capacity);
        let live = Arc::new(AtomicUsize::new(0));

        let hub = Hub {
            register_tx,
            unregister_tx,
            broadcast_tx,
            live: Arc::clone(&live),
            config: Arc::new(config),
        };
        let hub_loop = HubLoop {
            register_rx,
            unregister_rx,
            broadcast_rx,
            set: SubscriberSet::new(),
            live,
        };

        (hub, hub_loop)
    }

    /// Create a hub and spawn its loop on the current runtime
    ///
    /// The loop exits once every `Hub` clone has been dropped.
    pub fn spawn(config: HubConfig) -> (Hub, JoinHandle<()>) {
        let (hub, hub_loop) = Self::new(config);
        let handle = tokio::spawn(hub_loop.run());
        (hub, handle)
    }

    /// Queue capacity to give new subscribers
    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity
    }

    /// Add a subscriber, returning once the loop has inserted it
    ///
    /// Any broadcast submitted after this resolves is offered to the
    /// subscriber.
    pub async fn register(&self, subscriber: Subscriber) -> Result<(), HubError> {
        let (ack, done) = oneshot::channel();
        self.register_tx
            .send(Registration { subscriber, ack })
            .await
            .map_err(|_| HubError::Stopped)?;
        done.await.map_err(|_| HubError::Stopped)
    }

    /// Ask the loop to drop a subscriber; repeats are no-ops
    pub async fn unregister(&self, id: SubscriberId) -> Result<(), HubError> {
        self.unregister_tx
            .send(id)
            .await
            .map_err(|_| HubError::Stopped)
    }

    /// Hand a stored record over for fan-out
    ///
    /// Only waits for room in the request channel, never for subscribers.
    pub async fn broadcast(&self, record: LogRecord) -> Result<(), HubError> {
        self.broadcast_tx
            .send(record)
            .await
            .map_err(|_| HubError::Stopped)
    }

    /// Number of subscribers as of the last processed request
    pub fn subscriber_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

impl HubLoop {
    /// Serve requests until every [`Hub`] handle is gone
    ///
    /// Registrations are polled first and unregistrations before
    /// broadcasts, so a pending membership change is applied before a
    /// record queued behind it.
    pub async fn run(mut self) {
        tracing::debug!("Hub loop started");

        loop {
            tokio::select! {
                biased;

                Some(Registration { subscriber, ack }) = self.register_rx.recv() => {
                    self.set.register(subscriber);
                    self.publish_count();
                    let _ = ack.send(());
                }
                Some(id) = self.unregister_rx.recv() => {
                    let removed = self.set.unregister(&id);
                    self.publish_count();
                    drop(removed);
                }
                Some(record) = self.broadcast_rx.recv() => {
                    let record = Arc::new(record);
                    let fanout = self.set.broadcast(&record);
                    self.publish_count();
                    drop(fanout);
                }
                else => break,
            }
        }

        tracing::debug!(remaining = self.set.len(), "Hub loop stopped");
    }

    fn publish_count(&self) {
        self.live.store(self.set.len(), Ordering::Relaxed);
    }
}

/// Errors returned by hub handles
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Hub control loop has stopped")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewLogRecord;
    use crate::websocket::subscriber::OutboundQueue;
    use std::time::Duration;
    use tokio::sync::mpsc::error::TryRecvError;

    fn record(id: i64) -> LogRecord {
        NewLogRecord::new()
            .level("info")
            .message(format!("record {}", id))
            .into_record(id)
    }

    fn subscriber(capacity: usize) -> (Subscriber, OutboundQueue) {
        Subscriber::new(None, capacity)
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.request_capacity, 1024);
    }

    #[test]
    fn test_broadcast_reaches_every_member_in_order() {
        let mut set = SubscriberSet::new();
        let (a, mut qa) = subscriber(8);
        let (b, mut qb) = subscriber(8);
        let (outsider, mut q_outsider) = subscriber(8);
        set.register(a);
        set.register(b);

        for id in 1..=3 {
            let fanout = set.broadcast(&Arc::new(record(id)));
            assert_eq!(fanout.delivered, 2);
            assert!(fanout.evicted.is_empty());
        }

        for queue in [&mut qa, &mut qb] {
            let ids: Vec<i64> = (0..3).map(|_| queue.try_next().unwrap().id).collect();
            assert_eq!(ids, vec![1, 2, 3]);
            assert!(matches!(queue.try_next(), Err(TryRecvError::Empty)));
        }

        assert!(matches!(q_outsider.try_next(), Err(TryRecvError::Empty)));
        drop(outsider);
    }

    #[test]
    fn test_full_queue_is_evicted_in_same_pass() {
        let mut set = SubscriberSet::new();
        let (slow, mut q_slow) = subscriber(2);
        let (fast, mut q_fast) = subscriber(8);
        let slow_id = slow.id();
        set.register(slow);
        set.register(fast);

        set.broadcast(&Arc::new(record(1)));
        set.broadcast(&Arc::new(record(2)));

        let fanout = set.broadcast(&Arc::new(record(3)));
        assert_eq!(fanout.delivered, 1);
        assert_eq!(fanout.evicted.len(), 1);
        assert_eq!(fanout.evicted[0].id(), slow_id);
        drop(fanout);

        assert!(!set.contains(&slow_id));
        assert_eq!(set.len(), 1);

        // Later records never reach the evicted subscriber
        set.broadcast(&Arc::new(record(4)));

        assert_eq!(q_slow.try_next().unwrap().id, 1);
        assert_eq!(q_slow.try_next().unwrap().id, 2);
        assert!(matches!(q_slow.try_next(), Err(TryRecvError::Disconnected)));

        let fast_ids: Vec<i64> = (0..4).map(|_| q_fast.try_next().unwrap().id).collect();
        assert_eq!(fast_ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_unregister_twice_is_noop() {
        let mut set = SubscriberSet::new();
        let (a, mut qa) = subscriber(4);
        let id = a.id();
        set.register(a);

        assert!(set.unregister(&id).is_some());
        assert!(set.unregister(&id).is_none());
        assert!(set.is_empty());
        assert!(matches!(qa.try_next(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn test_register_broadcast_unregister_scenario() {
        let mut set = SubscriberSet::new();
        let (a, mut qa) = subscriber(256);
        let id = a.id();
        set.register(a);

        let first = record(1);
        set.broadcast(&Arc::new(first.clone()));

        set.unregister(&id);
        let fanout = set.broadcast(&Arc::new(record(2)));
        assert_eq!(fanout.delivered, 0);

        assert_eq!(*qa.try_next().unwrap(), first);
        assert!(matches!(qa.try_next(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn test_membership_arithmetic() {
        let mut set = SubscriberSet::new();
        let mut queues = Vec::new();
        let mut ids = Vec::new();

        // Capacities 1..=6: subscriber i overflows on broadcast i + 1
        for capacity in 1..=6 {
            let (s, q) = subscriber(capacity);
            ids.push(s.id());
            set.register(s);
            queues.push(q);
        }

        set.unregister(&ids[5]);
        set.unregister(&ids[4]);
        set.unregister(&ids[4]);

        let mut evicted = Vec::new();
        for id in 1..=3 {
            let fanout = set.broadcast(&Arc::new(record(id)));
            evicted.extend(fanout.evicted.iter().map(|s| s.id()));
        }

        // Capacities 1 and 2 overflow, 3 and 4 keep up, 5 and 6 left earlier
        assert_eq!(evicted, vec![ids[0], ids[1]]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&ids[2]));
        assert!(set.contains(&ids[3]));
    }

    #[tokio::test]
    async fn test_hub_register_then_broadcast() {
        let (hub, handle) = Hub::spawn(HubConfig::default());
        let (a, mut qa) = Subscriber::new(None, hub.queue_capacity());

        hub.register(a).await.unwrap();
        assert_eq!(hub.subscriber_count(), 1);

        hub.broadcast(record(1)).await.unwrap();
        hub.broadcast(record(2)).await.unwrap();

        assert_eq!(qa.next().await.unwrap().id, 1);
        assert_eq!(qa.next().await.unwrap().id, 2);

        drop(hub);
        handle.await.unwrap();

        // Loop is gone, the subscriber set with it
        assert!(qa.next().await.is_none());
    }

    #[tokio::test]
    async fn test_hub_unregister_closes_queue() {
        let (hub, _handle) = Hub::spawn(HubConfig::default());
        let (a, mut qa) = Subscriber::new(None, 16);
        let id = a.id();

        hub.register(a).await.unwrap();
        hub.broadcast(record(1)).await.unwrap();
        hub.unregister(id).await.unwrap();
        hub.unregister(id).await.unwrap();
        hub.broadcast(record(2)).await.unwrap();

        assert_eq!(qa.next().await.unwrap().id, 1);
        let end = tokio::time::timeout(Duration::from_secs(1), qa.next())
            .await
            .unwrap();
        assert!(end.is_none());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_hub_evicts_slow_subscriber() {
        let (hub, _handle) = Hub::spawn(HubConfig {
            queue_capacity: 1,
            request_capacity: 16,
        });
        let (slow, mut q_slow) = Subscriber::new(None, hub.queue_capacity());
        let (fast, mut q_fast) = Subscriber::new(None, 16);

        hub.register(slow).await.unwrap();
        hub.register(fast).await.unwrap();
        assert_eq!(hub.subscriber_count(), 2);

        hub.broadcast(record(1)).await.unwrap();
        hub.broadcast(record(2)).await.unwrap();

        assert_eq!(q_fast.next().await.unwrap().id, 1);
        assert_eq!(q_fast.next().await.unwrap().id, 2);

        assert_eq!(q_slow.next().await.unwrap().id, 1);
        assert!(q_slow.next().await.is_none());
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_stopped_hub_reports_error() {
        let (hub, hub_loop) = Hub::new(HubConfig::default());
        drop(hub_loop);

        let (a, _qa) = Subscriber::new(None, 4);
        assert!(matches!(hub.register(a).await, Err(HubError::Stopped)));
        assert!(matches!(hub.broadcast(record(1)).await, Err(HubError::Stopped)));
    }
}

//! Subscriber
//!
//! One connected viewer as seen by the hub, plus the consuming end of its
//! outbound queue. The queue is a bounded single-producer/single-consumer
//! channel: only the hub loop pushes, only the subscriber's outbound drain
//! pops. Dropping the [`Subscriber`] closes the queue.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use uuid::Uuid;

use crate::storage::LogRecord;

/// Unique identifier for a subscriber
pub type SubscriberId = Uuid;

/// Outcome of offering a record to a subscriber's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Record queued for delivery
    Queued,
    /// Queue at capacity; the subscriber is not keeping up
    Full,
    /// The outbound drain has already gone away
    Closed,
}

/// Hub-side handle of a connected viewer
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    peer: Option<SocketAddr>,
    queue: mpsc::Sender<Arc<LogRecord>>,
}

/// Drain-side end of a subscriber's queue
#[derive(Debug)]
pub struct OutboundQueue {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<LogRecord>>,
}

impl Subscriber {
    /// Create a subscriber with an empty queue holding up to `capacity` records
    pub fn new(peer: Option<SocketAddr>, capacity: usize) -> (Subscriber, OutboundQueue) {
        let id = Uuid::new_v4();
        let (queue, receiver) = mpsc::channel(capacity.max(1));

        (
            Subscriber { id, peer, queue },
            OutboundQueue { id, receiver },
        )
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remote address, when the transport exposed one
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Non-blocking enqueue
    pub fn offer(&self, record: &Arc<LogRecord>) -> Offer {
        match self.queue.try_send(Arc::clone(record)) {
            Ok(()) => Offer::Queued,
            Err(TrySendError::Full(_)) => Offer::Full,
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }
}

impl OutboundQueue {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next record
    ///
    /// Returns `None` once the hub has dropped the subscriber and every
    /// record queued before that has been taken.
    pub async fn next(&mut self) -> Option<Arc<LogRecord>> {
        self.receiver.recv().await
    }

    /// Take a queued record without waiting
    pub fn try_next(&mut self) -> Result<Arc<LogRecord>, TryRecvError> {
        self.receiver.try_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewLogRecord;

    fn record(id: i64) -> Arc<LogRecord> {
        Arc::new(NewLogRecord::new().message(format!("r{}", id)).into_record(id))
    }

    #[test]
    fn test_offer_until_full() {
        let (subscriber, mut queue) = Subscriber::new(None, 2);
        assert_eq!(subscriber.id(), queue.id());

        assert_eq!(subscriber.offer(&record(1)), Offer::Queued);
        assert_eq!(subscriber.offer(&record(2)), Offer::Queued);
        assert_eq!(subscriber.offer(&record(3)), Offer::Full);

        assert_eq!(queue.try_next().unwrap().id, 1);
        assert_eq!(queue.try_next().unwrap().id, 2);
        assert!(matches!(queue.try_next(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_offer_after_drain_dropped() {
        let (subscriber, queue) = Subscriber::new(None, 4);
        drop(queue);
        assert_eq!(subscriber.offer(&record(1)), Offer::Closed);
    }

    #[tokio::test]
    async fn test_queue_ends_after_subscriber_dropped() {
        let (subscriber, mut queue) = Subscriber::new(None, 4);
        subscriber.offer(&record(1));
        drop(subscriber);

        // Buffered records are still handed out before end-of-stream
        assert_eq!(queue.next().await.unwrap().id, 1);
        assert!(queue.next().await.is_none());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (subscriber, _queue) = Subscriber::new(None, 0);
        assert_eq!(subscriber.offer(&record(1)), Offer::Queued);
        assert_eq!(subscriber.offer(&record(2)), Offer::Full);
    }
}

//! Broker core: subscriber registry and non-blocking fan-out

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Per-subscriber queue bound. A subscriber with a full queue skips the
/// message; loss is observable only as a gap.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, Default)]
struct Registry {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<Bytes>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, id: u64) {
        if self.subscribers.lock().remove(&id).is_some() {
            debug!(subscriber = id, "unsubscribed from event bus");
        }
    }
}

/// Multi-subscriber fan-out of serialized event bytes.
///
/// Cloning is cheap; clones share the subscriber registry.
#[derive(Debug, Clone, Default)]
pub struct EventBroker {
    registry: Arc<Registry>,
}

impl EventBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber with a fresh bounded queue.
    pub fn subscribe(&self) -> Subscriber {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.subscribers.lock().insert(id, tx);
        debug!(subscriber = id, "subscribed to event bus");
        Subscriber {
            id,
            rx,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Offer a message to every current subscriber.
    ///
    /// The registry lock is held only to iterate; delivery is a `try_send`
    /// per queue, so a stalled subscriber costs the publisher nothing.
    pub fn publish(&self, message: impl Into<Bytes>) {
        let message = message.into();
        let subscribers = self.registry.subscribers.lock();
        for tx in subscribers.values() {
            let _ = tx.try_send(message.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.lock().len()
    }
}

/// Handle to one bounded subscription. Dropping the handle removes the
/// subscriber from the registry and releases its queue.
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    rx: mpsc::Receiver<Bytes>,
    registry: Arc<Registry>,
}

impl Subscriber {
    /// Receive the next queued message in publish order.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Adapt the subscription into a [`Stream`]; the subscription is
    /// released when the stream is dropped.
    pub fn into_stream(self) -> impl Stream<Item = Bytes> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|message| (message, sub))
        })
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let broker = EventBroker::new();
        let mut sub = broker.subscribe();

        broker.publish("a".as_bytes().to_vec());
        broker.publish("b".as_bytes().to_vec());
        broker.publish("c".as_bytes().to_vec());

        assert_eq!(sub.recv().await.unwrap(), Bytes::from("a"));
        assert_eq!(sub.recv().await.unwrap(), Bytes::from("b"));
        assert_eq!(sub.recv().await.unwrap(), Bytes::from("c"));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let broker = EventBroker::new();
        broker.publish("lost".as_bytes().to_vec());
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dropping_a_subscriber_unregisters_it() {
        let broker = EventBroker::new();
        let sub = broker.subscribe();
        let _other = broker.subscribe();
        assert_eq!(broker.subscriber_count(), 2);
        drop(sub);
        assert_eq!(broker.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn stalled_subscriber_skips_but_never_blocks_the_publisher() {
        let broker = EventBroker::new();

        let fast_a = broker.subscribe();
        let fast_b = broker.subscribe();
        let mut slow = broker.subscribe();

        let count = |mut sub: Subscriber| {
            tokio::spawn(async move {
                let mut n = 0usize;
                while let Some(message) = sub.recv().await {
                    if message.as_ref() == b"done" {
                        break;
                    }
                    n += 1;
                }
                n
            })
        };
        let a = count(fast_a);
        let b = count(fast_b);

        let started = Instant::now();
        for i in 0..10_000u32 {
            broker.publish(i.to_string().into_bytes());
            // Cooperative yield so live consumers drain between offers; the
            // slow subscriber never polls and caps out at its queue bound.
            tokio::task::yield_now().await;
        }
        let publish_elapsed = started.elapsed();
        broker.publish("done".as_bytes().to_vec());

        assert_eq!(a.await.unwrap(), 10_000);
        assert_eq!(b.await.unwrap(), 10_000);
        assert!(publish_elapsed < Duration::from_secs(10));

        let mut slow_received = 0usize;
        while slow.try_recv().is_some() {
            slow_received += 1;
        }
        assert!(slow_received <= SUBSCRIBER_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn into_stream_yields_messages_and_releases_on_drop() {
        use futures::StreamExt;

        let broker = EventBroker::new();
        let sub = broker.subscribe();
        broker.publish("x".as_bytes().to_vec());

        let mut stream = Box::pin(sub.into_stream());
        assert_eq!(stream.next().await.unwrap(), Bytes::from("x"));
        drop(stream);
        assert_eq!(broker.subscriber_count(), 0);
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::model::tick::PriceTick;

/// Subscriber queues for one feed client.
///
/// Broadcast takes the read lock and only uses `try_send`, so it never waits on
/// a slow consumer. Registration and removal take the write lock; they are rare
/// compared to broadcasts.
#[derive(Debug)]
pub struct SubscriberRegistry {
    subscribers: RwLock<Vec<(u64, mpsc::Sender<PriceTick>)>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl SubscriberRegistry {
    pub fn new(queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        })
    }

    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, tx));
        tracing::debug!(subscription = id, "Subscriber registered");
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(self),
        }
    }

    /// Offer `tick` to every subscriber. Returns how many queues accepted it.
    pub fn broadcast(&self, tick: &PriceTick) -> usize {
        let mut delivered = 0;
        let mut saw_closed = false;
        {
            let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            for (id, tx) in subscribers.iter() {
                match tx.try_send(tick.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::trace!(subscription = id, "Subscriber queue full, dropping tick");
                    }
                    Err(TrySendError::Closed(_)) => saw_closed = true,
                }
            }
        }
        if saw_closed {
            self.prune_closed();
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(sub_id, _)| *sub_id != id);
    }

    fn prune_closed(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(_, tx)| !tx.is_closed());
    }
}

/// Receiving end of one subscriber queue. Unregisters itself on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<PriceTick>,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next tick; `None` once the owning client is gone.
    pub async fn recv(&mut self) -> Option<PriceTick> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PriceTick> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
            tracing::debug!(subscription = self.id, "Subscriber unregistered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(price: f64) -> PriceTick {
        PriceTick::new("btcusdt", price, 1.0, 1)
    }

    #[test]
    fn full_queue_drops_only_for_that_subscriber() {
        let registry = SubscriberRegistry::new(1);
        let mut slow = registry.subscribe();
        let mut fast = registry.subscribe();

        assert_eq!(registry.broadcast(&tick(1.0)), 2);
        assert_eq!(fast.try_recv().map(|t| t.price), Some(1.0));

        // `slow` still holds tick 1, so tick 2 only reaches `fast`.
        assert_eq!(registry.broadcast(&tick(2.0)), 1);
        assert_eq!(fast.try_recv().map(|t| t.price), Some(2.0));
        assert_eq!(slow.try_recv().map(|t| t.price), Some(1.0));
        assert_eq!(slow.try_recv(), None);
    }

    #[test]
    fn dropped_subscription_unregisters() {
        let registry = SubscriberRegistry::new(4);
        let a = registry.subscribe();
        let _b = registry.subscribe();
        assert_eq!(registry.len(), 2);
        drop(a);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn per_subscriber_order_is_preserved() {
        let registry = SubscriberRegistry::new(16);
        let mut sub = registry.subscribe();
        for i in 1..=5 {
            registry.broadcast(&tick(i as f64));
        }
        let seen: Vec<f64> = std::iter::from_fn(|| sub.try_recv().map(|t| t.price)).collect();
        assert_eq!(seen, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn subscription_ends_when_registry_is_dropped() {
        let registry = SubscriberRegistry::new(4);
        let mut sub = registry.subscribe();
        drop(registry);
        assert_eq!(tokio_test::block_on(sub.recv()), None);
    }
}

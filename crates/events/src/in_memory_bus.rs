//! In-memory event bus for tests/dev.

use std::sync::{Mutex, MutexGuard, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InMemoryBusError {
    /// A publisher panicked while holding the subscriber list.
    Poisoned,
}

/// Broadcast bus over `std::sync::mpsc` channels.
///
/// Each subscriber owns a channel; a publish sends one copy per live
/// subscriber and forgets subscribers whose receiving end was dropped.
/// Nothing is buffered for subscribers that join later.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribers still registered (dropped ones are noticed on the next publish).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers().map(|subs| subs.len()).unwrap_or(0)
    }

    fn subscribers(&self) -> Result<MutexGuard<'_, Vec<mpsc::Sender<M>>>, InMemoryBusError> {
        self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self.subscribers()?;
        let Some((last, rest)) = subs.split_last() else {
            return Ok(());
        };

        let mut alive: Vec<bool> = rest.iter().map(|tx| tx.send(message.clone()).is_ok()).collect();
        // The last subscriber takes the original instead of a copy.
        alive.push(last.send(message).is_ok());

        let mut flags = alive.into_iter();
        subs.retain(|_| flags.next().unwrap_or(false));
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        // On a poisoned list the subscription is returned disconnected.
        if let Ok(mut subs) = self.subscribers() {
            subs.push(tx);
        }
        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_each_message() {
        let bus: InMemoryEventBus<u32> = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(7).unwrap();
        bus.publish(8).unwrap();

        assert_eq!(a.drain(), vec![7, 8]);
        assert_eq!(b.drain(), vec![7, 8]);
    }

    #[test]
    fn dropped_subscribers_are_forgotten_on_publish() {
        let bus: InMemoryEventBus<&'static str> = InMemoryEventBus::new();
        drop(bus.subscribe());
        let live = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish("low stock").unwrap();
        assert_eq!(live.try_recv().unwrap(), "low stock");
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let bus: InMemoryEventBus<u8> = InMemoryEventBus::new();
        assert!(bus.publish(1).is_ok());
        let late = bus.subscribe();
        assert!(late.drain().is_empty());
    }
}

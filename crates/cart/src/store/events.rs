//! Change notifications for cart subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rocketshoes_core::{Cart, ProductId};

/// What an applied mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// A product was added, or its amount incremented by one.
    Added { id: ProductId, amount: u32 },
    /// A product line was removed.
    Removed { id: ProductId },
    /// A product's amount was set.
    AmountChanged { id: ProductId, amount: u32 },
}

/// Event delivered to subscribers after every applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEvent {
    pub change: CartChange,
    /// The cart after the change.
    pub cart: Cart,
    /// Version of the cart after the change; increases by one per mutation.
    pub version: u64,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&CartEvent) + Send + Sync>;

/// Registry of change listeners.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl Subscribers {
    fn listeners(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners().len()
    }

    /// Call every listener with `event`.
    ///
    /// Listeners run outside the registry lock, so a listener may subscribe
    /// or unsubscribe without deadlocking.
    pub(crate) fn notify(&self, event: &CartEvent) {
        let listeners: Vec<Listener> = self
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn event() -> CartEvent {
        CartEvent {
            change: CartChange::Removed {
                id: ProductId::new(1),
            },
            cart: Cart::new(),
            version: 1,
        }
    }

    #[test]
    fn test_notify_reaches_every_listener() {
        let subscribers = Subscribers::default();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            subscribers.subscribe(Arc::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }

        subscribers.notify(&event());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let subscribers = Subscribers::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = subscribers.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(subscribers.unsubscribe(id));
        assert!(!subscribers.unsubscribe(id));
        subscribers.notify(&event());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(subscribers.len(), 0);
    }
}

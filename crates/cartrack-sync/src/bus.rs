//! Event dispatch bus — in-process publish/subscribe for decoded envelopes.
//!
//! The bus is created with the façade and outlives every transport
//! instance: registrations survive reconnects and are never silently
//! dropped. Delivery is synchronous and in registration order. A handler
//! that panics is isolated — the panic is caught and logged, and delivery
//! continues with the next handler.
//!
//! `subscribe`/`unsubscribe` are safe to call from inside a handler being
//! invoked by `publish`: publication iterates a snapshot and re-checks each
//! subscription's liveness immediately before invoking it, so removal is
//! deferred past the iteration but a handler never fires after its
//! `unsubscribe` returns.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use cartrack_protocol::{Envelope, EventKind};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::errors::SyncError;

/// A registered subscriber callback.
type Handler = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Opaque handle identifying one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Where a subscription listens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Channel {
    /// A known event kind.
    Kind(EventKind),
    /// Decoded envelopes whose `type` is not in the closed set.
    Unhandled,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    /// Subscribers per channel, in registration order.
    channels: HashMap<Channel, Vec<(u64, Handler)>>,
    /// Reverse lookup for unsubscribe and liveness checks.
    handles: HashMap<u64, Channel>,
}

impl Registry {
    fn add(&mut self, channel: Channel, handler: Handler) -> SubscriptionHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.channels.entry(channel).or_default().push((id, handler));
        let _ = self.handles.insert(id, channel);
        SubscriptionHandle(id)
    }

    fn remove(&mut self, handle: SubscriptionHandle) -> Result<(), SyncError> {
        let Some(channel) = self.handles.remove(&handle.0) else {
            return Err(SyncError::UnknownSubscription(handle.0));
        };
        if let Some(subs) = self.channels.get_mut(&channel) {
            subs.retain(|(id, _)| *id != handle.0);
        }
        Ok(())
    }

    fn snapshot(&self, channel: Channel) -> Vec<(u64, Handler)> {
        self.channels.get(&channel).cloned().unwrap_or_default()
    }
}

/// Publish/subscribe registry mapping event kinds to subscriber callbacks.
pub struct EventBus {
    registry: Mutex<Registry>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Register a handler for a known event kind.
    ///
    /// The kind is checked at the boundary: the heartbeat kinds
    /// `ping`/`pong` are connection plumbing and cannot be subscribed to.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, SyncError> {
        if kind.is_heartbeat() {
            return Err(SyncError::ReservedKind(kind));
        }
        Ok(self
            .registry
            .lock()
            .add(Channel::Kind(kind), Arc::new(handler)))
    }

    /// Register a catch-all handler for envelopes with an unrecognized
    /// `type` — the graceful-degradation path for protocol extensions.
    pub fn subscribe_unhandled(
        &self,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.registry.lock().add(Channel::Unhandled, Arc::new(handler))
    }

    /// Remove a subscription.
    ///
    /// Unknown handles are a local, recoverable caller error; other
    /// subscribers are unaffected either way.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SyncError> {
        self.registry.lock().remove(handle)
    }

    /// Deliver an envelope to every registered handler for its kind.
    ///
    /// Known kinds go to their channel; unknown kinds go to the catch-all
    /// channel. Zero subscribers is a silent no-op.
    pub fn publish(&self, envelope: &Envelope) {
        let channel = match envelope.known_kind() {
            Some(kind) => Channel::Kind(kind),
            None => Channel::Unhandled,
        };
        let subscribers = self.registry.lock().snapshot(channel);
        if subscribers.is_empty() {
            debug!(kind = %envelope.kind, "no subscribers for event");
            return;
        }
        for (id, handler) in subscribers {
            // Deferred-removal discipline: the snapshot keeps iteration
            // stable while handlers mutate the registry, and this liveness
            // check keeps unsubscribed handlers from firing.
            if !self.registry.lock().handles.contains_key(&id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| handler(envelope))).is_err() {
                warn!(kind = %envelope.kind, subscription = id, "subscriber panicked");
            }
        }
    }

    /// Number of live subscriptions for a kind (diagnostics).
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registry
            .lock()
            .channels
            .get(&Channel::Kind(kind))
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use serde_json::json;

    fn car_updated(id: &str) -> Envelope {
        Envelope::decode(&format!(
            r#"{{"type":"car_updated","car":{{"id":"{id}"}},"timestamp":"2024-01-01T00:00:00Z"}}"#
        ))
        .unwrap()
    }

    #[test]
    fn delivers_to_matching_subscriber() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let _h = bus
            .subscribe(EventKind::CarUpdated, move |env| {
                seen2.lock().push(env.get("car").unwrap()["id"].clone());
            })
            .unwrap();

        bus.publish(&car_updated("C12"));
        assert_eq!(seen.lock().as_slice(), &[json!("C12")]);
    }

    #[test]
    fn does_not_deliver_to_other_kinds() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let _h = bus
            .subscribe(EventKind::ShiftStarted, move |_| {
                let _ = count2.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        bus.publish(&car_updated("C1"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn registration_order_preserved() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order2 = order.clone();
            let _h = bus
                .subscribe(EventKind::CarUpdated, move |_| order2.lock().push(tag))
                .unwrap();
        }
        bus.publish(&car_updated("C1"));
        assert_eq!(order.lock().as_slice(), &["first", "second", "third"]);
    }

    #[test]
    fn unsubscribed_handler_never_fires() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let handle = bus
            .subscribe(EventKind::CarUpdated, move |_| {
                let _ = count2.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        bus.publish(&car_updated("C1"));
        bus.unsubscribe(handle).unwrap();
        bus.publish(&car_updated("C2"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_unknown_handle_is_error() {
        let bus = EventBus::new();
        let handle = bus
            .subscribe(EventKind::CarUpdated, |_| {})
            .unwrap();
        bus.unsubscribe(handle).unwrap();
        assert_matches!(
            bus.unsubscribe(handle),
            Err(SyncError::UnknownSubscription(_))
        );
    }

    #[test]
    fn reserved_heartbeat_kinds_rejected() {
        let bus = EventBus::new();
        assert_matches!(
            bus.subscribe(EventKind::Ping, |_| {}),
            Err(SyncError::ReservedKind(EventKind::Ping))
        );
        assert_matches!(
            bus.subscribe(EventKind::Pong, |_| {}),
            Err(SyncError::ReservedKind(EventKind::Pong))
        );
    }

    #[test]
    fn publish_with_no_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.publish(&car_updated("C1"));
    }

    #[test]
    fn panicking_handler_does_not_block_next() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _h1 = bus
            .subscribe(EventKind::CarUpdated, |_| panic!("boom"))
            .unwrap();
        let count2 = count.clone();
        let _h2 = bus
            .subscribe(EventKind::CarUpdated, move |_| {
                let _ = count2.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        bus.publish(&car_updated("C1"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_kind_routes_to_unhandled() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let _h = bus.subscribe_unhandled(move |env| seen2.lock().push(env.kind.clone()));

        let env = Envelope::decode(r#"{"type":"route_changed","route":"R9"}"#).unwrap();
        bus.publish(&env);
        assert_eq!(seen.lock().as_slice(), &["route_changed".to_string()]);
    }

    #[test]
    fn known_kind_does_not_hit_unhandled() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let _h = bus.subscribe_unhandled(move |_| {
            let _ = count2.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&car_updated("C1"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_can_unsubscribe_itself_during_publish() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let handle_slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));

        let bus2 = bus.clone();
        let count2 = count.clone();
        let slot2 = handle_slot.clone();
        let handle = bus
            .subscribe(EventKind::CarUpdated, move |_| {
                let _ = count2.fetch_add(1, Ordering::SeqCst);
                if let Some(h) = slot2.lock().take() {
                    bus2.unsubscribe(h).unwrap();
                }
            })
            .unwrap();
        *handle_slot.lock() = Some(handle);

        bus.publish(&car_updated("C1"));
        bus.publish(&car_updated("C2"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_unsubscribing_later_handler_suppresses_it() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let victim_slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));

        // Registered first, so it runs first and removes the victim before
        // the snapshot reaches it.
        let bus2 = bus.clone();
        let slot2 = victim_slot.clone();
        let _remover = bus
            .subscribe(EventKind::CarUpdated, move |_| {
                if let Some(victim) = slot2.lock().take() {
                    bus2.unsubscribe(victim).unwrap();
                }
            })
            .unwrap();

        let count2 = count.clone();
        let victim = bus
            .subscribe(EventKind::CarUpdated, move |_| {
                let _ = count2.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        *victim_slot.lock() = Some(victim);

        bus.publish(&car_updated("C1"));
        bus.publish(&car_updated("C2"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_can_subscribe_during_publish() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));

        let bus2 = bus.clone();
        let count2 = count.clone();
        let _h = bus
            .subscribe(EventKind::CarUpdated, move |_| {
                let count3 = count2.clone();
                let _ = bus2.subscribe(EventKind::CarUpdated, move |_| {
                    let _ = count3.fetch_add(1, Ordering::SeqCst);
                });
            })
            .unwrap();

        // New subscriber must not see the publish that registered it.
        bus.publish(&car_updated("C1"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        // But it sees the next one (and another copy registers each time).
        bus.publish(&car_updated("C2"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_count_tracks_lifecycle() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(EventKind::CarUpdated), 0);
        let h1 = bus.subscribe(EventKind::CarUpdated, |_| {}).unwrap();
        let _h2 = bus.subscribe(EventKind::CarUpdated, |_| {}).unwrap();
        assert_eq!(bus.subscriber_count(EventKind::CarUpdated), 2);
        bus.unsubscribe(h1).unwrap();
        assert_eq!(bus.subscriber_count(EventKind::CarUpdated), 1);
    }

    #[test]
    fn resubscribing_does_not_affect_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let _stable = bus
            .subscribe(EventKind::CarUpdated, move |_| {
                let _ = count2.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        // Same feature subscribing and unsubscribing repeatedly.
        for _ in 0..5 {
            let h = bus.subscribe(EventKind::CarUpdated, |_| {}).unwrap();
            bus.unsubscribe(h).unwrap();
        }

        bus.publish(&car_updated("C1"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

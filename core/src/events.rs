//! Per-client publish/subscribe channel for `error` and `warn` signals.
//!
//! Handlers run synchronously, in subscription order, on the task that
//! published. Every publish is also logged through `tracing`, so a host that
//! subscribes nothing still sees failures in its logs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::outcome::ErrorEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Error,
    Warn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Error(ErrorEnvelope),
    Warn(String),
}

impl Event {
    pub fn signal(&self) -> Signal {
        match self {
            Event::Error(_) => Signal::Error,
            Event::Warn(_) => Signal::Warn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, Signal, Handler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, signal: Signal, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler = Arc::new(handler);
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, signal, handler));
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = handlers.len();
        handlers.retain(|(sid, _, _)| *sid != id);
        handlers.len() != before
    }

    pub fn publish(&self, event: &Event) {
        match event {
            Event::Error(envelope) => tracing::error!(
                location = %envelope.location,
                method = %envelope.method,
                reason = %envelope.reason,
                "GrowStocks API reported a failure"
            ),
            Event::Warn(message) => tracing::warn!("{message}"),
        }

        let signal = event.signal();
        // Handlers are cloned out so one may subscribe or unsubscribe without deadlocking.
        let matching: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|(_, s, _)| *s == signal)
            .map(|(_, _, h)| Arc::clone(h))
            .collect();
        for handler in matching {
            handler(event);
        }
    }

    pub fn subscriber_count(&self, signal: Signal) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|(_, s, _)| *s == signal)
            .count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("error_subscribers", &self.subscriber_count(Signal::Error))
            .field("warn_subscribers", &self.subscriber_count(Signal::Warn))
            .finish()
    }
}

/// Anything that exposes an `EventBus`.
pub trait Observable {
    fn events(&self) -> &EventBus;

    fn on_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ErrorEnvelope) + Send + Sync + 'static,
    {
        self.events().subscribe(Signal::Error, move |event| {
            if let Event::Error(envelope) = event {
                handler(envelope);
            }
        })
    }

    fn on_warn<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.events().subscribe(Signal::Warn, move |event| {
            if let Event::Warn(message) = event {
                handler(message);
            }
        })
    }
}

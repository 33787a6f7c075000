//! In-process publish/subscribe hub.
//!
//! Dispatch is synchronous and single-threaded: `publish` calls every handler
//! registered for the topic, in subscription order, before returning. A
//! handler that returns an error or panics is logged and skipped; the
//! remaining handlers still run.
//!
//! Handlers may publish from inside a callback. The nested publish is
//! dispatched immediately. A handler that re-publishes its own trigger topic
//! recurses without bound; that is the caller's problem.

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::error::BusError;
use crate::events::Event;

pub type HandlerResult = Result<(), Box<dyn std::error::Error>>;

type Handler = Rc<dyn Fn(&Event) -> HandlerResult>;

struct Registration {
    id: u64,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    topics: HashMap<String, Vec<Registration>>,
}

impl Registry {
    fn remove(&mut self, topic: &str, id: u64) -> bool {
        let Some(regs) = self.topics.get_mut(topic) else {
            return false;
        };
        let before = regs.len();
        regs.retain(|r| r.id != id);
        let removed = regs.len() != before;
        if regs.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }
}

/// Cheaply cloneable handle to a shared registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

/// Returned by [`EventBus::subscribe`]. Dropping it does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    topic: String,
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove this registration. Returns false if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.borrow_mut().remove(&self.topic, self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.borrow();
        f.debug_struct("EventBus")
            .field("topics", &registry.topics.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Result<Subscription, BusError>
    where
        F: Fn(&Event) -> HandlerResult + 'static,
    {
        self.register(topic, false, Rc::new(handler))
    }

    /// Like [`subscribe`](Self::subscribe), but the handler is removed before
    /// its first invocation.
    pub fn subscribe_once<F>(&self, topic: &str, handler: F) -> Result<Subscription, BusError>
    where
        F: Fn(&Event) -> HandlerResult + 'static,
    {
        self.register(topic, true, Rc::new(handler))
    }

    fn register(
        &self,
        topic: &str,
        once: bool,
        handler: Handler,
    ) -> Result<Subscription, BusError> {
        if topic.trim().is_empty() {
            return Err(BusError::InvalidArgument("topic must not be empty".into()));
        }
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(Registration { id, once, handler });
        Ok(Subscription {
            topic: topic.to_string(),
            id,
            registry: Rc::downgrade(&self.registry),
        })
    }

    /// Publish on the event's own topic.
    pub fn publish(&self, event: Event) {
        // Topics from `Event::topic` are never empty.
        let _ = self.publish_to(event.topic(), &event);
    }

    /// Publish on an explicit topic. Returns the number of handlers invoked.
    pub fn publish_to(&self, topic: &str, event: &Event) -> Result<usize, BusError> {
        if topic.trim().is_empty() {
            return Err(BusError::InvalidArgument("topic must not be empty".into()));
        }

        // Snapshot the handlers and drop the borrow so handlers can
        // subscribe, unsubscribe or publish re-entrantly.
        let handlers: Vec<Handler> = {
            let mut registry = self.registry.borrow_mut();
            let Some(regs) = registry.topics.get_mut(topic) else {
                return Ok(0);
            };
            let snapshot = regs.iter().map(|r| Rc::clone(&r.handler)).collect();
            regs.retain(|r| !r.once);
            if regs.is_empty() {
                registry.topics.remove(topic);
            }
            snapshot
        };

        debug!(topic, handlers = handlers.len(), "publish");
        for handler in &handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(topic, error = %e, "event handler failed"),
                Err(_) => warn!(topic, "event handler panicked"),
            }
        }
        Ok(handlers.len())
    }

    pub fn unsubscribe_all(&self, topic: &str) -> usize {
        self.registry
            .borrow_mut()
            .topics
            .remove(topic)
            .map(|regs| regs.len())
            .unwrap_or(0)
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.registry
            .borrow()
            .topics
            .get(topic)
            .map(|regs| regs.len())
            .unwrap_or(0)
    }
}

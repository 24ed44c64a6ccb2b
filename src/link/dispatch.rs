//! Per-die multicast handler table.
//!
//! Handlers are registered per [`MessageType`]; every inbound message is delivered to all handlers
//! of its type in registration order. Transient ack waiters and long-lived subscriptions use the
//! same table and deregister through [`HandlerGuard`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use smallvec::SmallVec;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};

use crate::protocol::messages::{Message, MessageType};

/// Callback invoked for each inbound message of a registered type.
pub type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Identifies one registration in a [`Dispatcher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
struct Table {
    next_id: u64,
    handlers: HashMap<MessageType, SmallVec<[(HandlerId, Handler); 2]>>,
}

/// Handler registry owned by one die.
#[derive(Default)]
pub struct Dispatcher {
    table: Mutex<Table>,
}

impl Dispatcher {
    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `kind`.
    pub fn add(&self, kind: MessageType, handler: Handler) -> HandlerId {
        let mut t = self.table();
        let id = HandlerId(t.next_id);
        t.next_id += 1;
        t.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    /// Remove a registration. Returns `false` when it was already gone.
    pub fn remove(&self, kind: MessageType, id: HandlerId) -> bool {
        let mut t = self.table();
        let Some(list) = t.handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(h, _)| *h != id);
        let removed = list.len() != before;
        if list.is_empty() {
            t.handlers.remove(&kind);
        }
        removed
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: MessageType) -> usize {
        self.table().handlers.get(&kind).map_or(0, SmallVec::len)
    }

    /// Deliver `msg` to every handler of its type; returns how many ran.
    pub fn dispatch(&self, msg: &Message) -> usize {
        // Snapshot first so handlers may (de)register without deadlocking.
        let handlers: SmallVec<[Handler; 2]> = match self.table().handlers.get(&msg.kind()) {
            Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };
        for h in &handlers {
            h(msg);
        }
        handlers.len()
    }

    /// Register `handler` and return a guard that removes it when dropped.
    pub fn subscribe(self: &Arc<Self>, kind: MessageType, handler: Handler) -> HandlerGuard {
        let id = self.add(kind, handler);
        HandlerGuard {
            dispatcher: Arc::downgrade(self),
            kind,
            id,
        }
    }

    /// Start collecting messages of `kind` into a [`Waiter`].
    pub(crate) fn expect(self: &Arc<Self>, kind: MessageType) -> Waiter {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = self.subscribe(
            kind,
            Arc::new(move |m: &Message| {
                let _ = tx.send(m.clone());
            }),
        );
        Waiter {
            kind,
            rx,
            _guard: guard,
        }
    }
}

/// Scoped registration; the handler is removed on drop.
#[must_use = "dropping the guard removes the handler immediately"]
pub struct HandlerGuard {
    dispatcher: Weak<Dispatcher>,
    kind: MessageType,
    id: HandlerId,
}

impl HandlerGuard {
    /// Message type this guard is registered for.
    pub fn kind(&self) -> MessageType {
        self.kind
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if let Some(d) = self.dispatcher.upgrade() {
            d.remove(self.kind, self.id);
        }
    }
}

/// Transient ack waiter: buffers every message of one type until dropped.
pub(crate) struct Waiter {
    kind: MessageType,
    rx: mpsc::UnboundedReceiver<Message>,
    _guard: HandlerGuard,
}

impl Waiter {
    pub(crate) fn kind(&self) -> MessageType {
        self.kind
    }

    /// Next buffered message accepted by `matches`, or `None` once `deadline` passes.
    /// A `None` deadline waits indefinitely.
    pub(crate) async fn next_matching(
        &mut self,
        deadline: Option<Instant>,
        matches: impl Fn(&Message) -> bool,
    ) -> Option<Message> {
        loop {
            let next = match deadline {
                Some(d) => timeout_at(d, self.rx.recv()).await.ok()?,
                None => self.rx.recv().await,
            };
            let msg = next?;
            if matches(&msg) {
                return Some(msg);
            }
            tracing::trace!(kind = ?self.kind, ?msg, "ignoring non-matching message");
        }
    }

    pub(crate) async fn next(&mut self, deadline: Option<Instant>) -> Option<Message> {
        self.next_matching(deadline, |_| true).await
    }
}

#[cfg(test)]
#[path = "../../tests/unit/link/dispatch.rs"]
mod tests;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::reader::MessageReader;
use crate::types::MessageType;

/// Callback invoked with each published message of its type.
pub type MessageHandler = Arc<dyn Fn(&mut MessageReader) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a raw counter value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Dispatches messages to the subscribers of their type.
///
/// Callbacks run on the publishing thread, in subscription order. The
/// reader's cursor is reset to 0 after every callback, so each subscriber
/// sees the whole body regardless of what earlier ones consumed. Messages of
/// a type with no subscribers are dropped.
#[derive(Default)]
pub struct MessagePublisher {
    handlers: RwLock<HashMap<MessageType, Vec<(SubscriptionId, MessageHandler)>>>,
    next_id: AtomicU64,
}

impl MessagePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handler` for messages of type `ty`.
    pub fn subscribe<F>(&self, ty: &MessageType, handler: F) -> SubscriptionId
    where
        F: Fn(&mut MessageReader) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers
            .entry(ty.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription. Returns `false` if it was not present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        handlers.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|(sub, _)| *sub != id);
            removed |= subs.len() != before;
            !subs.is_empty()
        });
        removed
    }

    /// Deliver `message` to every subscriber of its type.
    ///
    /// Returns the number of callbacks invoked. Handlers are snapshotted
    /// before the first call, so a callback may subscribe or unsubscribe
    /// without deadlocking; the change applies from the next publish.
    pub fn publish(&self, message: &mut MessageReader) -> usize {
        let snapshot: Vec<MessageHandler> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            match handlers.get(message.message_type()) {
                Some(subs) => subs.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => Vec::new(),
            }
        };

        if snapshot.is_empty() {
            trace!(message_type = %message.message_type(), "no subscribers");
            return 0;
        }

        for handler in &snapshot {
            handler(message);
            message.seek(0);
        }
        snapshot.len()
    }

    /// Number of subscribers for `ty`.
    pub fn subscriber_count(&self, ty: &MessageType) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ty)
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for MessagePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MessagePublisher")
            .field("types", &handlers.len())
            .finish()
    }
}

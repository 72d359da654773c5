//! [`SubscriberRegistry`] – the set of currently connected subscribers.
//!
//! A single mutex guards membership.  `add`, `remove` and `snapshot` all
//! take it, so they are linearizable with respect to each other; sending
//! bytes to a subscriber never happens under the lock.  Broadcasters iterate
//! over a [`snapshot`](SubscriberRegistry::snapshot) instead.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use les02_types::Les02Error;
use uuid::Uuid;

/// Outbound half of one subscriber connection.
///
/// The WebSocket server implements this over a tungstenite sink; tests plug
/// in recording or failing doubles.
#[async_trait]
pub trait SubscriberSink: Send + Sync {
    /// Deliver one text message.
    ///
    /// # Errors
    ///
    /// Returns [`Les02Error::Delivery`] when the connection is closed or the
    /// write fails.
    async fn send_text(&self, text: &str) -> Result<(), Les02Error>;
}

/// Cheap, cloneable reference to one connected subscriber.
///
/// Two handles are equal when they refer to the same connection.
#[derive(Clone)]
pub struct SubscriberHandle {
    id: Uuid,
    peer: Option<SocketAddr>,
    sink: Arc<dyn SubscriberSink>,
}

impl SubscriberHandle {
    pub fn new(sink: Arc<dyn SubscriberSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer: None,
            sink,
        }
    }

    /// Record the remote address (builder-style).
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Send `text` to this subscriber.
    pub async fn send(&self, text: &str) -> Result<(), Les02Error> {
        self.sink.send_text(text).await
    }
}

impl PartialEq for SubscriberHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SubscriberHandle {}

impl fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish()
    }
}

/// Membership set of connected subscribers, in connection order.
#[derive(Default)]
pub struct SubscriberRegistry {
    members: Mutex<Vec<SubscriberHandle>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `handle` and return the member count.
    ///
    /// Adding a handle that is already a member changes nothing.
    pub fn add(&self, handle: SubscriberHandle) -> usize {
        let mut members = self.lock();
        if !members.contains(&handle) {
            members.push(handle);
        }
        members.len()
    }

    /// Remove `handle` if present and return the member count.  Idempotent.
    pub fn remove(&self, handle: &SubscriberHandle) -> usize {
        let mut members = self.lock();
        members.retain(|m| m != handle);
        members.len()
    }

    /// Point-in-time copy of the members, safe to iterate without the lock.
    pub fn snapshot(&self) -> Vec<SubscriberHandle> {
        self.lock().clone()
    }

    pub fn contains(&self, handle: &SubscriberHandle) -> bool {
        self.lock().contains(handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the Vec half-updated, so a
    // poisoned mutex is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<SubscriberHandle>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("members", &self.len())
            .finish()
    }
}

//! Surface visibility signal.
//!
//! The host owns a [`VisibilityHub`] and reports whether the surface the
//! scanner renders into is visible. Scanners register a
//! [`VisibilitySubscription`] when built and deregister it on destroy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug)]
struct HubInner {
    current: Visibility,
    next_id: u64,
    subscribers: HashMap<u64, mpsc::UnboundedSender<Visibility>>,
}

/// Broadcasts visibility changes to every registered subscription.
///
/// Cloning shares the same hub.
#[derive(Debug, Clone)]
pub struct VisibilityHub {
    inner: Arc<Mutex<HubInner>>,
}

impl Default for VisibilityHub {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                current: Visibility::Visible,
                next_id: 0,
                subscribers: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        // No invariant spans a panic inside the lock.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> VisibilitySubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, tx);
        VisibilitySubscription { id, rx }
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, subscription: &VisibilitySubscription) -> bool {
        self.lock().subscribers.remove(&subscription.id).is_some()
    }

    /// Record the surface's visibility, notifying subscribers on change.
    pub fn set_visibility(&self, visibility: Visibility) {
        let mut inner = self.lock();
        if inner.current == visibility {
            return;
        }
        inner.current = visibility;
        debug!(?visibility, subscribers = inner.subscribers.len(), "surface visibility changed");
        inner
            .subscribers
            .retain(|_, tx| tx.send(visibility).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// One registration with a [`VisibilityHub`].
#[derive(Debug)]
pub struct VisibilitySubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Visibility>,
}

impl VisibilitySubscription {
    /// Next change; `None` once deregistered or the hub is gone.
    ///
    /// Cancel safe.
    pub async fn changed(&mut self) -> Option<Visibility> {
        self.rx.recv().await
    }

    /// Stop receiving, dropping anything still queued.
    pub fn close(&mut self) {
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

/// Invalidation notifier
///
/// Fans page-granular unmap events out to whoever manages the system
/// address space. Delivery is fire-and-forget: listeners cannot refuse,
/// nothing is retried, and with no listeners the event is dropped.
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use super::decode::{Region, PAGE_SHIFT, PAGE_SIZE};
use super::translate::Permission;

/// One revoked page in the system address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmapEvent {
    /// Byte address of the page
    pub iova: u64,
    /// Always one page
    pub length: u64,
    /// Always `Permission::None` (revoke)
    pub permission: Permission,
}

impl UnmapEvent {
    pub fn for_page(page: u64) -> Self {
        Self {
            iova: page << PAGE_SHIFT,
            length: PAGE_SIZE,
            permission: Permission::None,
        }
    }
}

/// Receiver of unmap events, called synchronously from the write path.
///
/// Implementations must not block. Calling back into the unit (for
/// example to re-translate) is allowed: no unit lock is held while
/// listeners run.
pub trait UnmapListener: Send + Sync {
    fn unmap(&self, event: &UnmapEvent);
}

/// Handle returned by [`InvalidationNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

pub struct InvalidationNotifier {
    listeners: Mutex<Vec<(SubscriberId, Arc<dyn UnmapListener>)>>,
    next_id: AtomicU64,
    emitted: AtomicU64,
}

impl InvalidationNotifier {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            emitted: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn UnmapListener>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Remove a listener. Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Total events emitted since creation, delivered or not.
    pub fn events_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Emit one unmap event per page of `old`.
    pub fn revoke_region(&self, old: &Region) {
        if old.length == 0 {
            return;
        }
        // Snapshot the list so listeners may (un)subscribe while we walk.
        let listeners: Vec<Arc<dyn UnmapListener>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        self.emitted.fetch_add(old.length, Ordering::Relaxed);
        if listeners.is_empty() {
            return;
        }

        for page in old.pages() {
            let event = UnmapEvent::for_page(page);
            log::trace!("unmap iova={:#x}", event.iova);
            for listener in &listeners {
                listener.unmap(&event);
            }
        }
    }
}

impl Default for InvalidationNotifier {
    fn default() -> Self {
        Self::new()
    }
}

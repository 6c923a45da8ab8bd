//! Damage requests and the queue that batches them between flushes.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::geometry::Rect;
use crate::tree::NodeId;

/// A rectangle of `origin` (in its local space) that needs repainting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageRequest {
    pub origin: NodeId,
    pub rect: Rect,
}

impl DamageRequest {
    pub fn new(origin: NodeId, rect: Rect) -> Self {
        Self { origin, rect }
    }
}

/// Thread-safe queue of pending damage.
///
/// Requests for the same node are merged by union, so a node that is
/// invalidated many times between flushes is painted once. Order of first
/// arrival is kept.
#[derive(Debug, Default)]
pub struct DamageQueue {
    pending: Mutex<Vec<DamageRequest>>,
}

impl DamageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DamageRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `request`. Empty rectangles are dropped.
    pub fn push(&self, request: DamageRequest) {
        if request.rect.is_empty() {
            return;
        }
        let mut pending = self.lock();
        match pending.iter_mut().find(|queued| queued.origin == request.origin) {
            Some(queued) => queued.rect = queued.rect.union(&request.rect),
            None => pending.push(request),
        }
    }

    /// Take every pending request.
    pub fn drain(&self) -> Vec<DamageRequest> {
        std::mem::take(&mut *self.lock())
    }

    /// Forget pending damage on `nodes`, e.g. after they were removed.
    pub fn cancel(&self, nodes: &[NodeId]) {
        self.lock().retain(|request| !nodes.contains(&request.origin));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

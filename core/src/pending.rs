//! Suspended multi-turn requests
//!
//! When a required slot is missing, the partially-bound request is parked
//! here keyed by `(user, slot kind)` and the user is prompted. Their next
//! message answers the awaited slot. At most one entry per key; a newer
//! request of the same kind silently overwrites the older one, while
//! requests of different kinds coexist.

use crate::schema::{BoundParams, ParamKind};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A suspended, partially-bound action awaiting one more slot value
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub user_id: u64,
    pub action: String,
    pub bound: BoundParams,
    pub awaiting_param: String,
    pub awaiting_kind: ParamKind,
}

/// Keyed store of pending requests. Entry lifecycle: created or
/// overwritten when a slot is found missing, consumed the moment the
/// awaited slot is supplied (see the engine for the mention exemption).
#[derive(Default)]
pub struct PendingStore {
    inner: RwLock<HashMap<(u64, ParamKind), PendingRequest>>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or silently overwrite the entry for this user and kind
    pub async fn insert(&self, request: PendingRequest) {
        let key = (request.user_id, request.awaiting_kind);
        self.inner.write().await.insert(key, request);
    }

    /// The entry a user's next message answers, if any.
    ///
    /// With several pending kinds for one user, the earliest kind in
    /// [`ParamKind::ALL`] wins; the rest stay parked untouched.
    pub async fn peek_for_user(&self, user_id: u64) -> Option<PendingRequest> {
        let inner = self.inner.read().await;
        ParamKind::ALL
            .iter()
            .find_map(|kind| inner.get(&(user_id, *kind)).cloned())
    }

    /// Consume an entry
    pub async fn remove(&self, user_id: u64, kind: ParamKind) -> Option<PendingRequest> {
        self.inner.write().await.remove(&(user_id, kind))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

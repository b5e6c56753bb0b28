// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Arbitrates which controller processes the request stream of a process.
//!
//! Several independent pipelines may be hosted in one process and all of them
//! may observe the same HTTP events. Only the oldest attached listener acts on
//! them; when it detaches, the next oldest takes over.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use tracing::{debug, warn};

/// Identity of an attached listener. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    /// Id of the authoritative listener, `0` when none is attached.
    active: AtomicU64,
    /// Attached listeners, oldest first.
    attached: Mutex<Vec<ListenerId>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. It becomes active if no other listener is attached.
    pub fn attach(&self) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);

        match self.attached.lock() {
            Ok(mut attached) => {
                attached.push(id);
                self.active.store(attached[0].0, Ordering::Release);
            }
            Err(e) => {
                warn!("Listener registry lock poisoned, listener {} stays inactive: {e}", id.0);
            }
        }

        debug!("Attached listener {}", id.0);
        id
    }

    /// Unregisters a listener. Detaching an unknown id does nothing.
    pub fn detach(&self, id: ListenerId) {
        let Ok(mut attached) = self.attached.lock() else {
            warn!("Listener registry lock poisoned, cannot detach listener {}", id.0);
            return;
        };

        attached.retain(|l| *l != id);
        let next = attached.first().map_or(0, |l| l.0);
        self.active.store(next, Ordering::Release);

        debug!("Detached listener {}", id.0);
    }

    /// `true` if `id` is the listener that should process requests.
    #[must_use]
    pub fn is_active(&self, id: ListenerId) -> bool {
        self.active.load(Ordering::Acquire) == id.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attached.lock().map_or(0, |attached| attached.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::domain::{ChatId, SessionState};

type Slot = Arc<AsyncMutex<Option<SessionState>>>;

/// Per-chat conversation state. Holding a chat's [`SessionGuard`] serializes its messages;
/// different chats never wait on each other.
#[derive(Debug, Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<ChatId, Slot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(self: &Arc<Self>, chat: ChatId) -> SessionGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            slots.entry(chat).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        SessionGuard {
            store: self.clone(),
            chat,
            guard: Some(guard),
        }
    }

    /// Current state without taking the chat lock for long; test and diagnostics helper.
    pub async fn peek(&self, chat: ChatId) -> Option<SessionState> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            slots.get(&chat).cloned()
        }?;
        let state = slot.lock().await;
        state.clone()
    }

    pub fn active_sessions(&self) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    fn evict_if_idle(&self, chat: ChatId) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        let idle = slots.get(&chat).is_some_and(|slot| {
            Arc::strong_count(slot) == 1
                && slot.try_lock().map(|state| state.is_none()).unwrap_or(false)
        });
        if idle {
            slots.remove(&chat);
        }
    }
}

/// Exclusive access to one chat's state; a cleared slot is evicted on drop.
pub struct SessionGuard {
    store: Arc<SessionStore>,
    chat: ChatId,
    guard: Option<OwnedMutexGuard<Option<SessionState>>>,
}

impl SessionGuard {
    pub fn state(&self) -> Option<&SessionState> {
        self.guard.as_ref().and_then(|guard| guard.as_ref())
    }

    pub fn state_mut(&mut self) -> Option<&mut SessionState> {
        self.guard.as_mut().and_then(|guard| guard.as_mut())
    }

    pub fn set(&mut self, state: SessionState) {
        if let Some(guard) = self.guard.as_mut() {
            **guard = Some(state);
        }
    }

    pub fn clear(&mut self) {
        if let Some(guard) = self.guard.as_mut() {
            **guard = None;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // release the slot before checking whether it can go
        drop(self.guard.take());
        self.store.evict_if_idle(self.chat);
    }
}

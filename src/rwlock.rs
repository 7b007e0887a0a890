//! Per-container read/write lock with writer preference.
//!
//! Many readers OR one writer per container tag; a waiting writer blocks
//! new readers so it cannot starve under a steady stream of readers.
//! Disjoint tags never block each other — each gets its own [`TagLock`].

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// Internal state for one container tag's lock.
struct TagState {
    readers: usize,
    writer_active: bool,
    writer_waiting: bool,
}

/// The lock for a single container tag.
struct TagLock {
    state: Mutex<TagState>,
    notify: Notify,
}

impl TagLock {
    fn new() -> Self {
        Self {
            state: Mutex::new(TagState {
                readers: 0,
                writer_active: false,
                writer_waiting: false,
            }),
            notify: Notify::new(),
        }
    }
}

/// Registry handing out per-tag locks, created lazily on first use.
#[derive(Clone, Default)]
pub struct ContainerLocks {
    tags: Arc<Mutex<HashMap<String, Arc<TagLock>>>>,
}

/// Held while a read (`search`, `hasData`, counts, snapshot read) is in progress.
pub struct ReadGuard {
    lock: Arc<TagLock>,
}

/// Held while a write (`ingest`, `clear`, snapshot write) is in progress.
pub struct WriteGuard {
    lock: Arc<TagLock>,
}

impl ContainerLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn tag_lock(&self, tag: &str) -> Arc<TagLock> {
        let mut tags = self.tags.lock().await;
        tags.entry(tag.to_string())
            .or_insert_with(|| Arc::new(TagLock::new()))
            .clone()
    }

    /// Acquire a shared read lock on `tag`. Blocks while a writer is active
    /// or waiting, so readers never observe state mid-write and cannot
    /// starve a pending writer.
    pub async fn read(&self, tag: &str) -> ReadGuard {
        let lock = self.tag_lock(tag).await;
        loop {
            {
                let mut state = lock.state.lock().await;
                if !state.writer_active && !state.writer_waiting {
                    state.readers += 1;
                    return ReadGuard { lock };
                }
            }
            lock.notify.notified().await;
        }
    }

    /// Acquire the exclusive write lock on `tag`. Waits for the current
    /// writer (if any) to finish, then for all current readers to drain.
    pub async fn write(&self, tag: &str) -> WriteGuard {
        let lock = self.tag_lock(tag).await;
        {
            let mut state = lock.state.lock().await;
            // Announce intent immediately so new readers block behind us.
            while state.writer_active {
                drop(state);
                lock.notify.notified().await;
                state = lock.state.lock().await;
            }
            state.writer_waiting = true;
        }
        loop {
            {
                let mut state = lock.state.lock().await;
                if state.readers == 0 {
                    state.writer_waiting = false;
                    state.writer_active = true;
                    return WriteGuard { lock };
                }
            }
            lock.notify.notified().await;
        }
    }
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        let lock = self.lock.clone();
        tokio::spawn(async move {
            let mut state = lock.state.lock().await;
            state.readers = state.readers.saturating_sub(1);
            drop(state);
            lock.notify.notify_waiters();
        });
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        let lock = self.lock.clone();
        tokio::spawn(async move {
            let mut state = lock.state.lock().await;
            state.writer_active = false;
            drop(state);
            lock.notify.notify_waiters();
        });
    }
}

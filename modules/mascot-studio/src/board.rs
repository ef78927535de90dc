//! Observable pipeline state. Every mutation publishes a fresh snapshot
//! to `watch` subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::watch;

use crate::types::{ItemId, SceneItem, VideoItem};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneBoard {
    pub scenes: Vec<SceneItem>,
    /// True from submission until the last scene settles.
    pub processing: bool,
    /// Set when the script breakdown itself failed.
    pub batch_error: Option<String>,
}

impl SceneBoard {
    pub fn scene(&self, id: ItemId) -> Option<&SceneItem> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub(crate) fn scene_mut(&mut self, id: ItemId) -> Option<&mut SceneItem> {
        self.scenes.iter_mut().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoBoard {
    pub items: IndexMap<ItemId, VideoItem>,
    pub running: bool,
}

impl VideoBoard {
    pub fn get(&self, id: ItemId) -> Option<&VideoItem> {
        self.items.get(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &VideoItem> {
        self.items.values()
    }
}

/// Mutex-guarded state plus a watch channel of its snapshots.
/// The lock is only held inside the closures passed to `read`/`update`.
pub struct Board<S> {
    state: Mutex<S>,
    tx: watch::Sender<S>,
}

impl<S: Clone> Board<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(initial),
            tx,
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Mutate and publish.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut state);
        self.tx.send_replace(state.clone());
        out
    }

    pub fn snapshot(&self) -> S {
        self.read(S::clone)
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }
}

/// Held for the duration of one pipeline run; dropping it frees the flag.
pub(crate) struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

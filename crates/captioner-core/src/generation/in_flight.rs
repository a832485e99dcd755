//! The in-flight table: which image paths have an outstanding backend call,
//! and the token that cancels it.
//!
//! Every mutation happens under one `std::sync::Mutex`. The lock is only held
//! for map operations and is never held across an `.await`.

use crate::error::CaptionError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub(crate) struct InFlightTable {
    state: Mutex<TableState>,
}

#[derive(Default)]
struct TableState {
    next_id: u64,
    entries: HashMap<PathBuf, Entry>,
}

struct Entry {
    id: u64,
    token: CancellationToken,
}

impl InFlightTable {
    fn lock(&self) -> MutexGuard<'_, TableState> {
        // A panic while holding the lock cannot leave the map half-updated,
        // so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert an entry for `path`, or fail if one already exists.
    ///
    /// The returned guard removes the entry when dropped.
    pub(crate) fn try_insert(self: &Arc<Self>, path: &Path) -> Result<InFlightGuard, CaptionError> {
        let mut state = self.lock();
        if state.entries.contains_key(path) {
            return Err(CaptionError::AlreadyInFlight(path.to_path_buf()));
        }
        state.next_id += 1;
        let id = state.next_id;
        let token = CancellationToken::new();
        state.entries.insert(
            path.to_path_buf(),
            Entry {
                id,
                token: token.clone(),
            },
        );
        drop(state);

        Ok(InFlightGuard {
            table: Arc::clone(self),
            path: path.to_path_buf(),
            id,
            token,
        })
    }

    /// Signal the entry for `path`. Returns whether one existed.
    pub(crate) fn cancel(&self, path: &Path) -> bool {
        let token = self.lock().entries.get(path).map(|e| e.token.clone());
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Signal every entry and clear the table in one step.
    pub(crate) fn cancel_all(&self) -> usize {
        let drained: Vec<Entry> = {
            let mut state = self.lock();
            state.entries.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &drained {
            entry.token.cancel();
        }
        drained.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub(crate) fn contains(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    /// Remove the entry for `path` only if it is still the one `id` created.
    ///
    /// After `cancel_all` a new request may already own the path; its entry
    /// must survive the old request finishing.
    fn remove(&self, path: &Path, id: u64) {
        let mut state = self.lock();
        if state.entries.get(path).is_some_and(|e| e.id == id) {
            state.entries.remove(path);
        }
    }
}

/// Ownership of one in-flight entry.
///
/// Dropping the guard removes the entry, so it is removed exactly once
/// however the call ends, including by panic.
pub(crate) struct InFlightGuard {
    table: Arc<InFlightTable>,
    path: PathBuf,
    id: u64,
    token: CancellationToken,
}

impl InFlightGuard {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.table.remove(&self.path, self.id);
    }
}

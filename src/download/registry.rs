//! Registry of in-flight extraction processes.
//!
//! Maps a download id to the cancellation handle of its running external
//! process. Exists solely to enable cancellation: the lifecycle manager
//! registers a handle when it spawns and removes it on exit, and a user
//! stop signals through it. Owned explicitly and injected rather than
//! living as ambient global state, so tests can assert on cancellations.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::storage::DownloadId;

/// One live process handle per download id. One download never has more
/// than one concurrent process; a second `register` for the same id
/// overwrites the previous entry.
#[derive(Default)]
pub struct ProcessRegistry {
    handles: DashMap<DownloadId, CancellationToken>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
        }
    }

    pub fn register(&self, id: DownloadId, token: CancellationToken) {
        self.handles.insert(id, token);
    }

    /// Drop a handle without signaling it (process exited on its own).
    pub fn remove(&self, id: DownloadId) {
        self.handles.remove(&id);
    }

    /// Signal the registered process and remove its handle. Best-effort
    /// and asynchronous; the kill is not awaited. Returns whether a
    /// handle was registered.
    pub fn cancel(&self, id: DownloadId) -> bool {
        match self.handles.remove(&id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: DownloadId) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_cancel() {
        let registry = ProcessRegistry::new();
        let token = CancellationToken::new();
        registry.register(1, token.clone());
        assert!(registry.contains(1));

        assert!(registry.cancel(1));
        assert!(token.is_cancelled());
        assert!(!registry.contains(1));
    }

    #[test]
    fn test_cancel_unknown_id() {
        let registry = ProcessRegistry::new();
        assert!(!registry.cancel(42));
    }

    #[test]
    fn test_cancel_is_not_repeatable() {
        let registry = ProcessRegistry::new();
        registry.register(1, CancellationToken::new());
        assert!(registry.cancel(1));
        assert!(!registry.cancel(1));
    }

    #[test]
    fn test_remove_does_not_signal() {
        let registry = ProcessRegistry::new();
        let token = CancellationToken::new();
        registry.register(1, token.clone());
        registry.remove(1);
        assert!(!token.is_cancelled());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregister_overwrites() {
        let registry = ProcessRegistry::new();
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        registry.register(1, first.clone());
        registry.register(1, second.clone());
        assert_eq!(registry.len(), 1);

        registry.cancel(1);
        assert!(second.is_cancelled());
        assert!(!first.is_cancelled());
    }
}

//! `PendingRequestMap<Output>`: mapping from session id to a promise
//! resolving to a response, a method error, or an application error.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::channel::oneshot;

use crate::error::MemConError;
use crate::id::SessionId;
use crate::router::app_error::ErrorCode;

/// The three ways a pending method request resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodOutcome<Output> {
    Ok(Output),
    MethodError(MemConError),
    ApplicationError(ErrorCode),
}

/// The future a caller of a method request awaits.
pub type MethodFuture<Output> = oneshot::Receiver<MethodOutcome<Output>>;

/// Internally-synchronized map from [`SessionId`] to the promise awaiting
/// its response. At most one entry per session id; operations are
/// `insert`, `move_out_request` (idempotent removal by key), and
/// `move_out_next_request` (pop arbitrary) — iteration is never exposed.
pub struct PendingRequestMap<Output> {
    inner: Mutex<HashMap<SessionId, oneshot::Sender<MethodOutcome<Output>>>>,
}

impl<Output> Default for PendingRequestMap<Output> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<Output> PendingRequestMap<Output> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh promise for `session`. Identical session ids
    /// arriving for the same (service, instance, client, method) collapse
    /// to a single entry; a second arrival for a still-pending session is
    /// treated as a protocol error, enforced here as a hard precondition
    /// violation, since the proxy-side session generator is supposed to
    /// make this unreachable in practice.
    pub fn insert(&self, session: SessionId) -> Result<MethodFuture<Output>, MemConError> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().unwrap();
        if inner.contains_key(&session) {
            return Err(MemConError::DuplicateSession { session });
        }
        inner.insert(session, tx);
        Ok(rx)
    }

    /// Idempotent removal by key: returns the sender if `session` was
    /// still pending, `None` if it had already been resolved or never
    /// existed.
    pub fn move_out_request(&self, session: SessionId) -> Option<oneshot::Sender<MethodOutcome<Output>>> {
        self.inner.lock().unwrap().remove(&session)
    }

    /// Pops an arbitrary pending entry; used by cancellation sweeps that
    /// don't care about a particular session id.
    pub fn move_out_next_request(&self) -> Option<(SessionId, oneshot::Sender<MethodOutcome<Output>>)> {
        let mut inner = self.inner.lock().unwrap();
        let key = *inner.keys().next()?;
        inner.remove(&key).map(|tx| (key, tx))
    }

    /// Resolves every pending request with an artificial
    /// `kServiceNotAvailable`, draining the map.
    pub fn cancel_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        for (_, tx) in inner.drain() {
            let _ = tx.send(MethodOutcome::MethodError(MemConError::ServiceNotAvailable));
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_session_id_is_a_protocol_error() {
        let map: PendingRequestMap<()> = PendingRequestMap::new();
        map.insert(SessionId(1)).unwrap();
        assert!(matches!(
            map.insert(SessionId(1)),
            Err(MemConError::DuplicateSession { session: SessionId(1) })
        ));
    }

    #[test]
    fn cancel_all_resolves_every_pending_future_and_empties_the_map() {
        let map: PendingRequestMap<u32> = PendingRequestMap::new();
        let mut futures = Vec::new();
        for session in [1u32, 2, 3] {
            futures.push(map.insert(SessionId(session)).unwrap());
        }
        assert_eq!(map.len(), 3);
        map.cancel_all();
        assert!(map.is_empty());
        for mut fut in futures {
            let outcome = fut.try_recv().unwrap().unwrap();
            assert_eq!(outcome, MethodOutcome::MethodError(MemConError::ServiceNotAvailable));
        }
    }

    #[test]
    fn move_out_request_is_idempotent() {
        let map: PendingRequestMap<()> = PendingRequestMap::new();
        map.insert(SessionId(5)).unwrap();
        assert!(map.move_out_request(SessionId(5)).is_some());
        assert!(map.move_out_request(SessionId(5)).is_none());
    }
}

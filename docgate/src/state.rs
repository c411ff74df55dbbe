//! Connection state machine and the queue of operations waiting on it.

use std::collections::VecDeque;
use futures::channel::oneshot;

use docgate_core::error::{DocumentStoreError, DocumentStoreResult};

/// Readiness of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected. Initial state, and the state after a failed attempt.
    #[default]
    Disconnected,

    /// Resolving credentials and attaching a client
    Connecting,

    /// Client attached, operations run immediately
    Connected,

    /// Closed by the caller. Terminal.
    Disconnecting,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnecting)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> DocumentStoreResult<()> {
        if !self.can_transition_to(next) {
            return Err(DocumentStoreError::invalid_state(
                format!("valid transition from {}", self),
                next,
            ));
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnecting => write!(f, "disconnecting"),
        }
    }
}


/// Operations deferred while a connection is being established.
///
/// Each entry is the sending half of a one-shot channel; the waiting
/// operation holds the receiver. A waiter is released with a `T`, or
/// rejected with an error.
pub struct PendingQueue<T = ()> {
    waiters: VecDeque<oneshot::Sender<DocumentStoreResult<T>>>,
}

impl<T> PendingQueue<T> {
    /// Appends a waiter and returns the receiver it will be settled through.
    pub fn push(&mut self) -> oneshot::Receiver<DocumentStoreResult<T>> {
        let (sender, receiver) = oneshot::channel();
        self.waiters.push_back(sender);
        receiver
    }

    /// Removes the oldest waiter.
    pub fn pop(&mut self) -> Option<oneshot::Sender<DocumentStoreResult<T>>> {
        self.waiters.pop_front()
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Moves every waiter out, leaving this queue empty.
    pub fn take(&mut self) -> PendingQueue<T> {
        std::mem::take(self)
    }

    /// Fails every waiter with [`DocumentStoreError::ConnectionUnavailable`], oldest first.
    pub fn reject_all(self, reason: &str) {
        for waiter in self.waiters {
            // The receiver is gone when the waiting operation was dropped.
            let _ = waiter.send(Err(DocumentStoreError::ConnectionUnavailable(reason.to_string())));
        }
    }
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self { waiters: VecDeque::new() }
    }
}

impl<T> std::fmt::Debug for PendingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQueue")
            .field("waiters", &self.waiters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_transitions() {
        let mut state = ConnectionState::default();
        assert!(state.transition(ConnectionState::Connecting).is_ok());
        assert!(state.transition(ConnectionState::Connected).is_ok());
        assert!(state.transition(ConnectionState::Disconnecting).is_ok());
    }

    #[test]
    fn test_failed_attempt_returns_to_disconnected() {
        let mut state = ConnectionState::Connecting;
        assert!(state.transition(ConnectionState::Disconnected).is_ok());
        assert!(state.transition(ConnectionState::Connecting).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut state = ConnectionState::Connected;
        let err = state.transition(ConnectionState::Connecting).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid connection state: expected valid transition from connected, found connecting"
        );
        assert_eq!(state, ConnectionState::Connected);

        let mut state = ConnectionState::Disconnecting;
        assert!(state.transition(ConnectionState::Connecting).is_err());
        assert!(state.transition(ConnectionState::Connected).is_err());
    }

    #[test]
    fn test_queue_pops_oldest_first() {
        let mut queue = PendingQueue::<usize>::default();
        let mut receivers = vec![queue.push(), queue.push(), queue.push()];
        assert_eq!(queue.len(), 3);

        let mut released = 0;
        while let Some(waiter) = queue.pop() {
            waiter.send(Ok(released)).unwrap();
            released += 1;
        }
        assert!(queue.is_empty());

        for (expected, receiver) in receivers.iter_mut().enumerate() {
            assert!(matches!(receiver.try_recv(), Ok(Some(Ok(index))) if index == expected));
        }
    }

    #[test]
    fn test_queue_rejects_every_waiter() {
        let mut queue = PendingQueue::<()>::default();
        let mut first = queue.push();
        let mut second = queue.push();
        drop(queue.push());

        queue.take().reject_all("connect failed");

        for receiver in [&mut first, &mut second] {
            assert!(matches!(
                receiver.try_recv(),
                Ok(Some(Err(DocumentStoreError::ConnectionUnavailable(reason)))) if reason == "connect failed"
            ));
        }
    }
}

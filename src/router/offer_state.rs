//! `OfferState`: the serving status of a provided service instance encoded
//! as the parity of a monotonic counter.

use std::sync::Mutex;

/// A monotonically increasing session counter whose parity answers "is
/// offered?" without a separate boolean. Starts stopped
/// (counter `0`, even).
#[derive(Debug, Default)]
pub struct OfferState {
    counter: Mutex<u64>,
}

impl OfferState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_offered(&self) -> bool {
        *self.counter.lock().unwrap() % 2 == 1
    }

    /// The raw counter value, exposed for tracing/diagnostics.
    pub fn session(&self) -> u64 {
        *self.counter.lock().unwrap()
    }

    /// Sets the offered/stopped status. Increments the counter only when
    /// the status actually changes, so that `set_offered(false)` called
    /// twice in a row is equivalent to calling it once.
    pub fn set_offered(&self, offered: bool) {
        let mut counter = self.counter.lock().unwrap();
        if (*counter % 2 == 1) != offered {
            *counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_stopped() {
        let state = OfferState::new();
        assert!(!state.is_offered());
    }

    #[test]
    fn start_then_stop_round_trips_parity() {
        let state = OfferState::new();
        state.set_offered(true);
        assert!(state.is_offered());
        assert_eq!(state.session() % 2, 1);
        state.set_offered(false);
        assert!(!state.is_offered());
        assert_eq!(state.session() % 2, 0);
    }

    #[test]
    fn repeated_stop_is_a_no_op() {
        let state = OfferState::new();
        state.set_offered(false);
        let after_first = state.session();
        state.set_offered(false);
        assert_eq!(state.session(), after_first);
    }
}

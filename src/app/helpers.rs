//! Contains helper functions to reduce boilerplate code in other `app` modules.

use std::sync::{Arc, Mutex, PoisonError};

use super::state::SessionState;

/// Locks the session, runs `update_fn`, and releases the lock before
/// returning its result.
///
/// Never call this with a closure that awaits; the store only holds the
/// lock for synchronous bookkeeping.
pub fn with_session<F, R>(state: &Arc<Mutex<SessionState>>, update_fn: F) -> R
where
    F: FnOnce(&mut SessionState) -> R,
{
    let mut state_guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    update_fn(&mut state_guard)
}

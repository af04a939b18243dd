//! Session Validator (spec §4.2): a pure predicate over request headers and
//! the transport's session state.

use crate::{error::GateError, ids::SessionId};

/// The transport's session-lifecycle state (spec §3's "Session state"
/// entity). `started` flips once in [`crate::Transport::start`];
/// `session_id` is assigned at most once, by the initialize POST, and
/// cleared only by `close()`. `closed` is an ambient addition (SPEC_FULL
/// §9 / DESIGN.md open-question resolution) used only to stop a dispatch
/// task that lost the race against a `close()` from invoking `on_message`
/// on a transport that no longer exists.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub session_id: Option<SessionId>,
    pub initialized: bool,
    pub started: bool,
    pub closed: bool,
}

impl SessionState {
    /// Clears session identity on `close()` without forgetting that the
    /// transport was started (and is now closed) — a fresh [`Default`]
    /// would also erase those two flags, which must persist.
    pub fn reset_session_only(&mut self) {
        self.session_id = None;
        self.initialized = false;
    }
}

/// Validate a non-initialize request against the current session state.
///
/// `stateful` is `false` when the transport has no `sessionIdGenerator`
/// configured, in which case every request is valid (spec §4.2 rule 1) and
/// no session header is ever required or checked.
pub fn validate_session(
    stateful: bool,
    state: &SessionState,
    header_session_id: Option<&str>,
) -> Result<(), GateError> {
    if !stateful {
        return Ok(());
    }
    if !state.initialized {
        return Err(GateError::NotInitialized);
    }
    let Some(header_session_id) = header_session_id else {
        return Err(GateError::SessionIdRequired);
    };
    let current = state.session_id.as_ref().map(SessionId::as_str);
    if current != Some(header_session_id) {
        return Err(GateError::SessionNotFound);
    }
    Ok(())
}

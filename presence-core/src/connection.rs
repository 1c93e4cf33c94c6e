// Connection lifecycle state machine.
// Invariants: Halted is terminal; every other move must be listed in next_connection_state.

use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Associating,
    SessionUp,
    Degraded,
    Halted,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Associating => "associating",
            ConnectionState::SessionUp => "session_up",
            ConnectionState::Degraded => "degraded",
            ConnectionState::Halted => "halted",
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, ConnectionState::SessionUp)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Start,
    SessionEstablished,
    SessionLost,
    RecoveryStarted,
    RetriesExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no transition from {from:?} on {event:?}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub event: ConnectionEvent,
}

pub fn next_connection_state(current: ConnectionState, event: ConnectionEvent) -> Option<ConnectionState> {
    use ConnectionEvent as E;
    use ConnectionState as S;

    match (current, event) {
        (S::Halted, _) => None,
        (_, E::RetriesExhausted) => Some(S::Halted),
        (S::Disconnected, E::Start) => Some(S::Associating),
        (S::Associating, E::SessionEstablished) => Some(S::SessionUp),
        (S::SessionUp, E::SessionLost) => Some(S::Degraded),
        (S::Degraded, E::RecoveryStarted) => Some(S::Associating),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct ConnectionTracker {
    state: ConnectionState,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn apply(&mut self, event: ConnectionEvent) -> Result<ConnectionTransition, InvalidTransition> {
        let from = self.state;
        let to = next_connection_state(from, event).ok_or(InvalidTransition { from, event })?;
        self.state = to;
        Ok(ConnectionTransition { from, to })
    }
}

// Presence events emitted by the classifier.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    MacroPresence,
    MicroPresence,
    Absence,
}

impl PresenceState {
    /// Telemetry `io` code: absence 0, macro 1, micro 2.
    pub fn event_code(&self) -> u8 {
        match self {
            PresenceState::Absence => 0,
            PresenceState::MacroPresence => 1,
            PresenceState::MicroPresence => 2,
        }
    }

    pub fn is_presence(&self) -> bool {
        !matches!(self, PresenceState::Absence)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceState::MacroPresence => "macro_presence",
            PresenceState::MicroPresence => "micro_presence",
            PresenceState::Absence => "absence",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PresenceEvent {
    pub state: PresenceState,
    pub range_bin: i32,
    pub timestamp_ms: u64,
}

impl PresenceEvent {
    pub fn new(state: PresenceState, range_bin: i32, timestamp_ms: u64) -> Self {
        Self {
            state,
            range_bin,
            timestamp_ms,
        }
    }

    /// Distance estimate in metres; absence carries no distance.
    pub fn distance_m(&self, bin_length: f32) -> Option<f32> {
        if self.state.is_presence() {
            Some(self.range_bin as f32 * bin_length)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_only_for_presence() {
        let macro_event = PresenceEvent::new(PresenceState::MacroPresence, 3, 10);
        let absence = PresenceEvent::new(PresenceState::Absence, 3, 10);
        let distance = macro_event.distance_m(0.2).unwrap();
        assert!((distance - 0.6).abs() < 1e-6);
        assert_eq!(absence.distance_m(0.2), None);
    }

    #[test]
    fn event_codes() {
        assert_eq!(PresenceState::Absence.event_code(), 0);
        assert_eq!(PresenceState::MacroPresence.event_code(), 1);
        assert_eq!(PresenceState::MicroPresence.event_code(), 2);
    }
}

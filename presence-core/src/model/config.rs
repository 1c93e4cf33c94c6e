// Classifier configuration, remote property snapshot, and configuration commands.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceMode {
    MacroOnly,
    MicroOnly,
    #[default]
    MicroIfMacro,
    MicroAndMacro,
}

impl PresenceMode {
    pub const ALL: [PresenceMode; 4] = [
        PresenceMode::MacroOnly,
        PresenceMode::MicroOnly,
        PresenceMode::MicroIfMacro,
        PresenceMode::MicroAndMacro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceMode::MacroOnly => "macro_only",
            PresenceMode::MicroOnly => "micro_only",
            PresenceMode::MicroIfMacro => "micro_if_macro",
            PresenceMode::MicroAndMacro => "micro_and_macro",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == token)
    }

    pub fn detects_macro(&self) -> bool {
        !matches!(self, PresenceMode::MicroOnly)
    }
}

/// Presence classifier configuration.
///
/// Only `max_range_bin`, the two thresholds and `mode` are remotely
/// configurable; the remaining fields are fixed tuning for the sensor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassifierConfig {
    pub bandwidth_hz: f32,
    pub samples_per_chirp: usize,
    pub min_range_bin: i32,
    pub max_range_bin: i32,
    pub macro_threshold: f32,
    pub micro_threshold: f32,
    pub mode: PresenceMode,
    pub macro_compare_interval_ms: u64,
    pub macro_movement_validity_ms: u64,
    pub micro_movement_validity_ms: u64,
}

impl ClassifierConfig {
    pub fn for_samples(samples_per_chirp: usize) -> Self {
        Self {
            bandwidth_hz: 460e6,
            samples_per_chirp,
            min_range_bin: 1,
            max_range_bin: 5,
            macro_threshold: 0.5,
            micro_threshold: 12.5,
            mode: PresenceMode::MicroIfMacro,
            macro_compare_interval_ms: 250,
            macro_movement_validity_ms: 1000,
            micro_movement_validity_ms: 4000,
        }
    }

    /// Returns a copy with one command applied. `bin_length` converts a
    /// metric range into range bins.
    pub fn with_command(&self, command: &ConfigCommand, bin_length: f32) -> Self {
        let mut next = self.clone();
        match *command {
            ConfigCommand::MaxRange(metres) => {
                if bin_length > 0.0 {
                    next.max_range_bin = (metres / bin_length) as i32;
                }
            }
            ConfigCommand::MacroThreshold(value) => next.macro_threshold = value,
            ConfigCommand::MicroThreshold(value) => next.micro_threshold = value,
            ConfigCommand::Mode(mode) => next.mode = mode,
        }
        next
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::for_samples(128)
    }
}

/// One validated remote property change, consumed by the config worker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "property", content = "value", rename_all = "snake_case")]
pub enum ConfigCommand {
    MaxRange(f32),
    MacroThreshold(f32),
    MicroThreshold(f32),
    Mode(PresenceMode),
}

impl ConfigCommand {
    pub fn property_name(&self) -> &'static str {
        match self {
            ConfigCommand::MaxRange(_) => "max_range",
            ConfigCommand::MacroThreshold(_) => "macro_threshold",
            ConfigCommand::MicroThreshold(_) => "micro_threshold",
            ConfigCommand::Mode(_) => "mode",
        }
    }
}

/// Remotely reported property values, echoed back in acknowledgements.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PropertyAttributes {
    pub max_range: f32,
    pub macro_threshold: f32,
    pub micro_threshold: f32,
    pub mode: PresenceMode,
}

impl PropertyAttributes {
    pub fn apply(&mut self, command: &ConfigCommand) {
        match *command {
            ConfigCommand::MaxRange(value) => self.max_range = value,
            ConfigCommand::MacroThreshold(value) => self.macro_threshold = value,
            ConfigCommand::MicroThreshold(value) => self.micro_threshold = value,
            ConfigCommand::Mode(mode) => self.mode = mode,
        }
    }
}

impl Default for PropertyAttributes {
    fn default() -> Self {
        Self {
            max_range: 2.0,
            macro_threshold: 1.0,
            micro_threshold: 25.0,
            mode: PresenceMode::MicroIfMacro,
        }
    }
}

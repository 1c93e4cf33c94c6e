// Core data models for frames, presence events, and classifier configuration.

mod config;
mod event;
mod frame;

pub use config::{ClassifierConfig, ConfigCommand, PresenceMode, PropertyAttributes};
pub use event::{PresenceEvent, PresenceState};
pub use frame::{Frame, FrameError, FrameLayout, RawFrame, ADC_FULL_SCALE};

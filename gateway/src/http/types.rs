// HTTP response payload types.

use serde::Serialize;

use presence_core::connection::{ConnectionState, ConnectionTransition};
use presence_core::model::{ClassifierConfig, PresenceEvent, PropertyAttributes};

use crate::app::StatsSnapshot;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connection: ConnectionState,
    pub transitions: Vec<ConnectionTransition>,
    pub presence: Option<PresenceEvent>,
    pub classifier: ClassifierConfig,
    pub attributes: PropertyAttributes,
    pub stats: StatsSnapshot,
}

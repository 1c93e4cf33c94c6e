// Device identity and topic derivation.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("device id must be 16 lowercase hex digits, got {0:?}")]
    InvalidDeviceId(String),
    #[error("tenant id must be non-empty and free of '/', '+' and '#'")]
    InvalidTenant,
}

/// 16-hex-digit client identifier derived from the sensor's unique id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn from_unique_id(unique_id: u64) -> Self {
        Self(format!("{unique_id:016x}"))
    }

    pub fn parse(text: &str) -> Result<Self, TopicError> {
        let valid = text.len() == 16
            && text
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if valid {
            Ok(Self(text.to_string()))
        } else {
            Err(TopicError::InvalidDeviceId(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Topics used for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topics {
    pub telemetry: String,
    pub property_publish: String,
    pub property_subscribe: String,
    pub last_will: String,
}

impl Topics {
    pub fn derive(tenant_id: &str, device: &DeviceId) -> Result<Self, TopicError> {
        if tenant_id.is_empty() || tenant_id.contains(['/', '+', '#']) {
            return Err(TopicError::InvalidTenant);
        }
        Ok(Self {
            telemetry: format!("{tenant_id}/{device}/telemetry"),
            property_publish: format!("$aws/things/{device}/shadow/update"),
            property_subscribe: format!("$aws/things/{device}/shadow/update/delta"),
            last_will: format!("lwt/things/{device}/shadow/update"),
        })
    }
}

// Outbound payload encoding for the property shadow and presence telemetry.
// Invariants: every encoded payload respects its topic's size cap; decimals are rendered with two places.

use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;
use thiserror::Error;

use crate::model::{PresenceEvent, PropertyAttributes};

pub const PROPERTY_PAYLOAD_CAP: usize = 3072;
pub const TELEMETRY_PAYLOAD_CAP: usize = 240;

pub const TELEMETRY_EVENT_NAME: &str = "RDR_SENSOR_PRESENCE_IN_OUT_EVENT";
pub const SENSOR_SOLUTION: &str = "XENSIV BGT60TR13C Presence Detection";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },
    #[error("payload of {len} bytes exceeds the {cap} byte cap")]
    TooLarge { len: usize, cap: usize },
    #[error("payload encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ShadowUpdate<R> {
    state: ShadowState<R>,
}

#[derive(Serialize)]
struct ShadowState<R> {
    reported: R,
    #[serde(skip_serializing_if = "Option::is_none")]
    desired: Option<Value>,
}

#[derive(Serialize)]
struct FirmwareReported<'a> {
    get_desired_state: u8,
    fw_version: &'a str,
    #[serde(rename = "ConnectedStatus")]
    connected_status: &'static str,
}

#[derive(Serialize)]
struct AckReported {
    get_desired_state: u8,
    #[serde(rename = "LocationSharing")]
    location_sharing: u8,
    #[serde(rename = "Deprovision")]
    deprovision: u8,
    max_range: Box<RawValue>,
    macro_threshold: Box<RawValue>,
    micro_threshold: Box<RawValue>,
    mode: &'static str,
    #[serde(rename = "Sensor_Solution")]
    sensor_solution: &'static str,
}

#[derive(Serialize)]
struct WillReported {
    #[serde(rename = "ConnectedStatus")]
    connected_status: &'static str,
}

#[derive(Serialize)]
struct TelemetryEnvelope {
    e: TelemetryBody,
}

#[derive(Serialize)]
struct TelemetryBody {
    n: &'static str,
    io: u8,
    b: u8,
    s: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    d: Option<Box<RawValue>>,
    t: u64,
}

fn fixed2(field: &'static str, value: f32) -> Result<Box<RawValue>, PayloadError> {
    if !value.is_finite() {
        return Err(PayloadError::NonFinite { field });
    }
    Ok(RawValue::from_string(format!("{value:.2}"))?)
}

fn encode<T: Serialize>(body: &T, cap: usize) -> Result<String, PayloadError> {
    let text = serde_json::to_string(body)?;
    if text.len() > cap {
        return Err(PayloadError::TooLarge { len: text.len(), cap });
    }
    Ok(text)
}

/// Announces the firmware version and asks the cloud for the desired state.
pub fn firmware_report(fw_version: &str) -> Result<String, PayloadError> {
    let body = ShadowUpdate {
        state: ShadowState {
            reported: FirmwareReported {
                get_desired_state: 1,
                fw_version,
                connected_status: "Connected",
            },
            desired: None,
        },
    };
    encode(&body, PROPERTY_PAYLOAD_CAP)
}

/// Reports the current property snapshot and clears the desired document.
pub fn property_ack(attributes: &PropertyAttributes) -> Result<String, PayloadError> {
    let body = ShadowUpdate {
        state: ShadowState {
            reported: AckReported {
                get_desired_state: 0,
                location_sharing: 0,
                deprovision: 0,
                max_range: fixed2("max_range", attributes.max_range)?,
                macro_threshold: fixed2("macro_threshold", attributes.macro_threshold)?,
                micro_threshold: fixed2("micro_threshold", attributes.micro_threshold)?,
                mode: attributes.mode.as_str(),
                sensor_solution: SENSOR_SOLUTION,
            },
            desired: Some(Value::Null),
        },
    };
    encode(&body, PROPERTY_PAYLOAD_CAP)
}

pub fn telemetry(event: &PresenceEvent, bin_length: f32, unix_secs: u64) -> Result<String, PayloadError> {
    let d = match event.distance_m(bin_length) {
        Some(distance) => Some(fixed2("distance", distance)?),
        None => None,
    };
    let body = TelemetryEnvelope {
        e: TelemetryBody {
            n: TELEMETRY_EVENT_NAME,
            io: event.state.event_code(),
            b: 1,
            s: 1,
            d,
            t: unix_secs,
        },
    };
    encode(&body, TELEMETRY_PAYLOAD_CAP)
}

/// Retained disconnect announcement armed in every connect request.
pub fn last_will() -> Result<String, PayloadError> {
    let body = ShadowUpdate {
        state: ShadowState {
            reported: WillReported {
                connected_status: "Disconnected",
            },
            desired: Some(Value::Null),
        },
    };
    encode(&body, PROPERTY_PAYLOAD_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PresenceMode, PresenceState};

    #[test]
    fn telemetry_renders_distance_with_two_decimals() {
        let event = PresenceEvent::new(PresenceState::MacroPresence, 3, 1_000);
        let text = telemetry(&event, 0.2, 1_700_000_000).unwrap();
        assert_eq!(
            text,
            r#"{"e":{"n":"RDR_SENSOR_PRESENCE_IN_OUT_EVENT","io":1,"b":1,"s":1,"d":0.60,"t":1700000000}}"#
        );
    }

    #[test]
    fn absence_omits_distance() {
        let event = PresenceEvent::new(PresenceState::Absence, 0, 1_000);
        let text = telemetry(&event, 0.2, 42).unwrap();
        assert_eq!(
            text,
            r#"{"e":{"n":"RDR_SENSOR_PRESENCE_IN_OUT_EVENT","io":0,"b":1,"s":1,"t":42}}"#
        );
    }

    #[test]
    fn ack_reports_current_attributes() {
        let mut attributes = PropertyAttributes::default();
        attributes.mode = PresenceMode::MacroOnly;
        let text = property_ack(&attributes).unwrap();
        assert_eq!(
            text,
            concat!(
                r#"{"state":{"reported":{"get_desired_state":0,"LocationSharing":0,"Deprovision":0,"#,
                r#""max_range":2.00,"macro_threshold":1.00,"micro_threshold":25.00,"mode":"macro_only","#,
                r#""Sensor_Solution":"XENSIV BGT60TR13C Presence Detection"},"desired":null}}"#
            )
        );
    }

    #[test]
    fn firmware_report_and_last_will_shapes() {
        assert_eq!(
            firmware_report("1.2.0").unwrap(),
            r#"{"state":{"reported":{"get_desired_state":1,"fw_version":"1.2.0","ConnectedStatus":"Connected"}}}"#
        );
        assert_eq!(
            last_will().unwrap(),
            r#"{"state":{"reported":{"ConnectedStatus":"Disconnected"},"desired":null}}"#
        );
    }

    #[test]
    fn oversize_and_non_finite_payloads_are_errors() {
        let version = "v".repeat(PROPERTY_PAYLOAD_CAP);
        assert!(matches!(firmware_report(&version), Err(PayloadError::TooLarge { .. })));

        let mut attributes = PropertyAttributes::default();
        attributes.max_range = f32::NAN;
        assert!(matches!(
            property_ack(&attributes),
            Err(PayloadError::NonFinite { field: "max_range" })
        ));
    }
}

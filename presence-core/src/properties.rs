// Remote property extraction: flatten inbound JSON, pick recognized keys, clamp to bounds.
// Invariants: an out-of-range numeric value is replaced by its lower bound, never dropped.

use serde_json::Value;
use thiserror::Error;

use crate::model::{ConfigCommand, PresenceMode};

pub const PARAMS_PARENT_OBJECT: &str = "state";

pub const MAX_RANGE_BOUNDS: (f32, f32) = (0.66, 10.2);
pub const MACRO_THRESHOLD_BOUNDS: (f32, f32) = (0.1, 100.0);
pub const MICRO_THRESHOLD_BOUNDS: (f32, f32) = (0.2, 99.0);

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("property payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl PropertyValue {
    fn from_scalar(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_f64().map(PropertyValue::Number),
            Value::String(text) => Some(PropertyValue::Text(text.clone())),
            Value::Bool(flag) => Some(PropertyValue::Bool(*flag)),
            Value::Null => Some(PropertyValue::Null),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// One leaf of an inbound document with the name of its enclosing object.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRecord {
    pub parent: String,
    pub key: String,
    pub value: PropertyValue,
}

/// A recognized property turned into a command. `clamped` carries the
/// received value when it was out of range and replaced by the minimum.
#[derive(Clone, Debug, PartialEq)]
pub struct Extracted {
    pub command: ConfigCommand,
    pub clamped: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rejected {
    pub key: String,
    pub reason: &'static str,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedUpdate {
    pub extracted: Vec<Extracted>,
    pub rejected: Vec<Rejected>,
}

/// Depth-first flattening of object leaves. Arrays are not descended.
pub fn flatten(document: &Value) -> Vec<PropertyRecord> {
    let mut records = Vec::new();
    walk("", document, &mut records);
    records
}

fn walk(parent: &str, value: &Value, records: &mut Vec<PropertyRecord>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        if child.is_object() {
            walk(key, child, records);
        } else if let Some(value) = PropertyValue::from_scalar(child) {
            records.push(PropertyRecord {
                parent: parent.to_string(),
                key: key.clone(),
                value,
            });
        }
    }
}

pub fn string_to_mode(token: &str) -> PresenceMode {
    PresenceMode::from_token(token).unwrap_or(PresenceMode::MicroIfMacro)
}

/// Returns the value when inside `[min, max]`, otherwise `min`.
pub fn clamp_to_minimum(value: f64, (min, max): (f32, f32)) -> (f32, bool) {
    let narrowed = value as f32;
    if narrowed >= min && narrowed <= max {
        (narrowed, false)
    } else {
        (min, true)
    }
}

fn numeric(
    record: &PropertyRecord,
    bounds: (f32, f32),
    build: fn(f32) -> ConfigCommand,
) -> Result<Extracted, Rejected> {
    let PropertyValue::Number(raw) = record.value else {
        return Err(Rejected {
            key: record.key.clone(),
            reason: "expected a number",
        });
    };
    let (value, clamped) = clamp_to_minimum(raw, bounds);
    Ok(Extracted {
        command: build(value),
        clamped: clamped.then_some(raw),
    })
}

fn extract(record: &PropertyRecord) -> Option<Result<Extracted, Rejected>> {
    if record.parent != PARAMS_PARENT_OBJECT {
        return None;
    }
    let extracted = match record.key.as_str() {
        "max_range" => numeric(record, MAX_RANGE_BOUNDS, ConfigCommand::MaxRange),
        "macro_threshold" => numeric(record, MACRO_THRESHOLD_BOUNDS, ConfigCommand::MacroThreshold),
        "micro_threshold" => numeric(record, MICRO_THRESHOLD_BOUNDS, ConfigCommand::MicroThreshold),
        "mode" => match &record.value {
            PropertyValue::Text(token) => Ok(Extracted {
                command: ConfigCommand::Mode(string_to_mode(token)),
                clamped: None,
            }),
            _ => Err(Rejected {
                key: record.key.clone(),
                reason: "expected a string",
            }),
        },
        _ => return None,
    };
    Some(extracted)
}

/// Parses one inbound property document into commands in document order.
pub fn parse_update(payload: &[u8]) -> Result<ParsedUpdate, PropertyError> {
    let document: Value = serde_json::from_slice(payload)?;
    let mut update = ParsedUpdate::default();
    for record in flatten(&document) {
        match extract(&record) {
            Some(Ok(extracted)) => update.extracted.push(extracted),
            Some(Err(rejected)) => update.rejected.push(rejected),
            None => {}
        }
    }
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(payload: &str) -> Vec<ConfigCommand> {
        parse_update(payload.as_bytes())
            .unwrap()
            .extracted
            .into_iter()
            .map(|extracted| extracted.command)
            .collect()
    }

    #[test]
    fn out_of_range_max_range_clamps_to_minimum() {
        let update = parse_update(br#"{"state":{"max_range":15.0}}"#).unwrap();
        assert_eq!(
            update.extracted,
            vec![Extracted {
                command: ConfigCommand::MaxRange(0.66),
                clamped: Some(15.0),
            }]
        );
    }

    #[test]
    fn in_range_values_pass_through() {
        assert_eq!(
            commands(r#"{"state":{"macro_threshold":3.5,"micro_threshold":40}}"#),
            vec![
                ConfigCommand::MacroThreshold(3.5),
                ConfigCommand::MicroThreshold(40.0),
            ]
        );
        assert_eq!(commands(r#"{"state":{"micro_threshold":0.1}}"#), vec![ConfigCommand::MicroThreshold(0.2)]);
        assert_eq!(commands(r#"{"state":{"max_range":10.2}}"#), vec![ConfigCommand::MaxRange(10.2)]);
    }

    #[test]
    fn mode_tokens_map_with_fallback() {
        assert_eq!(
            commands(r#"{"state":{"mode":"macro_only"}}"#),
            vec![ConfigCommand::Mode(PresenceMode::MacroOnly)]
        );
        assert_eq!(
            commands(r#"{"state":{"mode":"bogus"}}"#),
            vec![ConfigCommand::Mode(PresenceMode::MicroIfMacro)]
        );
        for mode in PresenceMode::ALL {
            assert_eq!(string_to_mode(mode.as_str()), mode);
        }
    }

    #[test]
    fn ignores_other_parents_and_unknown_keys() {
        let payload = r#"{"version":12,"max_range":3.0,"metadata":{"max_range":{"timestamp":1}},"state":{"colour":"red"}}"#;
        assert!(commands(payload).is_empty());
    }

    #[test]
    fn wrong_value_types_are_rejected() {
        let update = parse_update(br#"{"state":{"max_range":"far","mode":3}}"#).unwrap();
        assert!(update.extracted.is_empty());
        assert_eq!(update.rejected.len(), 2);
        assert_eq!(update.rejected[0].key, "max_range");
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_update(b"{not json").is_err());
    }

    #[test]
    fn flatten_records_parent_names() {
        let document: Value = serde_json::from_str(r#"{"a":1,"state":{"b":"x","inner":{"c":null}}}"#).unwrap();
        let records = flatten(&document);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].parent, "");
        assert_eq!(records[1].parent, "state");
        assert_eq!(records[2].parent, "inner");
        assert_eq!(records[2].value, PropertyValue::Null);
    }
}

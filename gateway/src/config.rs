// Environment-driven gateway configuration.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use presence_core::model::FrameLayout;
use presence_core::topics::{DeviceId, TopicError};

use crate::constants::{
    CHIRPS_PER_FRAME, DEFAULT_BROKER_ADDR, DEFAULT_HTTP_BIND, DEFAULT_HTTP_PORT, DEFAULT_TENANT_ID, FRAME_PERIOD_MS,
    HOSTNAME_PATH, MACHINE_ID_PATH, SAMPLES_PER_CHIRP,
};
use crate::supervisor::SupervisorSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid socket address: {value:?}")]
    InvalidAddress { key: &'static str, value: String },
    #[error("PRESENCE_DEVICE_ID: {0}")]
    DeviceId(#[from] TopicError),
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub tenant_id: String,
    pub device_id: DeviceId,
    pub broker_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub frame_file: Option<PathBuf>,
    pub frame_loop: bool,
    pub frame_period: Duration,
    pub frame_layout: FrameLayout,
    pub supervisor: SupervisorSettings,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let parsed = |key: &str| lookup(key).and_then(|value| value.trim().parse::<u64>().ok());
        let defaults = SupervisorSettings::default();

        let tenant_id = lookup("PRESENCE_TENANT_ID")
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_TENANT_ID.to_string());
        let device_id = match lookup("PRESENCE_DEVICE_ID") {
            Some(value) => DeviceId::parse(value.trim())?,
            None => local_device_id(),
        };

        let broker = lookup("PRESENCE_BROKER_ADDR").unwrap_or_else(|| DEFAULT_BROKER_ADDR.to_string());
        let broker_addr: SocketAddr = broker.parse().map_err(|_| ConfigError::InvalidAddress {
            key: "PRESENCE_BROKER_ADDR",
            value: broker.clone(),
        })?;

        let bind = lookup("HTTP_BIND").unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let port = lookup("HTTP_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_HTTP_PORT);
        let http = format!("{}:{}", bind, port);
        let http_addr: SocketAddr = http.parse().map_err(|_| ConfigError::InvalidAddress {
            key: "HTTP_BIND",
            value: http.clone(),
        })?;

        let supervisor = SupervisorSettings {
            link_retries: parsed("PRESENCE_LINK_RETRIES")
                .map(|value| value.clamp(1, u32::MAX as u64) as u32)
                .unwrap_or(defaults.link_retries),
            link_retry_interval: parsed("PRESENCE_LINK_RETRY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.link_retry_interval),
            session_retries: parsed("PRESENCE_SESSION_RETRIES")
                .map(|value| value.clamp(1, u32::MAX as u64) as u32)
                .unwrap_or(defaults.session_retries),
            session_retry_interval: parsed("PRESENCE_SESSION_RETRY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.session_retry_interval),
            keep_alive: parsed("PRESENCE_KEEP_ALIVE_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.keep_alive),
            ..defaults
        };

        Ok(Self {
            tenant_id,
            device_id,
            broker_addr,
            http_addr,
            frame_file: lookup("PRESENCE_FRAME_FILE")
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            frame_loop: lookup("PRESENCE_FRAME_LOOP")
                .map(|value| !matches!(value.trim(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
            frame_period: Duration::from_millis(
                parsed("PRESENCE_FRAME_PERIOD_MS")
                    .filter(|ms| *ms > 0)
                    .unwrap_or(FRAME_PERIOD_MS),
            ),
            frame_layout: FrameLayout::new(SAMPLES_PER_CHIRP, CHIRPS_PER_FRAME),
            supervisor,
        })
    }
}

/// 64-bit FNV-1a, stable across builds.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

pub fn device_id_from_seed(seed: &str) -> DeviceId {
    DeviceId::from_unique_id(fnv1a(seed.trim().as_bytes()))
}

/// Derives the client id from the machine id, falling back to the hostname.
fn local_device_id() -> DeviceId {
    let seed = std::fs::read_to_string(MACHINE_ID_PATH)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| env::var("HOSTNAME").ok())
        .or_else(|| std::fs::read_to_string(HOSTNAME_PATH).ok())
        .unwrap_or_else(|| "presence-gateway".to_string());
    device_id_from_seed(&seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        GatewayConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[("PRESENCE_DEVICE_ID", "00000000000000ab")]).unwrap();
        assert_eq!(config.tenant_id, "tenant");
        assert_eq!(config.broker_addr, "127.0.0.1:8883".parse::<SocketAddr>().unwrap());
        assert_eq!(config.http_addr, "127.0.0.1:10086".parse::<SocketAddr>().unwrap());
        assert_eq!(config.frame_period, Duration::from_millis(200));
        assert_eq!(config.frame_file, None);
        assert!(config.frame_loop);
        assert_eq!(config.supervisor, SupervisorSettings::default());
        assert_eq!(config.supervisor.session_retries, 150);
    }

    #[test]
    fn overrides_and_invalid_numbers() {
        let config = config(&[
            ("PRESENCE_DEVICE_ID", "0123456789abcdef"),
            ("PRESENCE_TENANT_ID", "acme"),
            ("PRESENCE_SESSION_RETRIES", "5"),
            ("PRESENCE_LINK_RETRY_MS", "abc"),
            ("PRESENCE_KEEP_ALIVE_SECS", "0"),
            ("PRESENCE_FRAME_FILE", "/tmp/frames.bin"),
            ("PRESENCE_FRAME_LOOP", "false"),
            ("HTTP_PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.tenant_id, "acme");
        assert_eq!(config.device_id.as_str(), "0123456789abcdef");
        assert_eq!(config.supervisor.session_retries, 5);
        assert_eq!(config.supervisor.link_retry_interval, Duration::from_secs(1));
        assert_eq!(config.supervisor.keep_alive, Duration::from_secs(60));
        assert_eq!(config.frame_file, Some(PathBuf::from("/tmp/frames.bin")));
        assert!(!config.frame_loop);
        assert_eq!(config.http_addr.port(), 9000);
    }

    #[test]
    fn rejects_bad_device_id_and_broker() {
        assert!(matches!(
            config(&[("PRESENCE_DEVICE_ID", "xyz")]),
            Err(ConfigError::DeviceId(_))
        ));
        assert!(matches!(
            config(&[("PRESENCE_DEVICE_ID", "00000000000000ab"), ("PRESENCE_BROKER_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddress { key: "PRESENCE_BROKER_ADDR", .. })
        ));
    }

    #[test]
    fn seeded_device_ids_are_stable_hex() {
        let first = device_id_from_seed("4c4c4544-0042-3510\n");
        assert_eq!(first, device_id_from_seed("4c4c4544-0042-3510"));
        assert_eq!(first.as_str().len(), 16);
        assert!(DeviceId::parse(first.as_str()).is_ok());
        assert_ne!(first, device_id_from_seed("other-host"));
    }
}

// Shared constants for pipeline sizing, retry timing, and protocol limits.

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const PUBLISHER_QUEUE_CAPACITY: usize = 32;
pub const INBOUND_QUEUE_CAPACITY: usize = 16;
pub const TRANSPORT_EVENT_CAPACITY: usize = 32;
pub const OFFLINE_BACKLOG_CAP: usize = 64;
pub const TRANSITION_HISTORY_CAP: usize = 16;

pub const LINK_RETRIES: u32 = 10;
pub const LINK_RETRY_INTERVAL_MS: u64 = 1_000;
pub const SESSION_RETRIES: u32 = 150;
pub const SESSION_RETRY_INTERVAL_MS: u64 = 2_000;
pub const SUBSCRIBE_RETRIES: u32 = 3;
pub const SUBSCRIBE_RETRY_INTERVAL_MS: u64 = 1_000;
pub const KEEP_ALIVE_SECS: u64 = 60;
pub const OPERATION_TIMEOUT_MS: u64 = 5_000;
pub const DATAGRAM_MAX_LEN: usize = 8_192;

pub const FRAME_PERIOD_MS: u64 = 200;
pub const SAMPLES_PER_CHIRP: usize = 128;
pub const CHIRPS_PER_FRAME: usize = 16;

pub const DEFAULT_TENANT_ID: &str = "tenant";
pub const DEFAULT_BROKER_ADDR: &str = "127.0.0.1:8883";
pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 10086;
pub const MACHINE_ID_PATH: &str = "/etc/machine-id";
pub const HOSTNAME_PATH: &str = "/etc/hostname";

// Pipeline workers: acquisition, configuration, publishing, and remote updates.

pub mod acquisition;
pub mod config;
pub mod listener;
pub mod publisher;

pub use acquisition::{acquisition_task, process_raw_frame, EventSink};
pub use config::config_task;
pub use listener::{listener_task, Listener};
pub use publisher::{publisher_task, Publisher};

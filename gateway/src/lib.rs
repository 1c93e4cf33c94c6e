// Crate root for the radar presence gateway service.

pub mod app;
pub mod buffers;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod http;
pub mod pipeline;
pub mod sensor;
pub mod supervisor;
pub mod tasks;
pub mod transport;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Shared radar presence pipeline logic.

pub mod classifier;
pub mod connection;
pub mod model;
pub mod payload;
pub mod preprocess;
pub mod properties;
pub mod topics;

//! Infrastructure layer: adapters that touch the filesystem, the process
//! environment or the terminal.

pub mod config;
pub mod local_fs;
pub mod log_sink;
pub mod settings_store;
pub mod telemetry;

//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`.

pub mod cleanup;
pub mod cluster_manager;
pub mod container_scheduler;
pub mod deferred;
pub mod execution;
pub mod filter_compiler;
pub mod log_streamer;
pub mod network_resolver;
pub mod poller;
pub mod run_code;
pub mod session;
pub mod teardown;
pub mod workspace_store;

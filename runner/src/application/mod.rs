//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain`, never on `crate::infra`.

pub mod ports;
pub mod services;

#[allow(unused_imports)]
pub use ports::{
    CloudClients, CloudConnector, ConnectedClients, ContainerApi, IdentityProvider, LogApi,
    LogSink, NetworkApi, ObjectStorageApi, SessionRequest, SettingsStore, WorkspaceFs,
};

//! Ephemeral runner library: provisions a throwaway container environment,
//! runs a script in it, streams its logs and tears everything down again.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod application;
pub mod domain;
pub mod infra;

//! da-core: Core abstractions and configuration for deskagent
//!
//! This crate provides shared types, configuration structures, secret
//! handling and time helpers used by the relay and the agent.

pub mod config;
pub mod error;
pub mod secret;
pub mod time;
pub mod types;

pub use error::DaError;
pub use types::Channel;

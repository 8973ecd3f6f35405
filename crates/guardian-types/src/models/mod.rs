//! Core domain models for Speech Guardian.
//!
//! This module contains the data structures shared between the relay core
//! and the server: circuit state, AI worker wire format, client events and
//! startup configuration.

mod circuit;
pub mod config;
mod events;
mod worker;

// Re-export all models
pub use circuit::{operations, CircuitEvent, CircuitEventKind, CircuitState};
pub use config::{
    BackoffConfig, BreakerSettings, BufferConfig, CircuitConfig, GuardianConfig, RelayConfig,
    ServerConfig, WorkerConfig,
};
pub use events::{ClientEvent, DetectionNotice, StableLabel};
pub use worker::{
    AsrFinal, AsrPartial, AsrResponse, AsrStatus, Detection, ModerationRequest,
    ModerationResponse, ModerationResult,
};

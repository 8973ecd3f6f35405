//! # Guardian Types
//!
//! Core types, wire models, and error definitions for Speech Guardian.
//!
//! This crate provides the foundational type system for the relay:
//!
//! - **`error`** - Typed error hierarchy for the relay path and configuration
//! - **`models`** - Circuit states/events, AI worker wire format, client events
//! - **`models::config`** - Validated startup configuration with env overrides
//!
//! ## Architecture Role
//!
//! `guardian-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!                guardian-types (this crate)
//!                        │
//!                        ▼
//!                  guardian-core
//!                        │
//!                        ▼
//!                 guardian-server
//! ```

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{ConfigError, RelayError, Result, TypedError};

// Re-export core model types
pub use models::{
    operations, AsrFinal, AsrPartial, AsrResponse, AsrStatus, BackoffConfig, BreakerSettings,
    BufferConfig, CircuitConfig, CircuitEvent, CircuitState, ClientEvent, Detection,
    DetectionNotice, GuardianConfig, ModerationRequest, ModerationResponse, ModerationResult,
    RelayConfig, ServerConfig, StableLabel, WorkerConfig,
};

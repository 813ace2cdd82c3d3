//! Runtime orchestration and lifecycle management.
//!
//! This module contains the infrastructure around the orchestrator task:
//!
//! - **Configuration**: orchestrator and HTTP transport settings
//! - **System lifecycle**: spawning an orchestrator, handing out its client, shutting it down
//! - **Observability setup**: initializing tracing and logging
//!
//! # Main Components
//!
//! - [`FetchSystem`] - Runs a multi-resource orchestrator
//! - [`SingleFetchSystem`] - Runs a single-resource controller
//! - [`OrchestratorConfig`] / [`HttpConfig`] - Settings with serde defaults
//! - [`setup_tracing`] - Initializes the tracing/logging infrastructure

pub mod config;
pub mod fetch_system;
pub mod tracing;

pub use config::*;
pub use fetch_system::*;
pub use self::tracing::setup_tracing;

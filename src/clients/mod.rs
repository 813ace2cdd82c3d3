//! Typed wrappers around [`OrchestratorHandle`](crate::client::OrchestratorHandle).

pub mod fetch_client;
pub mod multi_fetch_client;
pub mod orchestrator_client;

pub use fetch_client::*;
pub use multi_fetch_client::*;
pub use orchestrator_client::*;

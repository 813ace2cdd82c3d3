#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Fetch Orchestrator
//!
//! > **Concurrent, cancellable, race-free fetching of many resources at once.**
//!
//! This crate keeps a consistent view of N remote resources while callers re-trigger fetches at
//! any time, for all of them or any single one. Overlapping attempts are cancelled when their
//! inputs change, every resource succeeds or fails on its own, and only the most recent attempt
//! for a resource can ever write into its state.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Why an Actor?
//!
//! All slot state lives in one Tokio task, the [`FetchOrchestrator`](orchestrator::FetchOrchestrator).
//! Clients talk to it over a channel and observe its state through a `watch` channel.
//! Attempts run as their own tasks and report back with a message, so:
//! - **No Locks**: only the orchestrator task ever touches slot state.
//! - **No Ordering Assumptions**: whatever order attempts settle in, each outcome is checked
//!   against the current generation before it is committed.
//! - **Consistent Snapshots**: every published snapshot is the state after a whole command or
//!   settlement was applied.
//!
//! ## 🚀 Core Concepts
//!
//! ### Generations
//! Every bulk cycle (at mount, on a reactivity change, or on `refetch()`) increments a
//! [`Generation`](generation::Generation). Attempts capture it when they start; an outcome
//! whose generation is no longer current is discarded, even if its payload arrived intact.
//!
//! ### Cancellation
//! Each attempt owns a [`CancellationToken`](cancel::CancellationToken). Starting a new
//! generation fires the tokens of the previous one, and a cancelled attempt never surfaces as
//! an error.
//!
//! ### Partial Success
//! A cycle in which k of N resources fail is a normal, terminal outcome: the k slots carry
//! their error, the others carry data, and the orchestrator keeps running.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`orchestrator`])
//! The orchestrator task, its command protocol and per-slot bookkeeping.
//! - **Key items**: [`FetchOrchestrator`](orchestrator::FetchOrchestrator),
//!   [`orchestrator::new`], [`orchestrator::single`].
//!
//! ### 2. The Interface ([`clients`], [`client`])
//! Typed clients that hide the message passing.
//! - **Key items**: [`MultiFetchClient`](clients::MultiFetchClient),
//!   [`FetchClient`](clients::FetchClient), [`OrchestratorClient`](clients::OrchestratorClient).
//!
//! ### 3. The Data ([`model`])
//! Resource descriptors in, state snapshots out.
//! - **Key items**: [`ResourceDescriptor`](model::ResourceDescriptor),
//!   [`MultiFetchState`](model::MultiFetchState), [`FetchState`](model::FetchState).
//!
//! ### 4. The Network ([`transport`])
//! The request function the orchestrator calls once per attempt.
//! - **Key items**: [`Transport`](transport::Transport),
//!   [`HttpTransport`](transport::HttpTransport).
//!
//! ### 5. The Runtime ([`lifecycle`])
//! Configuration, spawning and shutdown, tracing setup.
//! - **Key items**: [`FetchSystem`](lifecycle::FetchSystem),
//!   [`OrchestratorConfig`](lifecycle::OrchestratorConfig),
//!   [`setup_tracing`](lifecycle::setup_tracing).
//!
//! ### 6. Testing ([`mock`])
//! Scripted and channel-driven transports for deterministic tests.
//!
//! ## 🚀 Quick Start
//!
//! ```rust,ignore
//! let transport = HttpTransport::new(&HttpConfig::default())?;
//! let descriptors = vec![
//!     ResourceDescriptor::new("https://api.example.com/users/1"),
//!     ResourceDescriptor::new("https://api.example.com/users/2"),
//! ];
//! let system = FetchSystem::start(transport, descriptors, OrchestratorConfig::default())?;
//!
//! let state = system.client.settled().await?;
//! println!("{} loaded, {} failed", state.data_count(), state.error_count());
//!
//! system.shutdown().await?;
//! ```
//!
//! ### Running the Demo
//!
//! ```bash
//! # Run with info logs
//! RUST_LOG=info cargo run -- https://httpbin.org/json https://httpbin.org/status/503
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod cancel;
pub mod client;
pub mod clients;
pub mod error;
pub mod generation;
pub mod lifecycle;
pub mod mock;
pub mod model;
pub mod orchestrator;
pub mod transport;

//! Core logic of the relay: the agent loop, tool catalog access,
//! capability filtering, protocol translation, and resilient upstream
//! fetching.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod capability;
pub mod catalog;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod translate;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;

pub use orchestrator::{Orchestrator, OrchestratorConfig};

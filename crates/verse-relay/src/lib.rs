//! The relay executable: CLI parsing, the HTTP proxy surface, the
//! line-oriented stdio surface, and response presentation.
//!
//! Everything here only marshals bytes into and out of the
//! orchestration engine; the decision logic lives in
//! [`verse_relay_core`].

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod cli;
pub mod render;
pub mod server;
pub mod stdio;

/// Re-exports of the [`verse_relay_core`] crate.
pub mod core {
    pub use verse_relay_core::*;
}

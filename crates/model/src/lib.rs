//! An abstraction layer for chat-completion endpoints.
//!
//! This crate establishes an unified protocol for the relay to talk to
//! chat-completion backends, so that the orchestration engine can be
//! exercised against a real endpoint or a scripted fake without touching
//! the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. The wire types
//! follow the function-calling chat-completion shape (role-tagged
//! messages, tool declarations, choices, usage), which is also the shape
//! the caller-facing surface accepts, so a request can be relayed without
//! re-encoding.

#![deny(missing_docs)]

mod backend;
mod chat;
mod error;

pub use backend::*;
pub use chat::*;
pub use error::*;

//! Upstream model implementations
//!
//! Each submodule implements `CompletionProvider` for one API family.

pub mod openai;
mod common;

pub use common::UserAgent;

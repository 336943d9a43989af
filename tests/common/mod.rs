//! Common test infrastructure shared across integration tests.
//!
//! This module provides:
//! - `stubs`: a small game with scripted input, a recording simulator and a UI counter
//! - `test_utils`: logging setup, port allocation and session helpers
//!
//! # Usage
//!
//! From any integration test file:
//! ```ignore
//! mod common;
//! use common::stubs::{RecordingSim, ScriptedInput, StubConfig};
//! use common::{init_tracing, loopback_session};
//! ```


// Re-export commonly used items for convenience.
#[allow(unused_imports)]
pub use test_utils::{init_tracing, loopback_session, run_frames, PortAllocator};

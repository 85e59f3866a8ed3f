//! Integration test suite for distcalc.
//!
//! These tests drive the public API end to end: submission, decomposition,
//! scheduling, result reporting and completion, both in-process and over
//! the HTTP transport with real worker agents.
//!
//! # Test Categories
//!
//! - `end_to_end`: Expressions evaluated to completion or failure
//! - `concurrency`: Concurrent submission, polling and reporting
//! - `http_api`: Route status codes and wire formats
//! - `agents`: Worker agents talking to a live server
//! - `performance`: Dispatch overhead thresholds
//!
//! # CI Compatibility
//!
//! Operation times are zero and servers bind to ephemeral localhost ports.

mod fixtures;

mod agents;
mod concurrency;
mod http_api;

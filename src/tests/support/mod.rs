// Shared test support code for integration tests.
// This module provides common utilities that all test files can use.

pub mod common;
pub mod kubelet;
pub mod server;

pub use common::*;
pub use kubelet::FakeKubelet;
pub use server::FlakyServer;

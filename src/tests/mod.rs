//! Integration tests for token-resource.
//!
//! End-to-end scenarios over real unix sockets: supervisor restarts,
//! registration against an in-process kubelet and the device-plugin RPCs.


pub mod support;

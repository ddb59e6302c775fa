//! Kubelet registration: unix-socket dialing and the retrying registrar.

pub mod client;
pub mod dial;

#[cfg(test)]
mod client_test;
#[cfg(test)]
mod dial_test;

pub use client::Registrar;
pub use dial::{dial, DialError};

#[path = "shared/retry/mod.rs"]
pub mod retry;
#[path = "shared/time/mod.rs"]
pub mod time;
#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;

pub mod api;
pub mod app;
pub mod config;
pub mod plugin;
pub mod registration;
pub mod shutdown;
pub mod supervisor;
pub mod watchdog;

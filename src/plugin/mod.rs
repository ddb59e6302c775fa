//! Device-plugin RPC service and the server that runs it on a unix socket.

pub mod server;
pub mod service;


pub use server::{GrpcServer, ServeError, Server};
pub use service::TokenPlugin;

//! Connection supervisor: accept loop, per-connection tasks and shutdown.

pub mod listener;

pub use listener::Server;

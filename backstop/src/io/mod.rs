//! Side-effecting adapters: filesystem, HTTP, environment.

pub mod atomic;
pub mod backup;
pub mod config;
pub mod credentials;
pub mod paths;
pub mod remote;
pub mod workspace;

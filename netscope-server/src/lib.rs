//! REST and RPC adapters for NetScope capabilities.

pub mod config;
pub mod gateway;
pub mod logging;
pub mod rest;
pub mod rpc;
pub mod rpc_server;
pub mod server;

pub use config::{ConfigError, NamingConfig, NetScopeConfig, RestConfig, RpcConfig, API_KEY_ENV};
pub use gateway::{Gateway, Target};
pub use rest::{router, API_KEY_HEADER};
pub use rpc::RpcService;
pub use rpc_server::{handle_connection, RpcServer};
pub use server::NetScopeServer;

// Hosts only need this crate to register services.
pub use netscope_core;
pub use netscope_transport;

//! HTTP gateway: submit collection-generation runs and poll health.

pub mod routes;
pub mod server;
pub mod state;

pub use server::GatewayServer;

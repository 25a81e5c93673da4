pub mod config;
pub mod registry;
pub mod server;
pub mod setup;
pub mod telemetry;

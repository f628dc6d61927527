//! Operator-facing HTTP surface for the recovery orchestrator: assembles the executor from
//! configuration and adapter credentials, and serves the webhook intake plus the read/reset
//! operator endpoints.

pub mod app;
pub mod handlers;
pub mod server;

pub use app::{build_executor, AdapterCredentials, AppState};
pub use server::Server;

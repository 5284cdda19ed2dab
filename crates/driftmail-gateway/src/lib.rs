//! # Driftmail Gateway
//! HTTP surface: the signup trigger endpoint the platform calls at account
//! creation, plus health and run inspection.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, serve};

// src/server/mod.rs
pub mod builder;
pub mod handler;
pub mod listener;

pub use builder::{ServerBuilder, ServerError};
pub use handler::{HealthHandler, LIVENESS_PATH, READINESS_PATH};

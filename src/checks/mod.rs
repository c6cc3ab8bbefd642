// src/checks/mod.rs
//! Ready-made probes for common dependencies.
pub mod http;
pub mod kafka;

pub use http::HttpProbe;
pub use kafka::{KafkaProbe, KafkaSettings};

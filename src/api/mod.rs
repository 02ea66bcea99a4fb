//! HTTP routes other than the chat socket

pub mod health;

pub use health::{health_routes, HealthState};

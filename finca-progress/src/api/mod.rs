//! HTTP API handlers for finca-progress

pub mod health;
pub mod progress;

pub use health::health_routes;
pub use progress::progress_routes;

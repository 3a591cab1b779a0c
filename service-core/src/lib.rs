//! service-core: shared infrastructure for the payment manager workspace.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

pub use axum;
pub use mongodb;
pub use serde;
pub use serde_json;
pub use tower_http;
pub use tracing;
pub use validator;

//! service-core: Shared infrastructure for the ride marketplace services.
pub mod error;
pub mod middleware;

pub use axum;
pub use serde;
pub use serde_json;
pub use tracing;

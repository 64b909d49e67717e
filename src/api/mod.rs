//! HTTP API layer: router, endpoints, shared state, error mapping.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use types::ApiContext;

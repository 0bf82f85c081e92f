//! HTTP surface: request validation, directive templating, and the mapping
//! from orchestration outcomes to HTTP responses.

mod routes;

pub use routes::{serve, AppState};

pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod rate_limit;
pub mod routes;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;

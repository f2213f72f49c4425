/// Middleware module
///
/// Request tracing for every route and the bearer-token guard for
/// authenticated ones.

mod jwt_middleware;
mod request_tracing;

pub use jwt_middleware::JwtMiddleware;
pub use request_tracing::{RequestId, RequestTracing, REQUEST_ID_HEADER};

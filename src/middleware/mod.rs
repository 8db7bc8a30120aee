/// Middleware module
///
/// Request gate for protected routes.

mod session_middleware;

pub use session_middleware::SessionMiddleware;

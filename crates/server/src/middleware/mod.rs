//! HTTP middleware

pub mod audit;
pub mod metrics;
pub mod rate_limit;
pub mod request_id;

pub use audit::audit_middleware;
pub use self::metrics::{metrics_middleware, normalize_path, record_search};
pub use rate_limit::{create_rate_limiter, rate_limit_middleware};
pub use request_id::request_id_middleware;

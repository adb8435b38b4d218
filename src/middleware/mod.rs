pub mod auth;
pub mod response;
pub mod tenant;

pub use auth::{identity_middleware, Claims};
pub use response::no_cache_headers;
pub use tenant::{tenant_middleware, Tenant};

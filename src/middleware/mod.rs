pub mod audit;
pub mod auth;
pub mod injection;
pub mod response;
pub mod role;
pub mod sanitize;
pub mod security_logger;

pub use audit::{client_ip, user_agent, AuditLayer};
pub use auth::{authenticate, AuthUser};
pub use injection::{detect_sql_injection, reject_injected_params};
pub use response::{ApiResponse, ApiResult, AuditPayload};
pub use role::RoleGateLayer;
pub use sanitize::{sanitize_input, SanitizedBody};
pub use security_logger::security_logger;

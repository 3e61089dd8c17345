//! HTTP middleware and error responses.
//!
//! - [`authorize_operation`] - per-route request authorization
//! - `IntoResponse` for [`AuthError`](crate::AuthError)

pub mod authorize;
pub mod error;

pub use authorize::{OperationGuard, authorize_operation};
pub use error::{status_code, unauthorized};

//! HTTP layer: transport abstraction, request/response values, error
//! taxonomy, and the authenticated client.

mod client;
mod error;
mod request;
mod transport;

pub use client::{AuthFailureHook, AuthenticatedHttpClient};
pub use error::{Disposition, HttpError, classify};
pub use request::{ApiResponse, FORM_CONTENT_TYPE, OutgoingRequest, RequestBody, RequestOptions};
pub use transport::{ReqwestTransport, Transport};

//! Session state: token storage, route rules, refresh coordination, and the
//! login/logout flows built on top of them.

mod refresh;
mod routes;
mod session;
mod token;

pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshSlot, SharedRefresh};
pub use routes::{LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH, REGISTER_PATH, RouteGuard};
pub use session::Session;
pub use token::{TokenResponse, TokenSnapshot, TokenStore, mask_token};

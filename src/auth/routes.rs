//! Which routes carry a bearer token and which may trigger a session refresh.

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Debug, Clone)]
pub struct RouteGuard {
    public: Vec<String>,
    refresh_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(REFRESH_PATH, Vec::<String>::new())
    }
}

impl RouteGuard {
    /// Login and register are always public; `extra_public` adds more.
    pub fn new<I, S>(refresh_path: &str, extra_public: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut public = vec![LOGIN_PATH.to_string(), REGISTER_PATH.to_string()];
        public.extend(extra_public.into_iter().map(Into::into));
        Self {
            public,
            refresh_path: refresh_path.to_string(),
        }
    }

    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    /// Public routes never carry a bearer token.
    pub fn is_public(&self, path: &str) -> bool {
        self.public.iter().any(|p| path.contains(p.as_str()))
    }

    /// Auth endpoints answer 401 with a credential error, never a session expiry.
    pub fn is_auth_endpoint(&self, path: &str) -> bool {
        self.is_public(path) || path.contains(&self.refresh_path) || path.contains(LOGOUT_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_and_register_are_public() {
        let guard = RouteGuard::default();
        assert!(guard.is_public("/auth/login"));
        assert!(guard.is_public("/api/v1/auth/register"));
        assert!(!guard.is_public("/users/me/bookings"));
    }

    #[test]
    fn test_refresh_and_logout_are_auth_endpoints_but_not_public() {
        let guard = RouteGuard::default();
        assert!(guard.is_auth_endpoint("/auth/refresh"));
        assert!(!guard.is_public("/auth/refresh"));
        assert!(guard.is_auth_endpoint("/auth/logout"));
        assert!(!guard.is_public("/auth/logout"));
    }

    #[test]
    fn test_extra_public_routes() {
        let guard = RouteGuard::new(REFRESH_PATH, ["/auth/forgot-password"]);
        assert!(guard.is_public("/auth/forgot-password"));
        assert!(guard.is_auth_endpoint("/auth/forgot-password"));
        assert!(!guard.is_auth_endpoint("/events"));
    }
}

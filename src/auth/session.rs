//! Login, registration and logout on top of the authenticated client.

use log::{debug, info, warn};
use reqwest::Method;
use serde::Serialize;

use super::routes::{LOGIN_PATH, LOGOUT_PATH, REGISTER_PATH};
use super::token::{TokenResponse, mask_token};
use crate::http::{ApiResponse, AuthenticatedHttpClient, HttpError, RequestBody, RequestOptions};

/// Login, registration and logout on top of an [`AuthenticatedHttpClient`].
#[derive(Clone)]
pub struct Session {
    client: AuthenticatedHttpClient,
}

impl Session {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AuthenticatedHttpClient {
        &self.client
    }

    pub fn is_logged_in(&self) -> bool {
        self.client.access_token().is_some()
    }

    /// Logs in with a form-encoded username/password and stores the token.
    ///
    /// The server also sets the refresh cookie on this response.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<String, HttpError> {
        let body = RequestBody::Form(vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ]);
        let response = self
            .client
            .request(Method::POST, LOGIN_PATH, Some(body), RequestOptions::form())
            .await?;
        let TokenResponse { access_token, .. } = response.json()?;

        info!("Logged in as {}", username);
        debug!("Received access token: {}", mask_token(&access_token));
        self.client.set_access_token(Some(access_token.clone()));
        Ok(access_token)
    }

    /// Creates an account. Does not log in.
    #[tracing::instrument(skip(self, payload))]
    pub async fn register<B: Serialize>(&self, payload: &B) -> Result<ApiResponse, HttpError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| HttpError::InvalidRequest(format!("failed to encode body: {}", e)))?;
        self.client
            .request(
                Method::POST,
                REGISTER_PATH,
                Some(RequestBody::Json(value)),
                RequestOptions::default(),
            )
            .await
    }

    /// Invalidates the server-side session and clears the local token.
    ///
    /// The local token is cleared even if the server call fails.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) {
        if let Err(e) = self
            .client
            .request(Method::POST, LOGOUT_PATH, None, RequestOptions::default())
            .await
        {
            warn!("Server-side logout failed: {}", e);
        }
        self.client.set_access_token(None);
        info!("Logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use mockito::{Matcher, Server};

    fn session(url: &str) -> Session {
        let config = ClientConfig::new(Some(url.to_string()));
        Session::new(AuthenticatedHttpClient::from_config(&config, None).unwrap())
    }

    #[test_log::test(tokio::test)]
    async fn test_login_stores_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/login")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("username=alice".into()),
                Matcher::Regex("password=s3cret".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"tok1","token_type":"bearer"}"#)
            .create_async()
            .await;

        let session = session(&server.url());
        let token = session.login("alice", "s3cret").await.unwrap();

        mock.assert_async().await;
        assert_eq!(token, "tok1");
        assert!(session.is_logged_in());
        assert_eq!(session.client().access_token().as_deref(), Some("tok1"));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mut server = Server::new_async().await;
        let _login = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"detail":"invalid credentials"}"#)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let session = session(&server.url());
        let err = session.login("alice", "nope").await.unwrap_err();

        refresh.assert_async().await;
        assert!(matches!(err, HttpError::Credential { .. }));
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_register_sends_json_without_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/register")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Json(
                serde_json::json!({"email": "a@b.test", "password": "pw"}),
            ))
            .with_status(201)
            .with_body(r#"{"id": 1}"#)
            .create_async()
            .await;

        let session = session(&server.url());
        session
            .client()
            .set_access_token(Some("leftover".into()));
        let response = session
            .register(&serde_json::json!({"email": "a@b.test", "password": "pw"}))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status().as_u16(), 201);
    }

    #[tokio::test]
    async fn test_logout_clears_token_even_on_server_error() {
        let mut server = Server::new_async().await;
        let logout = server
            .mock("POST", "/auth/logout")
            .match_header("authorization", "Bearer tok1")
            .with_status(500)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let session = session(&server.url());
        session.client().set_access_token(Some("tok1".into()));
        session.logout().await;

        logout.assert_async().await;
        refresh.assert_async().await;
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_logout_401_does_not_refresh() {
        let mut server = Server::new_async().await;
        let _logout = server
            .mock("POST", "/auth/logout")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let session = session(&server.url());
        session.client().set_access_token(Some("expired".into()));
        session.logout().await;

        refresh.assert_async().await;
        assert!(!session.is_logged_in());
    }
}

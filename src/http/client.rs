//! Authenticated API client with single-flight token refresh.

use anyhow::Result;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, info, warn};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::error::{Disposition, HttpError, classify};
use super::request::{
    ApiRequest, ApiResponse, OutgoingRequest, RequestBody, RequestOptions, join_url,
};
use super::transport::{ReqwestTransport, Transport};
use crate::auth::{
    RefreshCoordinator, RefreshOutcome, RouteGuard, TokenResponse, TokenStore, mask_token,
};
use crate::config::ClientConfig;

/// Called once per failed refresh, e.g. to send the user to a login screen.
pub type AuthFailureHook = Arc<dyn Fn(&HttpError) + Send + Sync>;

struct Inner {
    transport: Arc<dyn Transport>,
    api_url: String,
    routes: RouteGuard,
    tokens: TokenStore,
    refresh: Arc<RefreshCoordinator>,
    on_auth_failure: Option<AuthFailureHook>,
}

/// HTTP client for the backend API.
///
/// Attaches the in-memory access token to every non-public request. When a
/// request is rejected with 401, all concurrently failing requests share one
/// call to the refresh endpoint and are then resubmitted exactly once.
#[derive(Clone)]
pub struct AuthenticatedHttpClient {
    inner: Arc<Inner>,
}

impl AuthenticatedHttpClient {
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self::build(transport, config, None)
    }

    /// Like [`new`](Self::new), with a callback invoked when the session
    /// cannot be renewed.
    pub fn with_auth_failure_hook(
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        hook: AuthFailureHook,
    ) -> Self {
        Self::build(transport, config, Some(hook))
    }

    /// Creates a client over a reqwest transport built from `config`.
    pub fn from_config(config: &ClientConfig, hook: Option<AuthFailureHook>) -> Result<Self> {
        let transport = ReqwestTransport::new(config.build_http_client()?);
        Ok(Self::build(Arc::new(transport), config, hook))
    }

    fn build(
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        on_auth_failure: Option<AuthFailureHook>,
    ) -> Self {
        let routes = RouteGuard::new(&config.refresh_path, config.public_routes.iter().cloned());
        Self {
            inner: Arc::new(Inner {
                transport,
                api_url: config.api_url.clone(),
                routes,
                tokens: TokenStore::new(),
                refresh: RefreshCoordinator::new(),
                on_auth_failure,
            }),
        }
    }

    pub fn set_access_token(&self, token: Option<String>) {
        match &token {
            Some(t) => debug!("Access token set: {}", mask_token(t)),
            None => debug!("Access token cleared"),
        }
        self.inner.tokens.set(token);
    }

    /// Current token. For diagnostics; requests read the store directly.
    pub fn access_token(&self) -> Option<String> {
        self.inner.tokens.get()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    /// Performs a request against a backend-relative `path`.
    #[tracing::instrument(skip(self, body, options))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<ApiResponse, HttpError> {
        self.send(ApiRequest::new(method, path, body, options)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        self.request(Method::GET, path, None, RequestOptions::default())
            .await?
            .json()
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        let value = serde_json::to_value(body)
            .map_err(|e| HttpError::InvalidRequest(format!("failed to encode body: {}", e)))?;
        self.request(
            Method::POST,
            path,
            Some(RequestBody::Json(value)),
            RequestOptions::default(),
        )
        .await?
        .json()
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, HttpError> {
        self.request(Method::DELETE, path, None, RequestOptions::default())
            .await
    }

    async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let auth_endpoint = self.inner.routes.is_auth_endpoint(&request.path);
        let public = self.inner.routes.is_public(&request.path);
        // A resubmitted request keeps the token its refresh produced.
        let mut pinned: Option<String> = None;

        loop {
            let sent = self.inner.tokens.snapshot();
            let token = if public {
                None
            } else {
                pinned.clone().or(sent.token)
            };

            let response = self.dispatch(&request, token.as_deref()).await?;

            match classify(response.status(), auth_endpoint, request.retried) {
                Disposition::Success => return Ok(response),
                Disposition::Failure => return Err(response.into_status_error()),
                Disposition::CredentialError => {
                    debug!("{} {} rejected credentials", request.method, request.path);
                    return Err(HttpError::Credential {
                        status: response.status(),
                        body: response.text(),
                    });
                }
                Disposition::RetryExhausted => {
                    warn!(
                        "{} {} was rejected again after the session was renewed",
                        request.method, request.path
                    );
                    return Err(HttpError::RetryExhausted {
                        path: request.path.clone(),
                    });
                }
                Disposition::SessionExpired => {
                    debug!(
                        "{} {} returned 401, renewing session",
                        request.method, request.path
                    );
                    let token = self.renew_session(sent.generation).await?;
                    request.retried = true;
                    pinned = Some(token);
                }
            }
        }
    }

    /// Obtains a fresh token for a request sent at `sent_generation`.
    ///
    /// Joins the in-flight refresh if there is one. If the token changed since
    /// the request went out, no new refresh starts: a newer token is used as
    /// is, a cleared token means the session is over.
    async fn renew_session(&self, sent_generation: u64) -> RefreshOutcome {
        let refresh = {
            let slot = self.inner.refresh.lock();
            match slot.current() {
                Some(in_flight) => {
                    debug!("Joining in-flight refresh");
                    in_flight
                }
                None => {
                    let current = self.inner.tokens.snapshot();
                    if current.generation != sent_generation {
                        return match current.token {
                            Some(token) => {
                                debug!("Token already renewed, retrying with it");
                                Ok(token)
                            }
                            None => Err(HttpError::ReauthenticationFailed(
                                "session was closed".to_string(),
                            )),
                        };
                    }
                    slot.start(self.refresh_future(current.generation))
                }
            }
        };
        refresh.await
    }

    fn refresh_future(&self, generation: u64) -> BoxFuture<'static, RefreshOutcome> {
        let client = self.clone();
        async move { client.refresh(generation).await }.boxed()
    }

    /// Calls the refresh endpoint and records the outcome in the token store.
    ///
    /// The outcome is applied only if nobody wrote the token since
    /// `generation`; a logout during the refresh stays a logout.
    async fn refresh(&self, generation: u64) -> RefreshOutcome {
        info!("Refreshing access token");

        let request = ApiRequest::new(
            Method::POST,
            self.inner.routes.refresh_path(),
            None,
            RequestOptions::default(),
        );
        let fetched = match self.dispatch(&request, None).await {
            Ok(response) if response.status().is_success() => response
                .json::<TokenResponse>()
                .map(|body| body.access_token),
            Ok(response) => Err(response.into_status_error()),
            Err(e) => Err(e),
        };

        match fetched {
            Ok(token) => match self.inner.tokens.set_if_generation(generation, Some(token.clone())) {
                Ok(_) => {
                    debug!("Access token refreshed: {}", mask_token(&token));
                    Ok(token)
                }
                Err(current) => match current.token {
                    Some(newer) => {
                        debug!("Token replaced during refresh, keeping the newer one");
                        Ok(newer)
                    }
                    None => {
                        info!("Session was closed during refresh, discarding refreshed token");
                        Err(HttpError::ReauthenticationFailed(
                            "session was closed".to_string(),
                        ))
                    }
                },
            },
            Err(e) => match self.inner.tokens.set_if_generation(generation, None) {
                Ok(_) => {
                    warn!("Token refresh failed: {}", e);
                    let err = HttpError::ReauthenticationFailed(e.to_string());
                    if let Some(hook) = &self.inner.on_auth_failure {
                        hook(&err);
                    }
                    Err(err)
                }
                Err(current) => match current.token {
                    Some(newer) => {
                        debug!("Refresh failed ({}) but a login landed meanwhile, using it", e);
                        Ok(newer)
                    }
                    None => {
                        info!("Session was closed during refresh");
                        Err(HttpError::ReauthenticationFailed(
                            "session was closed".to_string(),
                        ))
                    }
                },
            },
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<ApiResponse, HttpError> {
        let mut headers = request.options.to_headers()?;
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| HttpError::InvalidRequest(format!("access token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let outgoing = OutgoingRequest {
            method: request.method.clone(),
            url: join_url(&self.inner.api_url, &request.path),
            headers,
            body: request.body.clone(),
        };
        self.inner.transport.send(outgoing).await
    }
}

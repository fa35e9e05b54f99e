use anyhow::{Context, Result};
use log::{debug, error};
use reqwest::Method;
use std::sync::Arc;

use crate::auth::{Session, mask_token};
use crate::config::ClientConfig;
use crate::http::{
    ApiResponse, AuthFailureHook, AuthenticatedHttpClient, HttpError, RequestBody, RequestOptions,
};

pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Connection settings shared by every subcommand.
pub struct Options {
    pub config: ClientConfig,
    pub token: Option<String>,
    pub credentials: Option<Credentials>,
}

/// Builds a session from the options, logging in first if credentials were given.
#[tracing::instrument(skip(options))]
pub async fn connect(options: &Options) -> Result<Session> {
    let hook: AuthFailureHook = Arc::new(|err: &HttpError| {
        error!("{}", err);
    });
    let client = AuthenticatedHttpClient::from_config(&options.config, Some(hook))?;
    let session = Session::new(client);

    if let Some(token) = &options.token {
        debug!("Using access token from command line: {}", mask_token(token));
        session.client().set_access_token(Some(token.clone()));
    }

    if let Some(credentials) = &options.credentials {
        session
            .login(&credentials.username, &credentials.password)
            .await
            .with_context(|| format!("Failed to log in as {}", credentials.username))?;
    }

    Ok(session)
}

pub async fn login(options: &Options) -> Result<()> {
    if options.credentials.is_none() {
        anyhow::bail!("Login requires --username and --password.");
    }
    let session = connect(options).await?;
    let token = session.client().access_token().unwrap_or_default();
    println!("Logged in. Access token: {}", mask_token(&token));
    Ok(())
}

pub async fn get(options: &Options, path: &str) -> Result<()> {
    request(options, "GET", path, None).await
}

pub async fn request(options: &Options, method: &str, path: &str, data: Option<&str>) -> Result<()> {
    let method = parse_method(method)?;
    let body = data.map(parse_body).transpose()?;

    let session = connect(options).await?;
    let response = session
        .client()
        .request(method.clone(), path, body, RequestOptions::default())
        .await
        .map_err(|e| explain(e, &method, path))?;

    println!("{}", format_body(&response));
    Ok(())
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", method))
}

fn parse_body(data: &str) -> Result<RequestBody> {
    let value = serde_json::from_str(data).context("Request body is not valid JSON")?;
    Ok(RequestBody::Json(value))
}

fn explain(err: HttpError, method: &Method, path: &str) -> anyhow::Error {
    let hint = if err.is_terminal_auth() {
        "Your session has ended. Log in again with --username and --password."
    } else {
        "Request failed."
    };
    anyhow::Error::from(err).context(format!("{} {}: {}", method, path, hint))
}

/// Pretty-prints JSON bodies; anything else is printed as text.
fn format_body(response: &ApiResponse) -> String {
    match serde_json::from_slice::<serde_json::Value>(response.body()) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| response.text()),
        Err(_) => response.text(),
    }
}

//! Credential resolution and token exchange.
//!
//! A connection needs a bearer token. It either comes with the connection URI
//! (`applicationToken`) or is obtained by exchanging a username and password
//! with an auth endpoint, once per call. Nothing is cached or retried.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use url::Url;

use docgate_core::{
    descriptor::{
        APPLICATION_TOKEN_PARAM, BASE_API_PATH_PARAM, ConnectionDescriptor, DescriptorParts, LOG_LEVEL_PARAM,
        STARGATE_BASE_API_PATH,
    },
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::client::failure_message;


/// Username and password accepted by an auth endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub auth_url: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(auth_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    auth_token: Option<String>,
}


/// Resolves the bearer token of a connection.
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    http: reqwest::Client,
}

impl CredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Returns `token` when it is present and non-empty, otherwise exchanges
    /// `credentials` for one.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Validation`] if there is neither a token nor credentials.
    /// - [`DocumentStoreError::AuthExchange`] if the exchange fails.
    pub async fn resolve_token(
        &self,
        token: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> DocumentStoreResult<String> {
        match (token.filter(|t| !t.is_empty()), credentials) {
            (Some(token), _) => Ok(token.to_string()),
            (None, Some(credentials)) => self.exchange(credentials).await,
            (None, None) => Err(DocumentStoreError::Validation(
                "Invalid URI: applicationToken is required".into(),
            )),
        }
    }

    /// Exchanges a username and password for a bearer token.
    ///
    /// Sends `POST auth_url` with `{"username", "password"}` and reads
    /// `authToken` from the response.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::AuthExchange`]. Its message is the
    /// `description` of the error body when the endpoint sends one.
    pub async fn exchange(&self, credentials: &Credentials) -> DocumentStoreResult<String> {
        tracing::debug!(auth_url = %credentials.auth_url, "exchanging credentials for a token");

        let response = self.http
            .post(&credentials.auth_url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&TokenRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|e| DocumentStoreError::AuthExchange(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DocumentStoreError::AuthExchange(failure_message(response).await));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| DocumentStoreError::AuthExchange(e.to_string()))?
            .auth_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| DocumentStoreError::AuthExchange("Response did not contain an authToken".into()))
    }

    /// Parses `uri` into a descriptor, exchanging `credentials` for the token
    /// when the URI carries none.
    ///
    /// The keyspace is checked before any exchange happens.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] for malformed URIs or missing
    /// components, and [`DocumentStoreError::AuthExchange`] if the exchange fails.
    pub async fn resolve_descriptor(
        &self,
        uri: &str,
        credentials: Option<&Credentials>,
    ) -> DocumentStoreResult<ConnectionDescriptor> {
        let parts = DescriptorParts::parse(uri)?;

        match credentials {
            Some(credentials) if parts.application_token.is_none() => {
                parts.require_keyspace()?;
                let token = self.exchange(credentials).await?;

                parts.with_application_token(token).into_descriptor()
            }
            _ => parts.into_descriptor(),
        }
    }

    /// Builds a connection URI for a self-hosted Stargate deployment.
    ///
    /// The result points at `{base_url}/{keyspace}`, uses the Stargate API path
    /// and carries a freshly exchanged token.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if `base_url` is not a valid
    /// base URL, or the exchange error.
    pub async fn build_stargate_uri(
        &self,
        base_url: &str,
        auth_url: &str,
        keyspace: &str,
        username: &str,
        password: &str,
        log_level: Option<&str>,
    ) -> DocumentStoreResult<String> {
        let mut url = Url::parse(base_url)?;

        url.path_segments_mut()
            .map_err(|_| DocumentStoreError::Validation(format!("Invalid URI: {} cannot carry a path", base_url)))?
            .clear()
            .push(keyspace);

        url.query_pairs_mut().append_pair(BASE_API_PATH_PARAM, STARGATE_BASE_API_PATH);
        if let Some(level) = log_level.filter(|l| !l.is_empty()) {
            url.query_pairs_mut().append_pair(LOG_LEVEL_PARAM, level);
        }

        let token = self
            .exchange(&Credentials::new(auth_url, username, password))
            .await?;
        url.query_pairs_mut().append_pair(APPLICATION_TOKEN_PARAM, &token);

        Ok(url.to_string())
    }
}

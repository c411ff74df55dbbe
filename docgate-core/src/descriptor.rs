//! Connection descriptor parsing and canonical URI construction.
//!
//! A connection URI has the shape
//!
//! ```text
//! scheme://host[:port]/{keyspace}?applicationToken=<token>&baseApiPath=<path>&logLevel=<level>
//! ```
//!
//! The keyspace and application token are mandatory. `baseApiPath` defaults to
//! [`DEFAULT_BASE_API_PATH`].
//!
//! # Example
//!
//! ```ignore
//! use docgate_core::descriptor::{build_production_uri, parse_descriptor};
//!
//! let uri = build_production_uri("db1", "us-east1", Some("ks1"), Some("tok1"), None)?;
//! let descriptor = parse_descriptor(&uri)?;
//!
//! assert_eq!(descriptor.keyspace(), "ks1");
//! ```

use tracing::level_filters::LevelFilter;
use url::Url;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// API path used when the URI does not carry a `baseApiPath` parameter.
pub const DEFAULT_BASE_API_PATH: &str = "/api/rest/v2/namespaces";

/// API path used by self-hosted Stargate deployments.
pub const STARGATE_BASE_API_PATH: &str = "/v2/namespaces";

/// Domain hosting production databases.
pub const PRODUCTION_DOMAIN: &str = "apps.astra.datastax.com";

pub const APPLICATION_TOKEN_PARAM: &str = "applicationToken";
pub const BASE_API_PATH_PARAM: &str = "baseApiPath";
pub const LOG_LEVEL_PARAM: &str = "logLevel";

/// The parsed, immutable representation of a connection URI.
///
/// A descriptor can only be obtained through [`parse_descriptor`] (or
/// [`DescriptorParts::into_descriptor`]), so its keyspace and application token
/// are never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    base_url: String,
    base_api_path: String,
    keyspace: String,
    application_token: String,
    log_level: Option<String>,
}

impl ConnectionDescriptor {
    /// Scheme, host and port of the remote store, e.g. `https://host:8082`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn base_api_path(&self) -> &str {
        &self.base_api_path
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// The bearer token presented on every request.
    pub fn application_token(&self) -> &str {
        &self.application_token
    }

    pub fn log_level(&self) -> Option<&str> {
        self.log_level.as_deref()
    }

    /// Maps the URI's `logLevel` onto a tracing level filter.
    ///
    /// Accepts the tracing names as well as the npm-style names
    /// (`http`, `verbose`, `silly`) existing connection strings use.
    /// Returns `None` when no level is set or the level is unknown.
    pub fn log_level_filter(&self) -> Option<LevelFilter> {
        match self.log_level.as_deref()?.to_ascii_lowercase().as_str() {
            "off" | "none" => Some(LevelFilter::OFF),
            "error" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" => Some(LevelFilter::INFO),
            "http" | "verbose" | "debug" => Some(LevelFilter::DEBUG),
            "silly" | "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
    }
}

/// The raw components of a connection URI, before validation.
///
/// Used by credential resolution to inspect a URI that may still be missing
/// its application token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorParts {
    pub base_url: String,
    pub base_api_path: Option<String>,
    pub keyspace: Option<String>,
    pub application_token: Option<String>,
    pub log_level: Option<String>,
}

impl DescriptorParts {
    /// Splits a URI into its components without enforcing mandatory ones.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if the URI cannot be parsed or has no host.
    pub fn parse(uri: &str) -> DocumentStoreResult<Self> {
        let url = Url::parse(uri)?;
        let host = url
            .host_str()
            .ok_or_else(|| DocumentStoreError::Validation("Invalid URI: host is required".into()))?;

        let base_url = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        let keyspace = url
            .path()
            .strip_prefix('/')
            .unwrap_or(url.path())
            .trim_end_matches('/');

        let mut parts = DescriptorParts {
            base_url,
            base_api_path: None,
            keyspace: non_empty(keyspace),
            application_token: None,
            log_level: None,
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                APPLICATION_TOKEN_PARAM => parts.application_token = non_empty(&value),
                BASE_API_PATH_PARAM => parts.base_api_path = non_empty(&value),
                LOG_LEVEL_PARAM => parts.log_level = non_empty(&value),
                _ => {}
            }
        }

        Ok(parts)
    }

    /// Returns the keyspace or the validation error a descriptor would raise.
    pub fn require_keyspace(&self) -> DocumentStoreResult<&str> {
        self.keyspace
            .as_deref()
            .ok_or_else(|| DocumentStoreError::Validation("Invalid URI: keyspace is required".into()))
    }

    /// Replaces the application token.
    pub fn with_application_token(mut self, token: impl Into<String>) -> Self {
        self.application_token = non_empty(&token.into());
        self
    }

    /// Validates the components and freezes them into a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if the keyspace or the
    /// application token is absent or empty. The keyspace is checked first.
    pub fn into_descriptor(self) -> DocumentStoreResult<ConnectionDescriptor> {
        let keyspace = self.require_keyspace()?.to_string();
        let application_token = self.application_token.ok_or_else(|| {
            DocumentStoreError::Validation("Invalid URI: applicationToken is required".into())
        })?;

        Ok(ConnectionDescriptor {
            base_url: self.base_url,
            base_api_path: self
                .base_api_path
                .unwrap_or_else(|| DEFAULT_BASE_API_PATH.to_string()),
            keyspace,
            application_token,
            log_level: self.log_level,
        })
    }
}

/// Parses and validates a connection URI.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Validation`] when the URI is malformed, or
/// when the keyspace path segment or the `applicationToken` parameter is
/// missing or empty.
pub fn parse_descriptor(uri: &str) -> DocumentStoreResult<ConnectionDescriptor> {
    DescriptorParts::parse(uri)?.into_descriptor()
}

/// Builds the canonical URI of a production database.
///
/// The output has the shape
/// `https://{database_id}-{region}.apps.astra.datastax.com/{keyspace}?applicationToken=..&logLevel=..`;
/// absent components are omitted.
pub fn build_production_uri(
    database_id: &str,
    region: &str,
    keyspace: Option<&str>,
    application_token: Option<&str>,
    log_level: Option<&str>,
) -> DocumentStoreResult<String> {
    let mut uri = Url::parse(&format!("https://{}-{}.{}", database_id, region, PRODUCTION_DOMAIN))?;

    if let Some(keyspace) = keyspace {
        uri.set_path(&format!("/{}", keyspace));
    }

    let params = [
        (APPLICATION_TOKEN_PARAM, application_token),
        (LOG_LEVEL_PARAM, log_level),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|value| (key, value)))
    .collect::<Vec<_>>();

    if !params.is_empty() {
        uri.query_pairs_mut().extend_pairs(params);
    }

    Ok(uri.to_string())
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keyspace_and_token() {
        let descriptor = parse_descriptor("https://host/ks1?applicationToken=tok1").unwrap();

        assert_eq!(descriptor.base_url(), "https://host");
        assert_eq!(descriptor.keyspace(), "ks1");
        assert_eq!(descriptor.application_token(), "tok1");
        assert_eq!(descriptor.base_api_path(), DEFAULT_BASE_API_PATH);
        assert_eq!(descriptor.log_level(), None);
    }

    #[test]
    fn keeps_port_and_optional_parameters() {
        let descriptor = parse_descriptor(
            "http://localhost:8082/ks1?applicationToken=tok1&baseApiPath=/v2/namespaces&logLevel=debug",
        )
        .unwrap();

        assert_eq!(descriptor.base_url(), "http://localhost:8082");
        assert_eq!(descriptor.base_api_path(), STARGATE_BASE_API_PATH);
        assert_eq!(descriptor.log_level(), Some("debug"));
        assert_eq!(descriptor.log_level_filter(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn missing_token_is_rejected() {
        let err = parse_descriptor("https://host/ks1").unwrap_err();

        assert!(matches!(err, DocumentStoreError::Validation(_)));
        assert_eq!(err.to_string(), "Invalid URI: applicationToken is required");
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = parse_descriptor("https://host/ks1?applicationToken=").unwrap_err();

        assert_eq!(err.to_string(), "Invalid URI: applicationToken is required");
    }

    #[test]
    fn missing_keyspace_is_rejected_before_token() {
        for uri in ["https://host", "https://host/", "https://host/?applicationToken=tok1"] {
            let err = parse_descriptor(uri).unwrap_err();
            assert_eq!(err.to_string(), "Invalid URI: keyspace is required", "{uri}");
        }
    }

    #[test]
    fn malformed_uri_is_a_validation_error() {
        let err = parse_descriptor("not a uri").unwrap_err();

        assert!(matches!(err, DocumentStoreError::Validation(_)));
    }

    #[test]
    fn production_uri_round_trips() {
        let uri = build_production_uri("db-1", "us-east1", Some("ks1"), Some("AstraCS:a:b"), Some("info")).unwrap();

        assert!(uri.starts_with("https://db-1-us-east1.apps.astra.datastax.com/ks1?"));

        let descriptor = parse_descriptor(&uri).unwrap();
        assert_eq!(descriptor.keyspace(), "ks1");
        assert_eq!(descriptor.application_token(), "AstraCS:a:b");
        assert_eq!(descriptor.log_level(), Some("info"));
    }

    #[test]
    fn production_uri_omits_absent_parts() {
        let uri = build_production_uri("db", "eu", None, None, None).unwrap();

        assert_eq!(uri, "https://db-eu.apps.astra.datastax.com/");
    }

    #[test]
    fn npm_style_levels_map_to_tracing() {
        let level = |name: &str| {
            parse_descriptor(&format!("https://h/ks?applicationToken=t&logLevel={name}"))
                .unwrap()
                .log_level_filter()
        };

        assert_eq!(level("silly"), Some(LevelFilter::TRACE));
        assert_eq!(level("verbose"), Some(LevelFilter::DEBUG));
        assert_eq!(level("warn"), Some(LevelFilter::WARN));
        assert_eq!(level("loud"), None);
    }
}

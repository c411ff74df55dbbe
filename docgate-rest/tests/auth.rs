use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

use docgate_core::{descriptor::parse_descriptor, error::DocumentStoreError};
use docgate_rest::{CredentialResolver, Credentials};

fn credentials(server: &MockServer) -> Credentials {
    Credentials::new(format!("{}/v1/auth", server.uri()), "cassandra", "secret")
}

async fn token_endpoint(server: &MockServer, token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/auth"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "username": "cassandra", "password": "secret" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "authToken": token })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn exchange_returns_the_auth_token() {
    let server = MockServer::start().await;
    token_endpoint(&server, "tok-123", 1).await;

    let token = CredentialResolver::new()
        .exchange(&credentials(&server))
        .await
        .unwrap();

    assert_eq!(token, "tok-123");
}

#[tokio::test]
async fn exchange_failure_uses_the_remote_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "description": "Failed to authenticate",
            "code": 401,
        })))
        .mount(&server)
        .await;

    let err = CredentialResolver::new()
        .exchange(&credentials(&server))
        .await
        .unwrap_err();

    assert!(matches!(&err, DocumentStoreError::AuthExchange(_)));
    assert_eq!(err.to_string(), "Failed to authenticate");
}

#[tokio::test]
async fn exchange_failure_without_description_reports_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = CredentialResolver::new()
        .exchange(&credentials(&server))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Request failed with status code 500");
}

#[tokio::test]
async fn existing_tokens_are_returned_without_an_exchange() {
    let server = MockServer::start().await;
    token_endpoint(&server, "unused", 0).await;
    let resolver = CredentialResolver::new();

    let token = resolver
        .resolve_token(Some("tok1"), Some(&credentials(&server)))
        .await
        .unwrap();

    assert_eq!(token, "tok1");
}

#[tokio::test]
async fn empty_tokens_fall_back_to_the_exchange() {
    let server = MockServer::start().await;
    token_endpoint(&server, "exchanged", 1).await;

    let token = CredentialResolver::new()
        .resolve_token(Some(""), Some(&credentials(&server)))
        .await
        .unwrap();

    assert_eq!(token, "exchanged");
}

#[tokio::test]
async fn missing_token_and_credentials_is_a_validation_error() {
    let err = CredentialResolver::new()
        .resolve_token(None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::Validation(_)));
}

#[tokio::test]
async fn descriptors_without_a_token_exchange_credentials() {
    let server = MockServer::start().await;
    token_endpoint(&server, "exchanged", 1).await;

    let descriptor = CredentialResolver::new()
        .resolve_descriptor("http://localhost:8082/ks1", Some(&credentials(&server)))
        .await
        .unwrap();

    assert_eq!(descriptor.keyspace(), "ks1");
    assert_eq!(descriptor.application_token(), "exchanged");
}

#[tokio::test]
async fn keyspace_is_checked_before_exchanging() {
    let server = MockServer::start().await;
    token_endpoint(&server, "unused", 0).await;

    let err = CredentialResolver::new()
        .resolve_descriptor("http://localhost:8082/", Some(&credentials(&server)))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Invalid URI: keyspace is required");
}

#[tokio::test]
async fn uri_tokens_take_precedence_over_credentials() {
    let server = MockServer::start().await;
    token_endpoint(&server, "unused", 0).await;

    let descriptor = CredentialResolver::new()
        .resolve_descriptor("http://localhost:8082/ks1?applicationToken=tok1", Some(&credentials(&server)))
        .await
        .unwrap();

    assert_eq!(descriptor.application_token(), "tok1");
}

#[tokio::test]
async fn stargate_uris_round_trip_through_the_parser() {
    let server = MockServer::start().await;
    token_endpoint(&server, "tok-sg", 1).await;

    let uri = CredentialResolver::new()
        .build_stargate_uri(
            "http://localhost:8082",
            &format!("{}/v1/auth", server.uri()),
            "ks1",
            "cassandra",
            "secret",
            Some("debug"),
        )
        .await
        .unwrap();

    let descriptor = parse_descriptor(&uri).unwrap();
    assert_eq!(descriptor.base_url(), "http://localhost:8082");
    assert_eq!(descriptor.base_api_path(), "/v2/namespaces");
    assert_eq!(descriptor.keyspace(), "ks1");
    assert_eq!(descriptor.application_token(), "tok-sg");
    assert_eq!(descriptor.log_level(), Some("debug"));
}

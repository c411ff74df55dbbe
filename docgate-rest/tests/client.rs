use std::sync::Arc;

use bson::doc;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

use docgate_core::{
    client::{ClientConnector, CollectionOptions, DocumentClient},
    descriptor::parse_descriptor,
    error::DocumentStoreError,
    query::{FindOptions, format_query},
};
use docgate_rest::{MAX_PAGE_SIZE, RestConnector, TOKEN_HEADER};

const COLLECTIONS: &str = "/api/rest/v2/namespaces/ks1/collections";

async fn connect(server: &MockServer) -> Arc<dyn DocumentClient> {
    let descriptor = parse_descriptor(&format!("{}/ks1?applicationToken=tok1", server.uri())).unwrap();

    RestConnector::new().connect(&descriptor).await.unwrap()
}

#[tokio::test]
async fn create_collection_posts_the_name_and_schema() {
    let server = MockServer::start().await;
    let schema = json!({ "type": "object", "properties": { "name": { "type": "string" } } });

    Mock::given(method("POST"))
        .and(path(COLLECTIONS))
        .and(header(TOKEN_HEADER, "tok1"))
        .and(body_json(json!({ "name": "carts" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/carts/json-schema", COLLECTIONS)))
        .and(body_json(schema.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(schema.clone()))
        .expect(1)
        .mount(&server)
        .await;

    connect(&server)
        .await
        .create_collection("carts", &CollectionOptions::default().with_json_schema(schema))
        .await
        .unwrap();
}

#[tokio::test]
async fn list_collections_reads_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(COLLECTIONS))
        .and(query_param("raw", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "carts", "upgradeAvailable": false },
            { "name": "orders", "upgradeAvailable": false },
        ])))
        .mount(&server)
        .await;

    let names = connect(&server).await.list_collections().await.unwrap();

    assert_eq!(names, vec!["carts", "orders"]);
}

#[tokio::test]
async fn drop_of_a_missing_collection_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/carts", COLLECTIONS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = connect(&server).await.drop_collection("carts").await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::CollectionNotFound(name) if name == "carts"));
}

#[tokio::test]
async fn documents_are_written_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/carts/c1", COLLECTIONS)))
        .and(header(TOKEN_HEADER, "tok1"))
        .and(body_json(json!({ "_id": "c1", "name": "My Cart", "total": 25 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "documentId": "c1" })))
        .expect(1)
        .mount(&server)
        .await;

    connect(&server)
        .await
        .insert_document("carts", "c1", doc! { "_id": "c1", "name": "My Cart", "total": 25 })
        .await
        .unwrap();
}

#[tokio::test]
async fn get_document_maps_not_found_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/carts/c1", COLLECTIONS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "My Cart" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/carts/c2", COLLECTIONS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = connect(&server).await;

    assert_eq!(
        client.get_document("carts", "c1").await.unwrap(),
        Some(doc! { "name": "My Cart", "_id": "c1" })
    );
    assert_eq!(client.get_document("carts", "c2").await.unwrap(), None);
}

#[tokio::test]
async fn find_documents_sends_where_page_size_and_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/carts", COLLECTIONS)))
        .and(query_param("where", r#"{"name":{"$eq":"My Cart"}}"#))
        .and(query_param("page-size", "5"))
        .and(query_param("fields", r#"["name"]"#))
        .and(query_param("raw", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "c1": { "name": "My Cart" },
            "c2": { "_id": "c2", "name": "My Cart" },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = FindOptions::builder().limit(5).fields(["name"]).build();
    let predicate = format_query(&doc! { "name": "My Cart" }, &options).unwrap();

    let found = connect(&server)
        .await
        .find_documents("carts", &predicate, &options)
        .await
        .unwrap();

    assert_eq!(
        found,
        vec![
            doc! { "name": "My Cart", "_id": "c1" },
            doc! { "_id": "c2", "name": "My Cart" },
        ]
    );
}

#[tokio::test]
async fn searches_request_at_most_one_full_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/carts", COLLECTIONS)))
        .and(query_param("page-size", MAX_PAGE_SIZE.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let predicate = format_query(&doc! {}, &FindOptions::default()).unwrap();

    for options in [FindOptions::default(), FindOptions::builder().limit(500).build()] {
        let found = client.find_documents("carts", &predicate, &options).await.unwrap();
        assert!(found.is_empty());
    }
}

#[tokio::test]
async fn failures_carry_the_remote_description() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/carts/c1", COLLECTIONS)))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "description": "Invalid JSON body",
            "code": 400,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(COLLECTIONS))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let err = client.patch_document("carts", "c1", doc! { "total": 1 }).await.unwrap_err();
    assert_eq!(err.to_string(), "Backend error: Invalid JSON body");

    let err = client.list_collections().await.unwrap_err();
    assert_eq!(err.to_string(), "Backend error: Request failed with status code 503");
}

#[tokio::test]
async fn patch_and_delete_of_missing_documents() {
    let server = MockServer::start().await;
    Mock::given(path(format!("{}/carts/gone", COLLECTIONS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = connect(&server).await;

    assert!(matches!(
        client.patch_document("carts", "gone", doc! { "total": 1 }).await,
        Err(DocumentStoreError::DocumentNotFound(id, _)) if id == "gone"
    ));
    client.delete_document("carts", "gone").await.unwrap();
}

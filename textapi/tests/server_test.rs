use std::sync::Arc;

use anyhow::Result;
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::{json, Value};
use textapi::llm::gemini::GeminiProvider;
use textapi::llm::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};
use textapi::server::{build_rocket, AppState, GenerationSettings, DEFAULT_PROMPT};

/// Provider that echoes a fixed text and records nothing.
struct FixedProvider(&'static str);

#[async_trait::async_trait]
impl LlmProvider for FixedProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        assert_eq!(request.prompt, DEFAULT_PROMPT);
        Ok(LlmResponse {
            content: self.0.to_string(),
            usage: UsageMetadata::default(),
            model: "fixed".to_string(),
        })
    }
}

async fn client_with(provider: Option<Arc<dyn LlmProvider>>) -> Client {
    let state = AppState {
        llm_provider: provider,
        generation: GenerationSettings::default(),
    };
    let figment = rocket::Config::figment().merge(("log_level", "off"));
    Client::tracked(build_rocket(state, figment))
        .await
        .expect("valid rocket instance")
}

#[tokio::test]
async fn root_returns_constant_payload() {
    let client = client_with(None).await;

    let first = client.get("/").dispatch().await;
    assert_eq!(first.status(), Status::Ok);
    let first: Value = first.into_json().await.expect("json body");
    assert_eq!(first, json!(["Hello World"]));

    let second: Value = client
        .get("/?anything=1")
        .dispatch()
        .await
        .into_json()
        .await
        .expect("json body");
    assert_eq!(first, second);
}

#[tokio::test]
async fn read_item_echoes_id_and_missing_query() {
    let client = client_with(None).await;

    let response = client.get("/items/5").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body, json!({"item_id": 5, "q": null}));
}

#[tokio::test]
async fn read_item_echoes_query() {
    let client = client_with(None).await;

    let body: Value = client
        .get("/items/42?q=somequery")
        .dispatch()
        .await
        .into_json()
        .await
        .expect("json body");
    assert_eq!(body, json!({"item_id": 42, "q": "somequery"}));
}

#[tokio::test]
async fn read_item_rejects_non_integer_id() {
    let client = client_with(None).await;

    let response = client.get("/items/abc").dispatch().await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["detail"], "Unprocessable Entity");
}

#[tokio::test]
async fn update_item_returns_name_and_id() {
    let client = client_with(None).await;

    let response = client
        .put("/items/7")
        .header(ContentType::JSON)
        .body(r#"{"name": "pen", "price": 1.5}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body, json!({"item_name": "pen", "item_id": 7}));
}

#[tokio::test]
async fn update_item_accepts_offer_flag() {
    let client = client_with(None).await;

    let response = client
        .put("/items/3")
        .header(ContentType::JSON)
        .body(r#"{"name": "book", "price": 12, "is_offer": true}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body, json!({"item_name": "book", "item_id": 3}));
}

#[tokio::test]
async fn update_item_without_price_fails_validation() {
    let client = client_with(None).await;

    let response = client
        .put("/items/7")
        .header(ContentType::JSON)
        .body(r#"{"name": "pen"}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[tokio::test]
async fn update_item_with_malformed_body_fails_validation() {
    let client = client_with(None).await;

    let response = client
        .put("/items/7")
        .header(ContentType::JSON)
        .body(r#"{"name": "pen", "price": "#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["detail"], "Unprocessable Entity");
}

#[tokio::test]
async fn update_item_with_empty_or_non_json_body_fails_validation() {
    let client = client_with(None).await;

    for body in ["", "not json"] {
        let response = client
            .put("/items/7")
            .header(ContentType::JSON)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity, "body {:?}", body);
    }
}

#[tokio::test]
async fn update_item_rejects_non_integer_id() {
    let client = client_with(None).await;

    let response = client
        .put("/items/seven")
        .header(ContentType::JSON)
        .body(r#"{"name": "pen", "price": 1.5}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[tokio::test]
async fn generate_text_wraps_provider_output() {
    let client = client_with(Some(Arc::new(FixedProvider("A poem")))).await;

    let response = client.get("/generate-text/").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body, json!(["A poem"]));
}

#[tokio::test]
async fn generate_text_without_credential_is_server_error() {
    let client = client_with(None).await;

    let response = client.get("/generate-text/").dispatch().await;
    assert_eq!(response.status(), Status::InternalServerError);
}

#[tokio::test]
async fn generate_text_surfaces_provider_failure_as_server_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-2.5-flash:generateContent")
        .with_status(403)
        .with_body(r#"{"error": {"code": 403, "message": "API key not valid"}}"#)
        .create_async()
        .await;

    let provider = GeminiProvider::new(server.url(), "bad-key", "gemini-2.5-flash");
    let client = client_with(Some(Arc::new(provider))).await;

    let response = client.get("/generate-text/").dispatch().await;
    assert_eq!(response.status(), Status::InternalServerError);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["detail"], "Internal Server Error");

    mock.assert_async().await;
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let client = client_with(None).await;

    let response = client.get("/nope").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["detail"], "Not Found");
}

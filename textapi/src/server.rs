use std::sync::Arc;

use anyhow::{anyhow, Result};
use rocket::figment::Figment;
use rocket::http::Status;
use rocket::request::Request;
use rocket::serde::json::{Error as JsonError, Json};
use rocket::{catch, catchers, get, put, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};
use serde_json::json;

use common::Config;

use crate::llm::gemini::{self, GeminiProvider};
use crate::llm::{LlmProvider, LlmRequest};

pub const DEFAULT_PROMPT: &str = "Write a poem about FastAPI in Python.";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Prompt and tuning sent by `/generate-text/`.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    /// `None` when no credential was available at startup.
    pub llm_provider: Option<Arc<dyn LlmProvider>>,
    pub generation: GenerationSettings,
}

/// Request body for `PUT /items/<item_id>`.
#[derive(Debug, Deserialize)]
pub struct Item {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub is_offer: Option<bool>,
}

#[derive(Serialize)]
struct ItemQuery {
    item_id: i64,
    q: Option<String>,
}

#[derive(Serialize)]
struct ItemUpdated {
    item_name: String,
    item_id: i64,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: &'static str,
}

#[get("/")]
fn read_root() -> Json<serde_json::Value> {
    Json(json!(["Hello World"]))
}

#[get("/items/<item_id>?<q>")]
fn read_item(item_id: Result<i64, &str>, q: Option<String>) -> Result<Json<ItemQuery>, Status> {
    let item_id = item_id.map_err(|raw| {
        tracing::debug!(%raw, "item_id is not an integer");
        Status::UnprocessableEntity
    })?;
    Ok(Json(ItemQuery { item_id, q }))
}

#[put("/items/<item_id>", data = "<item>")]
fn update_item(
    item_id: Result<i64, &str>,
    item: Result<Json<Item>, JsonError<'_>>,
) -> Result<Json<ItemUpdated>, Status> {
    let item_id = item_id.map_err(|raw| {
        tracing::debug!(%raw, "item_id is not an integer");
        Status::UnprocessableEntity
    })?;
    // Syntax errors and empty bodies are validation failures too, not 400s.
    let item = item
        .map_err(|e| {
            tracing::debug!("item body rejected: {}", e);
            Status::UnprocessableEntity
        })?
        .into_inner();
    tracing::debug!(item_id, price = item.price, is_offer = ?item.is_offer, "item update received");
    Ok(Json(ItemUpdated {
        item_name: item.name,
        item_id,
    }))
}

/// Forward the configured prompt to the provider and wrap its text in a one-element array.
#[get("/generate-text")]
async fn generate_text(state: &State<AppState>) -> Result<Json<Vec<String>>, Status> {
    let provider = state.llm_provider.as_ref().ok_or_else(|| {
        tracing::error!("generate-text called but no LLM provider is configured");
        Status::InternalServerError
    })?;

    let request = LlmRequest {
        max_tokens: state.generation.max_tokens,
        temperature: state.generation.temperature,
        ..LlmRequest::new(state.generation.prompt.clone())
    };

    let response = provider.generate(request).await.map_err(|e| {
        tracing::error!("text generation failed: {:#}", e);
        Status::InternalServerError
    })?;

    tracing::info!(
        model = %response.model,
        prompt_tokens = response.usage.prompt_tokens,
        completion_tokens = response.usage.completion_tokens,
        "text generated"
    );
    Ok(Json(vec![response.content]))
}

#[catch(400)]
fn bad_request(_req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody { detail: "Bad Request" })
}

#[catch(404)]
fn not_found(_req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody { detail: "Not Found" })
}

#[catch(422)]
fn unprocessable(req: &Request) -> Json<ErrorBody> {
    tracing::debug!(uri = %req.uri(), "request failed validation");
    Json(ErrorBody { detail: "Unprocessable Entity" })
}

#[catch(500)]
fn internal_error(_req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody { detail: "Internal Server Error" })
}

/// Build the provider from the `[llm]` section. A missing API key is not fatal:
/// the service starts and `/generate-text/` answers 500.
pub fn create_llm_provider(config: &Config) -> Result<Option<Arc<dyn LlmProvider>>> {
    let llm_config = config.llm.clone().unwrap_or_default();

    let api_url = llm_config
        .api_url
        .clone()
        .unwrap_or_else(|| gemini::DEFAULT_API_URL.to_string());
    common::parse_endpoint(&api_url)?;

    let api_key_env = llm_config
        .api_key_env
        .as_deref()
        .unwrap_or(DEFAULT_API_KEY_ENV);
    let api_key = match common::api_key_from_env(api_key_env) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!("{}; /generate-text/ will fail until it is set", e);
            return Ok(None);
        }
    };

    let model = llm_config
        .model
        .clone()
        .unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string());
    let provider = GeminiProvider::new(&api_url, api_key, &model)
        .with_defaults(llm_config.timeout_seconds, llm_config.max_tokens, llm_config.temperature);
    tracing::info!("LLM provider initialized: gemini ({}) at {}", provider.model(), api_url);

    Ok(Some(Arc::new(provider) as Arc<dyn LlmProvider>))
}

/// Read the prompt settings from the `[llm]` section.
pub fn generation_settings(config: &Config) -> GenerationSettings {
    let defaults = GenerationSettings::default();
    match &config.llm {
        Some(llm) => GenerationSettings {
            prompt: llm.prompt.clone().unwrap_or(defaults.prompt),
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
        },
        None => defaults,
    }
}

/// Assemble the Rocket instance with its routes, catchers and managed state.
pub fn build_rocket(state: AppState, figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .mount("/", routes![read_root, read_item, update_item, generate_text])
        .register("/", catchers![bad_request, not_found, unprocessable, internal_error])
}

/// Build and launch the Rocket server.
///
/// `[server] bind` and `port` from the configuration override Rocket's own
/// figment defaults. This function blocks until the server shuts down.
pub async fn launch_rocket(config: Arc<Config>) -> Result<()> {
    let state = AppState {
        llm_provider: create_llm_provider(&config)?,
        generation: generation_settings(&config),
    };

    let mut fig = rocket::Config::figment();
    if let Some(server) = &config.server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    tracing::info!("Starting Rocket HTTP server");
    build_rocket(state, fig)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::LlmConfig;

    #[test]
    fn generation_settings_fall_back_to_default_prompt() {
        let settings = generation_settings(&Config::default());
        assert_eq!(settings.prompt, DEFAULT_PROMPT);
        assert!(settings.max_tokens.is_none());
    }

    #[test]
    fn generation_settings_read_llm_section() {
        let config = Config {
            llm: Some(LlmConfig {
                prompt: Some("Write a haiku".to_string()),
                max_tokens: Some(32),
                ..LlmConfig::default()
            }),
            ..Config::default()
        };
        let settings = generation_settings(&config);
        assert_eq!(settings.prompt, "Write a haiku");
        assert_eq!(settings.max_tokens, Some(32));
    }

    #[test]
    fn missing_api_key_yields_no_provider() {
        let config = Config {
            llm: Some(LlmConfig {
                api_key_env: Some("TEXTAPI_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
                ..LlmConfig::default()
            }),
            ..Config::default()
        };
        let provider = create_llm_provider(&config).expect("no hard failure");
        assert!(provider.is_none());
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        let config = Config {
            llm: Some(LlmConfig {
                api_url: Some("not a url".to_string()),
                ..LlmConfig::default()
            }),
            ..Config::default()
        };
        assert!(create_llm_provider(&config).is_err());
    }
}

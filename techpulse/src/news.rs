use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://newsapi.org/v2/top-headlines";
pub const DEFAULT_API_KEY_ENV: &str = "NEWSAPI_KEY";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Categories offered by the category picker.
pub const CATEGORIES: [&str; 3] = ["technology", "business", "science"];
/// Sources offered by the source picker; the empty entry means "any".
pub const SOURCES: [&str; 4] = ["", "techcrunch", "bbc-news", "wired"];

/// Query parameters for a top-headlines request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub category: String,
    /// Free-text search, sent as `q`
    pub search: String,
    /// Source id, sent as `sources`
    pub source: String,
    pub language: String,
}

impl Default for NewsQuery {
    fn default() -> Self {
        Self {
            category: CATEGORIES[0].to_string(),
            search: String::new(),
            source: String::new(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A headline returned by the aggregation endpoint. Only `title` and `url`
/// are required; the remaining fields are kept for display and fall back to
/// `None` when malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub url: String,
    #[serde(default, deserialize_with = "lenient")]
    pub source: Option<ArticleSource>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub published_at: Option<DateTime<Utc>>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

impl Article {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source: None,
            description: None,
            published_at: None,
        }
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.name.as_deref())
    }
}

/// Envelope of a top-headlines response. Error responses carry `code` and
/// `message` and no `articles`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub articles: Option<Vec<Article>>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Client for the news aggregation endpoint
pub struct NewsClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl NewsClient {
    /// `timeout_secs` of `None` leaves requests without a deadline.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        let mut builder = Client::builder().user_agent("TechPulse/0.1.0");
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("failed to build reqwest client")?;

        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Fetch the current top headlines for `query`.
    ///
    /// The body is parsed whatever the HTTP status; a response without an
    /// `articles` field yields an empty list. Network and JSON errors are returned.
    pub async fn top_headlines(&self, query: &NewsQuery) -> Result<Vec<Article>> {
        let params = [
            ("apiKey", self.api_key.as_str()),
            ("category", query.category.as_str()),
            ("q", query.search.as_str()),
            ("sources", query.source.as_str()),
            ("language", query.language.as_str()),
        ];

        debug!(url = %self.base_url, category = %query.category, q = %query.search, sources = %query.source, "fetching headlines");

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .context("network error during news fetch")?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .context("failed to read news response body")?;
        let parsed: NewsResponse =
            serde_json::from_slice(&body).context("failed to parse news response")?;

        if parsed.status.as_deref() == Some("error") || !status.is_success() {
            warn!(
                %status,
                code = parsed.code.as_deref().unwrap_or("unknown"),
                message = parsed.message.as_deref().unwrap_or(""),
                "news endpoint reported an error"
            );
        }

        let articles = parsed.articles.unwrap_or_default();
        debug!(count = articles.len(), total = ?parsed.total_results, "headlines received");
        Ok(articles)
    }
}

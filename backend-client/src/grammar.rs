//! HTTP client for the grammar-analysis backend.
//!
//! Both calls are idempotent per input text and sit behind an LRU cache,
//! a retry policy, and per-call deadlines (morphological analysis is the
//! cheap call and gets the shorter one).

use std::time::Duration;

use log::debug;

use correction_core::{CheckResponse, MorphemeResponse};

use crate::cache::ResponseCache;
use crate::error::ClientError;
use crate::retry::{RetryConfig, with_retry, with_timeout};

const DEFAULT_CACHE_CAPACITY: usize = 100;
const MORPHEME_DEADLINE: Duration = Duration::from_secs(10);
const CHECK_DEADLINE: Duration = Duration::from_secs(30);

pub struct GrammarClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
    morpheme_cache: ResponseCache<MorphemeResponse>,
    check_cache: ResponseCache<CheckResponse>,
}

impl GrammarClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            retry: RetryConfig::default(),
            morpheme_cache: ResponseCache::new(DEFAULT_CACHE_CAPACITY),
            check_cache: ResponseCache::new(DEFAULT_CACHE_CAPACITY),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.morpheme_cache = ResponseCache::new(capacity);
        self.check_cache = ResponseCache::new(capacity);
        self
    }

    /// Morphological analysis of `text`, cached by exact input.
    pub async fn analyze_morphemes(&mut self, text: &str) -> Result<MorphemeResponse, ClientError> {
        if let Some(cached) = self.morpheme_cache.get(text) {
            debug!("morpheme cache hit");
            return Ok(cached);
        }
        let url = format!("{}/morphemes", self.base_url);
        let response: MorphemeResponse = with_retry("analyze_morphemes", &self.retry, || {
            with_timeout(
                self.post_json(&url, text),
                MORPHEME_DEADLINE,
                "morpheme analysis",
            )
        })
        .await?;
        self.morpheme_cache.put(text, response.clone());
        Ok(response)
    }

    /// Full spelling/grammar check of `text`, cached by exact input.
    pub async fn check_spelling(&mut self, text: &str) -> Result<CheckResponse, ClientError> {
        if let Some(cached) = self.check_cache.get(text) {
            debug!("spelling cache hit");
            return Ok(cached);
        }
        let url = format!("{}/revise", self.base_url);
        let response: CheckResponse = with_retry("check_spelling", &self.retry, || {
            with_timeout(self.post_json(&url, text), CHECK_DEADLINE, "spelling check")
        })
        .await?;
        self.check_cache.put(text, response.clone());
        Ok(response)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        text: &str,
    ) -> Result<T, ClientError> {
        let mut request = self
            .http
            .post(url)
            .json(&serde_json::json!({ "document": { "content": text } }));
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ClientError::BackendUnreachable(format!(
                "{url} answered {}",
                response.status()
            )));
        }
        Ok(response.json::<T>().await?)
    }
}

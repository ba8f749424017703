//! Remote image description: the only stage with network I/O.
//!
//! The [`ImageDescriber`] trait is the seam between the pipeline and the
//! remote service. Production uses [`GeminiDescriber`], a thin reqwest
//! client for the Generative Language REST API; tests inject a mock through
//! [`crate::config::JobConfig::describer`].
//!
//! ## Retry strategy
//!
//! 429/5xx/timeout responses are transient and common under free-tier
//! quotas. [`describe_with_retry`] backs off exponentially
//! (`retry_backoff_ms * 2^attempt`): with a 500 ms base and two retries the
//! wait sequence is 500 ms → 1 s. Permanent errors (bad key, 400) are
//! returned immediately — retrying them only burns quota.
//!
//! ## Client-side pacing and dedup
//!
//! [`RateLimiter`] enforces a minimum spacing between calls so a page full
//! of images doesn't trip the per-minute quota in one burst.
//! [`ImageCache`] keys finished descriptions by content hash: logos and
//! headers repeated on every page are described once.

use crate::error::DescribeError;
use crate::pipeline::extract::ImageBlob;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Base URL of the Generative Language API.
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// The one logical operation of the remote collaborator:
/// image bytes in, natural-language description out.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe(&self, image: &ImageBlob) -> Result<String, DescribeError>;
}

/// Production describer backed by the Gemini `generateContent` endpoint.
pub struct GeminiDescriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
    prompt: String,
    timeout_secs: u64,
    limiter: RateLimiter,
}

impl GeminiDescriber {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        timeout_secs: u64,
        min_request_interval_ms: u64,
    ) -> Result<Self, DescribeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            prompt: prompt.into(),
            timeout_secs,
            limiter: RateLimiter::new(Duration::from_millis(min_request_interval_ms)),
        })
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/{}:generateContent", self.model)
    }
}

#[async_trait]
impl ImageDescriber for GeminiDescriber {
    async fn describe(&self, image: &ImageBlob) -> Result<String, DescribeError> {
        self.limiter.wait().await;

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: self.prompt.clone(),
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: image.mime.to_string(),
                            data: STANDARD.encode(&image.data),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DescribeError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    DescribeError::Http(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(DescribeError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DescribeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(DescribeError::EmptyResponse);
        }
        debug!("received {}-char description", text.len());
        Ok(text)
    }
}

/// Call the describer, retrying transient failures with exponential backoff.
pub async fn describe_with_retry(
    describer: &dyn ImageDescriber,
    image: &ImageBlob,
    max_retries: u32,
    backoff_ms: u64,
) -> Result<String, DescribeError> {
    let mut last_err: Option<DescribeError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "description retry {attempt}/{max_retries} after {backoff}ms: {}",
                last_err.as_ref().map(ToString::to_string).unwrap_or_default()
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match describer.describe(image).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() => last_err = Some(e),
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or(DescribeError::EmptyResponse))
}

/// Enforces a minimum interval between consecutive calls.
///
/// Holding the lock across the sleep intentionally serialises callers:
/// the second caller waits for the first one's slot to pass.
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until the next call slot is available, then claim it.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Bounded cache of finished descriptions keyed by image content hash.
///
/// PDFs repeat the same logo or header image on every page; describing it
/// once is enough. Eviction is oldest-first when the capacity is reached.
pub struct ImageCache {
    capacity: usize,
    entries: HashMap<blake3::Hash, String>,
    order: VecDeque<blake3::Hash>,
}

impl ImageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, data: &[u8]) -> Option<&str> {
        self.entries.get(&blake3::hash(data)).map(String::as_str)
    }

    pub fn insert(&mut self, data: &[u8], description: String) {
        let hash = blake3::hash(data);
        if self.entries.insert(hash, description).is_none() {
            self.order.push_back(hash);
            if self.order.len() > self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyDescriber {
        calls: AtomicUsize,
        fail_first: usize,
        transient: bool,
    }

    #[async_trait]
    impl ImageDescriber for FlakyDescriber {
        async fn describe(&self, _image: &ImageBlob) -> Result<String, DescribeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                if self.transient {
                    Err(DescribeError::RateLimited)
                } else {
                    Err(DescribeError::Api {
                        status: 401,
                        message: "bad key".into(),
                    })
                }
            } else {
                Ok("a small chart".into())
            }
        }
    }

    fn blob() -> ImageBlob {
        ImageBlob {
            data: vec![1, 2, 3],
            mime: "image/png",
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let describer = FlakyDescriber {
            calls: AtomicUsize::new(0),
            fail_first: 2,
            transient: true,
        };

        let text = describe_with_retry(&describer, &blob(), 2, 1).await.unwrap();
        assert_eq!(text, "a small chart");
        assert_eq!(describer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_exhausted_returns_last_error() {
        let describer = FlakyDescriber {
            calls: AtomicUsize::new(0),
            fail_first: 10,
            transient: true,
        };

        let err = describe_with_retry(&describer, &blob(), 2, 1).await.unwrap_err();
        assert!(matches!(err, DescribeError::RateLimited));
        // First attempt plus two retries.
        assert_eq!(describer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let describer = FlakyDescriber {
            calls: AtomicUsize::new(0),
            fail_first: 10,
            transient: false,
        };

        let err = describe_with_retry(&describer, &blob(), 3, 1).await.unwrap_err();
        assert!(matches!(err, DescribeError::Api { status: 401, .. }));
        assert_eq!(describer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limiter_spaces_calls() {
        let limiter = RateLimiter::new(Duration::from_millis(30));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cache_hits_on_identical_bytes() {
        let mut cache = ImageCache::new(10);
        assert!(cache.get(b"logo").is_none());

        cache.insert(b"logo", "company logo".into());
        assert_eq!(cache.get(b"logo"), Some("company logo"));
        assert!(cache.get(b"other").is_none());
    }

    #[test]
    fn cache_evicts_oldest_at_capacity() {
        let mut cache = ImageCache::new(2);
        cache.insert(b"a", "A".into());
        cache.insert(b"b", "B".into());
        cache.insert(b"c", "C".into());

        assert!(cache.get(b"a").is_none());
        assert_eq!(cache.get(b"b"), Some("B"));
        assert_eq!(cache.get(b"c"), Some("C"));
    }

    #[test]
    fn request_body_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "describe".into() },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: "image/png".into(),
                            data: "QUJD".into(),
                        },
                    },
                ],
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "describe");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
    }

    #[test]
    fn response_parsing_tolerates_missing_fields() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"a photo"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(body.candidates[0].content.as_ref().unwrap().parts[0].text, "a photo");

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.candidates.is_empty());
    }
}

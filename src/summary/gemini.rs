//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::{MISSING_REPORT, Summarizer, Summary, SummaryError};
use crate::extract::DEFAULT_MAX_INPUT_CHARS;

/// Production API root.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used unless overridden.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Overall time allowed for one summary request.
pub const DEFAULT_SUMMARY_TIMEOUT: Duration = Duration::from_secs(60);

const CONNECT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("papertag/", env!("CARGO_PKG_VERSION"));

/// Summarizer backed by the Gemini API.
pub struct GeminiSummarizer {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
    max_input_chars: usize,
}

impl std::fmt::Debug for GeminiSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSummarizer")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GeminiSummarizer {
    /// Creates a summarizer against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::MissingApiKey`] for a blank key, or
    /// [`SummaryError::Client`] if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, SummaryError> {
        Self::with_base_url(api_key, DEFAULT_GEMINI_BASE_URL)
    }

    /// Creates a summarizer with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, SummaryError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(SummaryError::MissingApiKey);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|err| SummaryError::Client(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_key,
            timeout: DEFAULT_SUMMARY_TIMEOUT,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        })
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Caps how much text is sent.
    #[must_use]
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn request(&self, text: &str) -> Result<Summary, SummaryError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message: String = message.chars().take(200).collect();
            return Err(SummaryError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|err| SummaryError::Malformed(err.to_string()))?;
        parse_summary(body)
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    #[instrument(skip(self, text), fields(model = %self.model, chars = tracing::field::Empty))]
    async fn summarize(&self, text: &str) -> Result<Summary, SummaryError> {
        let text: String = text.chars().take(self.max_input_chars).collect();
        if text.trim().is_empty() {
            return Err(SummaryError::EmptyInput);
        }
        tracing::Span::current().record("chars", text.chars().count());

        match tokio::time::timeout(self.timeout, self.request(&text)).await {
            Ok(Ok(summary)) => {
                debug!(
                    report_len = summary.report.len(),
                    suggested = summary.suggested_tags.len(),
                    "summary received"
                );
                Ok(summary)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "summary request failed");
                Err(err)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "summary request timed out");
                Err(SummaryError::Timeout(self.timeout))
            }
        }
    }
}

fn prompt(text: &str) -> String {
    format!(
        "Analyze the following text from a research document. Your task is to:\n\
         1. Generate a formal report consisting of simple text paragraphs. The report should \
         cover an introduction, the key findings, and a conclusion. Ensure there is a new line \
         after each paragraph. Do NOT use markdown headings, numbered lists, or bullet points.\n\
         2. Identify 5 to 7 of the most relevant keywords or topics as tags.\n\n\
         Return the result as a single JSON object with two keys: \"report\" and \"tags\".\n\n\
         ---\nEXTRACTED TEXT:\n{text}\n---\n"
    )
}

fn request_body(text: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt(text) }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "report": { "type": "STRING" },
                    "tags": { "type": "ARRAY", "items": { "type": "STRING" } }
                }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// The JSON document the model is asked to produce.
#[derive(Debug, Deserialize)]
struct ReportPayload {
    report: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

fn parse_summary(body: GenerateResponse) -> Result<Summary, SummaryError> {
    let text = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| SummaryError::Malformed("no candidate text".to_string()))?;

    let payload: ReportPayload = serde_json::from_str(&text)
        .map_err(|err| SummaryError::Malformed(format!("candidate is not the report JSON: {err}")))?;

    let report = payload
        .report
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| MISSING_REPORT.to_string());

    Ok(Summary {
        report,
        suggested_tags: payload.tags,
    })
}

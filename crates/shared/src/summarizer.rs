use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{ApiError, Result};
use crate::models::NewReview;
use crate::pipeline::ItemSummarizer;
use crate::retry::RetryPolicy;

/// Longest reply line still accepted as a taco name.
const MAX_LABEL_CHARS: usize = 80;

/// Review text sent to the model is capped at this many bytes.
const MAX_PROMPT_REVIEW_BYTES: usize = 6000;

#[derive(Debug, Clone, PartialEq)]
pub enum BestItem {
    Found(String),
    /// Nothing to go on, or the model could not tell
    Unknown,
    Failed(String),
}

impl BestItem {
    pub fn into_label(self) -> Option<String> {
        match self {
            BestItem::Found(label) => Some(label),
            BestItem::Unknown | BestItem::Failed(_) => None,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Asks an OpenAI-compatible chat endpoint which taco the reviews praise most.
pub struct BestTacoSummarizer {
    client: Client,
    config: LlmConfig,
    base_url: String,
    retry: RetryPolicy,
}

impl BestTacoSummarizer {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = config.provider.base_url().to_string();

        Ok(Self {
            client,
            config,
            base_url,
            retry: RetryPolicy {
                max_attempts: 3,
                ..RetryPolicy::default()
            },
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn best_taco(&self, restaurant_name: &str, reviews: &[NewReview]) -> BestItem {
        let snippets = join_snippets(reviews);
        if snippets.is_empty() {
            return BestItem::Unknown;
        }

        let prompt = build_prompt(restaurant_name, &snippets);
        tracing::debug!(restaurant_name, %prompt, "best taco prompt");

        match self
            .retry
            .run_if("llm", worth_retrying, || self.try_summarize(&prompt))
            .await
        {
            Ok(reply) => match extract_label(&reply) {
                Some(label) => BestItem::Found(label),
                None => {
                    tracing::debug!(restaurant_name, %reply, "no usable label in reply");
                    BestItem::Unknown
                }
            },
            Err(e) => {
                tracing::warn!(restaurant_name, error = %e, "summarization failed");
                BestItem::Failed(e.to_string())
            }
        }
    }

    async fn try_summarize(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.7,
            max_tokens: 50,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.config.api_key)
            .header("content-type", "application/json")
            .json(&request);

        if self.config.provider == LlmProvider::OpenRouter {
            builder = builder.header("HTTP-Referer", "https://github.com/taco-finder");
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(ApiError::from_status(status, body));
        }

        let text = response.text().await?;
        let chat: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ApiError::Parse("response had no message content".to_string()))
    }
}

#[async_trait]
impl ItemSummarizer for BestTacoSummarizer {
    async fn summarize(&self, restaurant_name: &str, reviews: &[NewReview]) -> BestItem {
        self.best_taco(restaurant_name, reviews).await
    }
}

/// Sampling makes a garbled or empty reply worth another try.
fn worth_retrying(err: &ApiError) -> bool {
    err.is_transient() || matches!(err, ApiError::Parse(_))
}

/// Review texts separated by blank lines, capped at a UTF-8 boundary.
fn join_snippets(reviews: &[NewReview]) -> String {
    let joined = reviews
        .iter()
        .map(|r| r.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if joined.len() <= MAX_PROMPT_REVIEW_BYTES {
        return joined;
    }
    let mut end = MAX_PROMPT_REVIEW_BYTES;
    while end > 0 && !joined.is_char_boundary(end) {
        end -= 1;
    }
    joined[..end].to_string()
}

fn build_prompt(restaurant_name: &str, snippets: &str) -> String {
    format!(
        r#"You are a food critic. Given the restaurant '{}' and the following recent Yelp review snippets about their tacos:

{}

Which specific taco item seems to be the most highly praised?

RULES:
1. Answer with the taco name only (e.g. "Al Pastor Taco")
2. No additional text, not a complete sentence
3. If you cannot tell from these snippets, answer: Unknown"#,
        restaurant_name, snippets
    )
}

/// Pull the taco name out of a model reply.
///
/// Takes the first non-empty line, drops bullets, quotes and trailing
/// punctuation. Returns `None` for "Unknown", empty or rambling replies.
pub fn extract_label(reply: &str) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;

    let line = line.trim_start_matches(|c: char| c == '-' || c == '*' || c == '•' || c.is_whitespace());
    let line = line
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '*' || c.is_whitespace())
        .trim_end_matches(|c: char| c == '.' || c == '!')
        .trim();

    if line.is_empty() || line.chars().count() > MAX_LABEL_CHARS {
        return None;
    }
    if line.eq_ignore_ascii_case("unknown") {
        return None;
    }

    Some(line.to_string())
}

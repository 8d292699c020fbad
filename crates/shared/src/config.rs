use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Yelp caps search results at 50 per page.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Which OpenAI-compatible chat endpoint answers the best-taco question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenRouter,
    OpenAi,
}

impl LlmProvider {
    pub fn base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "https://openrouter.ai/api/v1",
            LlmProvider::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "anthropic/claude-3-haiku",
            LlmProvider::OpenAi => "gpt-4o-mini",
        }
    }

    fn key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
        }
    }

    fn key_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "https://openrouter.ai/settings/keys",
            LlmProvider::OpenAi => "https://platform.openai.com/api-keys",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub yelp_api_key: String,
    pub llm: LlmConfig,
}

impl Config {
    pub fn from_env(provider: LlmProvider) -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let yelp_api_key = env::var("YELP_API_KEY").context(
            "YELP_API_KEY not found.\n\n\
            To fix this, create ~/.config/taco-finder/.env with:\n  \
            YELP_API_KEY=your_key_here\n  \
            OPENROUTER_API_KEY=your_key_here\n\n\
            Get your Yelp Fusion API key from: https://www.yelp.com/developers/v3/manage_app",
        )?;

        let api_key = env::var(provider.key_var()).with_context(|| {
            format!(
                "{var} not found.\n\n\
                To fix this, add it to ~/.config/taco-finder/.env:\n  \
                {var}=your_key_here\n\n\
                Get a key from: {url}",
                var = provider.key_var(),
                url = provider.key_url()
            )
        })?;

        let model = env::var("TACO_LLM_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_string());

        Ok(Self {
            yelp_api_key,
            llm: LlmConfig {
                provider,
                api_key,
                model,
            },
        })
    }

    fn try_load_dotenv() {
        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/taco-finder/.env
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("taco-finder").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }
    }
}

/// What to search for and how hard to push the search API.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub term: String,
    pub location: String,
    pub categories: Option<String>,
    pub page_size: u32,
    /// Yelp refuses offsets past this point; the sweep ends here
    pub max_offset: u32,
    pub review_limit: u32,
    /// Pause between businesses to stay under the rate limit
    pub request_delay: Duration,
    /// Re-fetch businesses that are already stored
    pub refresh: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            term: "taco".to_string(),
            location: "Austin, TX".to_string(),
            categories: Some("tacos".to_string()),
            page_size: MAX_PAGE_SIZE,
            max_offset: 1000,
            review_limit: 3,
            request_delay: Duration::from_millis(500),
            refresh: false,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            anyhow::bail!(
                "Page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                self.page_size
            );
        }
        if self.term.trim().is_empty() {
            anyhow::bail!("Search term must not be empty");
        }
        if self.location.trim().is_empty() {
            anyhow::bail!("Search location must not be empty");
        }
        Ok(())
    }
}

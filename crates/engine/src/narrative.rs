//! Fact sheets for the narrative-summary service, and its OpenAI client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use common::{Bias, Entry, Error, NarrativeClient, Result, ScanRow};
use strategy::avg_monthly_return;

use crate::providers::http_client;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TOKENS: u32 = 400;

/// The facts about one symbol that a summary may draw on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactSheet {
    pub symbol: String,
    pub bias: Option<Bias>,
    pub entry: Entry,
    /// Short-term target (hourly).
    pub target: Option<f64>,
    /// Long-term target (daily).
    pub daily_target: Option<f64>,
    pub projected_annual_return: Option<f64>,
    pub avg_monthly_return: Option<f64>,
}

impl FactSheet {
    pub fn from_row(row: &ScanRow) -> Self {
        Self {
            symbol: row.symbol.clone(),
            bias: row.bias,
            entry: row.entry,
            target: row.target,
            daily_target: row.daily_target,
            projected_annual_return: row.projected_annual_return,
            avg_monthly_return: row.projected_annual_return.map(avg_monthly_return),
        }
    }

    /// Prompt text handed to the narrative service.
    pub fn prompt(&self) -> String {
        let target = |t: Option<f64>| t.map_or("none active".to_string(), |t| format!("{t:.4}"));
        let bias = self.bias.map_or("undetermined".to_string(), |b| b.to_string());

        let mut facts = vec![
            format!("- 45 EMA bias (daily): {bias}"),
            format!("- Entry signal (hourly): {}", self.entry),
            format!("- Long-term Fibonacci target (daily): {}", target(self.daily_target)),
            format!("- Short-term Fibonacci target (hourly): {}", target(self.target)),
        ];
        if let Some(r) = self.projected_annual_return {
            facts.push(format!("- Projected annual return: {:.2}%", r * 100.0));
        }
        if let Some(m) = self.avg_monthly_return {
            facts.push(format!("- Average monthly return: {:.2}%", m * 100.0));
        }

        format!(
            "You are a professional trading assistant providing a structured, concise market summary for {sym}.\n\
             Use only the facts below; write a short numbered list in plain English.\n\n\
             {facts}\n\n\
             Cover the overall trend and sentiment, what the signals imply, and end with a \
             brief explanation of what {sym} is and how it trades.",
            sym = self.symbol,
            facts = facts.join("\n"),
        )
    }
}

// ─── OpenAI client ────────────────────────────────────────────────────────────

pub struct OpenAiClient {
    api_key: String,
    model: String,
    url: String,
    http: Client,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            url: OPENAI_URL.to_string(),
            http: http_client()?,
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl NarrativeClient for OpenAiClient {
    async fn summarize(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": MAX_TOKENS,
        });

        debug!(model = %self.model, "Requesting narrative summary");
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::provider(e.status().map(|s| s.as_u16()), e.without_url().to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimitExceeded);
        }
        let text = resp
            .text()
            .await
            .map_err(|e| Error::provider(None, e.without_url().to_string()))?;
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| Error::MalformedResponse(e.to_string()))?;

        extract_summary(status, parsed)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

fn extract_summary(status: StatusCode, resp: ChatResponse) -> Result<String> {
    if let Some(err) = resp.error {
        return Err(Error::provider(Some(status.as_u16()), err.message));
    }
    if !status.is_success() {
        return Err(Error::provider(Some(status.as_u16()), "narrative service error"));
    }
    resp.choices
        .into_iter()
        .find_map(|c| c.message.content)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::MalformedResponse("summary response had no text".into()))
}

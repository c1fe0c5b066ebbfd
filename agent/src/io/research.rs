//! Research-tool abstraction and the Tavily-backed implementation.
//!
//! Tools return raw, semi-structured payloads; the loop validates them
//! against the findings schema via [`crate::core::findings::parse_findings`]
//! before anything reaches the memory manager. Tests use scripted tools.

use std::time::Duration;

use anyhow::anyhow;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::decision::ToolId;
use crate::core::findings::SearchRequest;
use crate::error::EngineError;
use crate::io::config::EngineConfig;

/// Abstraction over web-research backends.
pub trait ResearchTool {
    /// Execute the search and return the raw findings payload.
    fn search(&self, request: &SearchRequest) -> Result<Value, EngineError>;
}

/// Research tool backed by the Tavily Search API.
pub struct TavilyClient {
    api_key: Option<String>,
    endpoint: String,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: Option<String>,
    content: Option<String>,
    url: Option<String>,
    score: Option<f64>,
}

impl TavilyClient {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let timeout_secs = config.tool_timeout_secs;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| EngineError::Config {
                reason: format!("build http client: {err}"),
            })?;
        Ok(Self {
            api_key: config.research_api_key(),
            endpoint: config.research.endpoint.clone(),
            timeout_secs,
            client,
        })
    }
}

impl ResearchTool for TavilyClient {
    #[instrument(skip_all, fields(query = %request.query))]
    fn search(&self, request: &SearchRequest) -> Result<Value, EngineError> {
        let tool = ToolId::TavilySearch;
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(EngineError::Capability {
                name: tool.as_str().to_string(),
                cause: anyhow!("TAVILY_API_KEY is not configured"),
            });
        };

        info!(endpoint = %self.endpoint, "running web search");
        let body = json!({
            "api_key": api_key,
            "query": request.query,
            "max_results": request.max_results,
            "search_depth": request.search_depth,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    warn!(timeout_secs = self.timeout_secs, "web search timed out");
                    EngineError::ToolTimeout {
                        tool,
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    EngineError::Capability {
                        name: tool.as_str().to_string(),
                        cause: anyhow!(err),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = %status, "web search request rejected");
            return Err(EngineError::Capability {
                name: tool.as_str().to_string(),
                cause: anyhow!("search API returned {status}: {body}"),
            });
        }

        let parsed: TavilyResponse = response.json().map_err(|err| EngineError::ToolOutput {
            tool,
            reason: format!("response body is not valid json: {err}"),
        })?;
        debug!(results = parsed.results.len(), "web search completed");
        Ok(findings_payload(&request.query, &parsed))
    }
}

/// Normalize the provider response into the findings wire shape.
fn findings_payload(query: &str, response: &TavilyResponse) -> Value {
    let items: Vec<Value> = response
        .results
        .iter()
        .map(|result| {
            json!({
                "title": result.title.clone().unwrap_or_default(),
                "url": result.url.clone().unwrap_or_default(),
                "snippet": result.content.clone().unwrap_or_default(),
                "score": result.score,
            })
        })
        .collect();
    json!({ "query": query, "items": items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::findings::parse_findings;

    #[test]
    fn findings_payload_matches_the_findings_schema() {
        let response = TavilyResponse {
            results: vec![
                TavilyResult {
                    title: Some("Guide".to_string()),
                    content: Some("snippet".to_string()),
                    url: Some("https://example.com".to_string()),
                    score: Some(0.7),
                },
                TavilyResult {
                    title: None,
                    content: None,
                    url: None,
                    score: None,
                },
            ],
        };
        let payload = findings_payload("query", &response);
        let findings = parse_findings(ToolId::TavilySearch, &payload).expect("valid");
        assert_eq!(findings.items.len(), 2);
        assert_eq!(findings.items[0].snippet, "snippet");
    }

    #[test]
    fn missing_api_key_is_a_capability_fault() {
        let mut config = EngineConfig::default();
        config.research.api_key = None;
        let client = TavilyClient::new(&config).expect("client");
        // Only exercised when the environment carries no key either.
        if std::env::var("TAVILY_API_KEY").is_ok() {
            return;
        }
        let request = SearchRequest {
            query: "q".to_string(),
            follow_up_questions: Vec::new(),
            max_results: 3,
            search_depth: "basic".to_string(),
        };
        let err = client.search(&request).expect_err("no key");
        assert!(matches!(err, EngineError::Capability { .. }));
    }
}

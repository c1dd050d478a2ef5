//! ENGINE: OpenAI-compatible chat completions

use crate::*;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, trace, warn};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const RETRY_BASE_DELAY_MS: u64 = 250;
const RETRY_MAX_DELAY_MS: u64 = 8_000;

/// Backoff before retry `attempt + 1`: doubling from the base, capped
fn retry_delay(attempt: u32) -> Duration {
    let ms = RETRY_BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(ms.min(RETRY_MAX_DELAY_MS))
}

/// Client for `/chat/completions` on OpenAI-compatible endpoints
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_base = api_base
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base,
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }

    /// Per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retries for transient failures, on top of the first attempt
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| {
                let mut obj = json!({ "role": &m.role });
                if let Some(content) = &m.content {
                    obj["content"] = json!(content);
                }
                if let Some(tool_calls) = &m.tool_calls {
                    // the wire format wants arguments as a JSON-encoded string
                    let calls: Vec<serde_json::Value> = tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": &c.id,
                                "type": &c.call_type,
                                "function": {
                                    "name": &c.function.name,
                                    "arguments": c.function.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    obj["tool_calls"] = json!(calls);
                }
                if let Some(tool_call_id) = &m.tool_call_id {
                    obj["tool_call_id"] = json!(tool_call_id);
                }
                if let Some(name) = &m.name {
                    obj["name"] = json!(name);
                }
                obj
            })
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        if !params.tools.is_empty() {
            body["tools"] = json!(params.tools);
            body["tool_choice"] = match &params.tool_choice {
                ToolChoice::Auto => json!("auto"),
                ToolChoice::Required(name) => {
                    json!({"type": "function", "function": {"name": name}})
                }
                ToolChoice::None => json!("none"),
            };
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let message = &choice["message"];
        let content = message["content"].as_str().map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let function = &call["function"];
                let arguments = function["arguments"]
                    .as_str()
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_else(|| function["arguments"].clone());

                tool_calls.push(ToolCall {
                    id: call["id"].as_str().unwrap_or("").to_string(),
                    name: function["name"].as_str().unwrap_or("").to_string(),
                    arguments,
                });
            }
        }

        let usage = json
            .get("usage")
            .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok())
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }

        let json: serde_json::Value = response.json().await.map_err(|e| self.map_transport(e))?;

        if !status.is_success() {
            let message = json["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        self.parse_response(json)
    }

    fn map_transport(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout.as_secs())
        } else {
            ProviderError::Request(e)
        }
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if !self.is_configured() {
            return Err(ProviderError::NoApiKey);
        }

        trace!("◆ MODEL REQUEST TO {}", self.api_base);
        let body = self.build_request(&params);

        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(response) => {
                    debug!(
                        "◆ MODEL RESPONSE: {} TOOL CALLS, {} TOKENS",
                        response.tool_calls.len(),
                        response.usage.total_tokens
                    );
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = retry_delay(attempt);
                    warn!(
                        "◆ MODEL CALL FAILED ({}), RETRY {}/{} IN {:?}",
                        e,
                        attempt + 1,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retry_delay_doubles_then_caps() {
        assert_eq!(retry_delay(0), Duration::from_millis(250));
        assert_eq!(retry_delay(1), Duration::from_millis(500));
        assert_eq!(retry_delay(5), Duration::from_millis(8_000));
        assert_eq!(retry_delay(19), Duration::from_millis(8_000));
        assert_eq!(retry_delay(200), Duration::from_millis(8_000));
    }

    #[test]
    fn test_new_uses_openai_defaults() {
        let provider = OpenAiProvider::new("sk-test", None, None);
        assert_eq!(provider.api_base, "https://api.openai.com/v1");
        assert_eq!(provider.default_model(), "gpt-3.5-turbo");
        assert!(provider.is_configured());
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let provider =
            OpenAiProvider::new("k", Some("http://localhost:8000/v1/".to_string()), None);
        assert_eq!(provider.api_base, "http://localhost:8000/v1");
    }

    #[test]
    fn test_is_configured_false_without_key() {
        assert!(!OpenAiProvider::new("", None, None).is_configured());
    }

    #[test]
    fn test_build_request_fills_default_model() {
        let provider = OpenAiProvider::new("k", None, Some("gpt-4o".to_string()));
        let request = provider.build_request(&ChatParams {
            messages: vec![Message::user("Hello")],
            ..Default::default()
        });
        assert_eq!(request["model"], "gpt-4o");
        assert!(request.get("tools").is_none());
        assert_eq!(request["messages"][0]["content"], "Hello");
    }

    #[test]
    fn test_build_request_with_tools_and_choice() {
        let provider = OpenAiProvider::new("k", None, None);
        let params = ChatParams {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("Price?")],
            tools: vec![Tool::new("web_search", "Search", json!({"type": "object"}))],
            tool_choice: ToolChoice::Required("web_search".to_string()),
            ..Default::default()
        };

        let request = provider.build_request(&params);
        assert_eq!(request["tools"][0]["type"], "function");
        assert_eq!(request["tools"][0]["function"]["name"], "web_search");
        assert_eq!(request["tool_choice"]["function"]["name"], "web_search");
    }

    #[test]
    fn test_build_request_encodes_tool_call_arguments_as_string() {
        let provider = OpenAiProvider::new("k", None, None);
        let mut msg = Message::assistant("");
        msg.tool_calls = Some(vec![ToolCallDef::new(
            "call_1",
            "web_scrape",
            json!({"url": "https://example.com"}),
        )]);

        let request = provider.build_request(&ChatParams {
            messages: vec![msg],
            ..Default::default()
        });
        let args = &request["messages"][0]["tool_calls"][0]["function"]["arguments"];
        assert!(args.is_string());
        assert!(args.as_str().unwrap().contains("example.com"));
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let provider = OpenAiProvider::new("k", None, None);
        let response = provider
            .parse_response(json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call_123",
                            "type": "function",
                            "function": {
                                "name": "web_search",
                                "arguments": "{\"query\": \"camry msrp\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 20, "completion_tokens": 15, "total_tokens": 35}
            }))
            .unwrap();

        assert!(response.content.is_none());
        assert_eq!(response.tool_calls[0].name, "web_search");
        assert_eq!(response.tool_calls[0].arguments["query"], "camry msrp");
        assert_eq!(response.usage.total_tokens, 35);
    }

    #[test]
    fn test_parse_response_missing_usage_defaults() {
        let provider = OpenAiProvider::new("k", None, None);
        let response = provider
            .parse_response(json!({
                "choices": [{"message": {"content": "Hi"}, "finish_reason": "stop"}]
            }))
            .unwrap();
        assert_eq!(response.content.as_deref(), Some("Hi"));
        assert_eq!(response.usage.total_tokens, 0);
    }

    #[test]
    fn test_parse_response_empty_choices() {
        let provider = OpenAiProvider::new("k", None, None);
        let result = provider.parse_response(json!({"choices": []}));
        assert!(matches!(result, Err(ProviderError::InvalidResponse)));
    }

    #[tokio::test]
    async fn test_chat_without_key_fails_fast() {
        let provider = OpenAiProvider::new("", None, None);
        let result = provider.chat(ChatParams::default()).await;
        assert!(matches!(result, Err(ProviderError::NoApiKey)));
    }
}

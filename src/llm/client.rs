//! HTTP client for OpenAI-compatible services (OpenAI, Ollama, vLLM).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, Embedder, Generator, LlmError, ResponseSchema};
use crate::config::ServiceConfig;
use crate::utils::USER_AGENT;

/// Client for one OpenAI-compatible endpoint
///
/// Implements [`Generator`] over `/v1/chat/completions` and [`Embedder`]
/// over `/v1/embeddings`, using the model named in its [`ServiceConfig`].
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    http_client: reqwest::Client,
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
}

impl OpenAiCompatClient {
    /// Create a client from a service configuration
    pub fn new(config: &ServiceConfig) -> Result<Self, LlmError> {
        let base_url = config.base_url.trim().trim_end_matches('/');
        let base_url = base_url.strip_suffix("/v1").unwrap_or(base_url);
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LlmError::Config(format!(
                "{}: base_url must be an http(s) URL, got '{}'",
                config.name, config.base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http_client,
            name: config.name.clone(),
            base_url: base_url.to_string(),
            model: config.model.clone(),
            api_key: config.resolved_api_key(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/v1/{}", self.base_url, path);
        let req = self.http_client.post(url);
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(LlmError::Service {
            service: self.name.clone(),
            status: status.as_u16(),
            message: body.chars().take(500).collect(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Generator for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            response_format: schema.map(|s| {
                serde_json::json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": s.name,
                        "schema": s.schema,
                        "strict": true
                    }
                })
            }),
        };

        tracing::debug!("Chat completion via {} ({})", self.name, self.model);
        let response = self.post("chat/completions").json(&request).send().await?;
        let response = self.check(response).await?;

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse chat response: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyResponse(self.name.clone()))
    }
}

#[async_trait]
impl Embedder for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        tracing::debug!("Embedding {} texts via {} ({})", texts.len(), self.name, self.model);
        let response = self.post("embeddings").json(&request).send().await?;
        let response = self.check(response).await?;

        let mut data: EmbedResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse embedding response: {}", e)))?;

        if data.data.len() != texts.len() {
            return Err(LlmError::Parse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.data.len()
            )));
        }

        data.data.sort_by_key(|d| d.index);
        Ok(data.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn service(url: &str, temperature: Option<f32>) -> ServiceConfig {
        ServiceConfig {
            name: "local".to_string(),
            base_url: format!("{}/v1/", url),
            model: "test-model".to_string(),
            api_key: Some("sk-test".to_string()),
            timeout_secs: 5,
            temperature,
        }
    }

    #[tokio::test]
    async fn test_generate_sends_schema() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "test-model",
                "temperature": 0.5,
                "response_format": {"type": "json_schema", "json_schema": {"name": "draft"}}
            })))
            .with_status(200)
            .with_body(json!({"choices": [{"message": {"role": "assistant", "content": "{\"ok\":true}"}}]}).to_string())
            .create_async()
            .await;

        let client = OpenAiCompatClient::new(&service(&server.url(), Some(0.5))).unwrap();
        let schema = ResponseSchema::new("draft", json!({"type": "object"}));
        let reply = client
            .generate(&[ChatMessage::user("hi")], Some(&schema))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply, "{\"ok\":true}");
    }

    #[test]
    fn test_unset_temperature_is_omitted() {
        let messages = [ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "gpt-5",
            messages: &messages,
            temperature: None,
            response_format: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("temperature").is_none());
        assert!(value.get("response_format").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_generate_service_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = OpenAiCompatClient::new(&service(&server.url(), None)).unwrap();
        let err = client.generate(&[ChatMessage::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, LlmError::Service { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_generate_empty_content() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(json!({"choices": [{"message": {"content": null}}]}).to_string())
            .create_async()
            .await;

        let client = OpenAiCompatClient::new(&service(&server.url(), None)).unwrap();
        let err = client.generate(&[ChatMessage::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse(name) if name == "local"));
    }

    #[tokio::test]
    async fn test_embed_orders_by_index() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(
                json!({"data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let client = OpenAiCompatClient::new(&service(&server.url(), None)).unwrap();
        let vectors = client
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_count_mismatch() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(json!({"data": [{"index": 0, "embedding": [1.0]}]}).to_string())
            .create_async()
            .await;

        let client = OpenAiCompatClient::new(&service(&server.url(), None)).unwrap();
        let err = client
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut config = ServiceConfig::default_primary();
        config.base_url = "localhost:11434".to_string();
        assert!(matches!(
            OpenAiCompatClient::new(&config),
            Err(LlmError::Config(_))
        ));
    }
}

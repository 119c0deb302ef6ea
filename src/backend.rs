use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::error::ChatError;

/// The assistant the widget talks to. It receives one prompt and answers
/// with plain text; everything behind it is opaque.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<String, ChatError>;

    /// Banner shown at startup to confirm the assistant is reachable
    async fn status(&self) -> Result<String, ChatError>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: Url,
    prompt_field: String,
}

impl HttpBackend {
    pub fn new(endpoint: &str, prompt_field: &str) -> Result<Self, ChatError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ChatError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

        Ok(Self {
            client: Client::new(),
            endpoint,
            prompt_field: prompt_field.to_string(),
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn ask(&self, prompt: &str) -> Result<String, ChatError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&[(self.prompt_field.as_str(), prompt)])
            .send()
            .await
            .map_err(ChatError::Transport)?;

        if !response.status().is_success() {
            return Err(ChatError::Status(response.status().as_u16()));
        }

        response.text().await.map_err(ChatError::Body)
    }

    async fn status(&self) -> Result<String, ChatError> {
        let url = self
            .endpoint
            .join("/")
            .map_err(|e| ChatError::InvalidEndpoint(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ChatError::Transport)?;

        if !response.status().is_success() {
            return Err(ChatError::Status(response.status().as_u16()));
        }

        response.text().await.map_err(ChatError::Body)
    }
}

//! Chat transports: how a request reaches the assistant and how its event
//! stream comes back.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use propal_types::{ChatRequest, StreamEvent};
use thiserror::Error;

use crate::sse;

pub type EventStream = BoxStream<'static, Result<StreamEvent, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Stream read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed stream event: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Submit a request and return the response's event stream.
    async fn send(&self, request: ChatRequest) -> Result<EventStream, TransportError>;
}

/// `POST {base_url}/chat`, decoding the SSE response.
pub struct HttpChatTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatTransport {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(&self, request: ChatRequest) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(sse::response_payloads(response)
            .map(|payload| -> Result<StreamEvent, TransportError> {
                Ok(serde_json::from_str(&payload?)?)
            })
            .boxed())
    }
}

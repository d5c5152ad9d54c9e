//! HTTP client abstraction
//!
//! All provider traffic goes through this trait so tests can substitute
//! canned responses or inject faults. Never use reqwest directly in
//! provider logic.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;
use std::collections::HashMap;
use std::pin::Pin;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn json<T: serde::Serialize>(mut self, body: &T) -> Result<Self, String> {
        let json =
            serde_json::to_vec(body).map_err(|e| format!("JSON serialization failed: {}", e))?;
        self.body = Some(json);
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Result<String, String> {
        String::from_utf8(self.body.clone()).map_err(|e| format!("Invalid UTF-8: {}", e))
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_slice(&self.body)
            .map_err(|e| format!("JSON deserialization failed: {}", e))
    }
}

/// Byte stream returned by streaming requests
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>;

/// HTTP client trait
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a request and collect the full response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;

    /// Send a request and stream the response body (SSE)
    async fn send_streaming(&self, request: HttpRequest) -> Result<ByteStream, String>;
}

/// Production HTTP client backed by reqwest
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(
        &self,
        request: HttpRequest,
    ) -> reqwest::RequestBuilder {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (key, value) in request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let response = self
            .build(request)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("Failed to read response body: {}", e))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }

    async fn send_streaming(&self, request: HttpRequest) -> Result<ByteStream, String> {
        let response = self
            .build(request)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("API error {}: {}", status, body));
        }

        let stream = futures::StreamExt::map(response.bytes_stream(), |result| {
            result.map_err(|e| format!("Stream error: {}", e))
        });
        Ok(Box::pin(stream))
    }
}

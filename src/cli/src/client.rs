//! HTTP client for communicating with the Taxaformer API server.

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// API response wrapper matching the server's ApiResponse format.
#[derive(Debug, serde::Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// HTTP client for the Taxaformer API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the `data` field of the envelope.
    ///
    /// Error bodies use a different shape, so the server message is pulled
    /// from `error.message` when present.
    async fn send<T: DeserializeOwned>(&self, method: &str, url: String, request: RequestBuilder) -> Result<Option<T>> {
        let resp = request
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        let api_resp: ApiResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))?;

        if api_resp.success {
            Ok(api_resp.data)
        } else {
            Err(anyhow::anyhow!(
                "API error: {}",
                api_resp.error.unwrap_or_else(|| "Unknown error".into())
            ))
        }
    }

    fn require<T>(data: Option<T>) -> Result<T> {
        data.ok_or_else(|| anyhow::anyhow!("API returned success but no data"))
    }

    /// Perform a GET request and deserialize the response data.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let data = self.send("GET", url.clone(), self.client.get(&url)).await?;
        Self::require(data)
    }

    /// Perform a POST request with a JSON body and deserialize the response.
    /// A `null` data field is returned as `None`.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        let url = self.url(path);
        self.send("POST", url.clone(), self.client.post(&url).json(body))
            .await
    }

    /// Perform a GET request with query parameters.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(path);
        let data = self
            .send("GET", url.clone(), self.client.get(&url).query(query))
            .await?;
        Self::require(data)
    }

    /// Perform a DELETE request with query parameters and deserialize the response.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(path);
        let data = self
            .send("DELETE", url.clone(), self.client.delete(&url).query(query))
            .await?;
        Self::require(data)
    }

    /// Upload a file as multipart form data.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        filename: &str,
        bytes: Vec<u8>,
        session_id: &str,
        metadata: Option<String>,
    ) -> Result<T> {
        let url = self.url(path);
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let mut form = Form::new()
            .text("session_id", session_id.to_string())
            .part("file", part);
        if let Some(metadata) = metadata {
            form = form.text("metadata", metadata);
        }

        let data = self
            .send("POST", url.clone(), self.client.post(&url).multipart(form))
            .await?;
        Self::require(data)
    }

    /// Perform a GET request and return the body as text.
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("API error ({})", status);
        }
        resp.text()
            .await
            .with_context(|| format!("Failed to read response from {}", url))
    }

    /// Perform a raw GET request and return the full JSON value (for health endpoint).
    pub async fn get_raw(&self, path: &str) -> Result<serde_json::Value> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

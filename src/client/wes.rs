//! HTTP client for GA4GH WES endpoints.
//!
//! Wraps `POST /runs` and `GET /runs/{run_id}/status` using [`reqwest`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use wes_protocol::{ErrorResponse, RunId, RunRequest, RunState, RunStatus};

use super::{ClientError, ExecutionClient};
use crate::config::EndpointConfig;

/// HTTP client for a single WES endpoint.
pub struct WesClient {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl WesClient {
    /// Create a client for a WES API base URL, e.g.
    /// `http://localhost:8080/ga4gh/wes/v1`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth: None,
        }
    }

    /// Client for a configured endpoint.
    pub fn for_endpoint(client: reqwest::Client, endpoint: &EndpointConfig) -> Self {
        let mut wes = Self::with_client(client, endpoint.base_url());
        wes.auth = endpoint.auth.clone();
        wes
    }

    /// Send `value` as the `Authorization` header on every request.
    pub fn with_auth(mut self, value: impl Into<String>) -> Self {
        self.auth = Some(value.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(value) => request.header(reqwest::header::AUTHORIZATION, value),
            None => request,
        }
    }

    async fn build_form(request: &RunRequest) -> Result<Form, ClientError> {
        let tags = serde_json::Value::Object(request.tags.clone()).to_string();
        let mut form = Form::new()
            .text("workflow_url", request.workflow_url.clone())
            .text("workflow_type", request.workflow_type.clone())
            .text("workflow_type_version", request.workflow_type_version.clone())
            .text("workflow_params", request.params_text())
            .text("tags", tags);

        for attachment in &request.attachments {
            let part = match local_path(attachment) {
                Some(path) => {
                    let bytes = tokio::fs::read(&path).await.map_err(|source| {
                        ClientError::Attachment {
                            path: attachment.clone(),
                            source,
                        }
                    })?;
                    Part::bytes(bytes).file_name(file_name(&path))
                }
                None => Part::text(attachment.clone()),
            };
            form = form.part("workflow_attachment", part);
        }

        Ok(form)
    }

    /// Read the body of a response, mapping non-2xx codes to [`ClientError::Api`].
    async fn read_body(response: reqwest::Response) -> Result<String, ClientError> {
        let status = response.status();
        let body = response.text().await.map_err(map_request_error)?;
        if !status.is_success() {
            let error = ErrorResponse::from_body(status.as_u16(), &body);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error.msg,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ExecutionClient for WesClient {
    async fn start_run(&self, request: &RunRequest) -> Result<String, ClientError> {
        let form = Self::build_form(request).await?;
        let response = self
            .authorize(self.client.post(format!("{}/runs", self.base_url)))
            .multipart(form)
            .send()
            .await
            .map_err(map_request_error)?;

        let body = Self::read_body(response).await?;
        let run = RunId::decode(&body).map_err(|e| ClientError::Protocol(e.to_string()))?;
        Ok(run.run_id)
    }

    async fn run_status(&self, run_id: &str) -> Result<RunState, ClientError> {
        let response = self
            .authorize(
                self.client
                    .get(format!("{}/runs/{}/status", self.base_url, run_id)),
            )
            .send()
            .await
            .map_err(map_request_error)?;

        let body = Self::read_body(response).await?;
        let status = RunStatus::decode(&body).map_err(|e| ClientError::Protocol(e.to_string()))?;
        Ok(status.state)
    }
}

/// Network-level failures are transient; anything else is a protocol error.
fn map_request_error(error: reqwest::Error) -> ClientError {
    if error.is_connect() || error.is_timeout() || error.is_request() || error.is_body() {
        ClientError::Unreachable(error.to_string())
    } else {
        ClientError::Protocol(error.to_string())
    }
}

/// Local path of a `file://` reference.
fn local_path(reference: &str) -> Option<PathBuf> {
    reference
        .strip_prefix("file://")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

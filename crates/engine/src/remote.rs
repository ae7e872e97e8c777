use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use checklist_core::{AnswerPatch, ChecklistId};

use crate::config::RemoteConfig;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("remote unavailable: {0}")]
    Unavailable(String),
}

/// The checklist backend.
#[async_trait]
pub trait ChecklistRemote: Send + Sync {
    /// Raw checklist JSON, already unwrapped from any response envelope.
    async fn fetch_checklist(&self, checklist_id: &ChecklistId) -> Result<Value, RemoteError>;

    /// Send one answer patch. Only the status is checked.
    async fn post_answers(
        &self,
        checklist_id: &ChecklistId,
        patch: &AnswerPatch,
    ) -> Result<(), RemoteError>;
}

/// `GET`/`POST {base_url}/checklist/{id}` over HTTP.
pub struct HttpRemote {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(15)))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            client,
        })
    }

    fn url(&self, checklist_id: &ChecklistId) -> String {
        format!("{}/checklist/{}", self.base_url, checklist_id)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_connect() || error.is_timeout() {
        RemoteError::Unavailable(error.to_string())
    } else {
        RemoteError::Http(error.to_string())
    }
}

/// Some deployments wrap the payload in `{"data": ...}`.
fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut obj) if obj.contains_key("data") && !obj.contains_key("zones") => {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[async_trait]
impl ChecklistRemote for HttpRemote {
    async fn fetch_checklist(&self, checklist_id: &ChecklistId) -> Result<Value, RemoteError> {
        let response = self
            .authorized(self.client.get(self.url(checklist_id)))
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(unwrap_envelope(body))
    }

    async fn post_answers(
        &self,
        checklist_id: &ChecklistId,
        patch: &AnswerPatch,
    ) -> Result<(), RemoteError> {
        let response = self
            .authorized(self.client.post(self.url(checklist_id)))
            .json(patch)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        Ok(())
    }
}

//! HTTP client for the gate backend: form autosave, task CRUD and habit
//! toggles. Every mutating request carries the anti-forgery token when one is
//! configured.

use crate::autosave::{FormSnapshot, Persist, PersistError, SaveOutcome};
use crate::config::{ApiConfig, ConfigError, Endpoint};
use crate::models::{HabitToggle, TaskDraft, TaskEnvelope, TaskToggle};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;
use tracing::{debug, error, warn};

pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response status {0}")]
    Status(StatusCode),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("request rejected: {errors}")]
    Rejected { errors: Value },
}

impl From<ClientError> for PersistError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Config(err) => PersistError::Config(err.to_string()),
            ClientError::Transport(err) => PersistError::Offline(err.to_string()),
            ClientError::Rejected { errors } => PersistError::Rejected(errors),
            ClientError::Status(status) => {
                PersistError::Rejected(Value::String(format!("status {status}")))
            }
            ClientError::Decode(message) => PersistError::Rejected(Value::String(message)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateClient {
    http: Client,
    config: ApiConfig,
}

impl GateClient {
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(concat!("gate_web/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Submits the whole form. Identifiers assigned to new rows come back in
    /// `new_ids`.
    pub async fn autosave(&self, snapshot: &FormSnapshot) -> Result<SaveOutcome, ClientError> {
        let url = self.config.url(Endpoint::Autosave, &[])?;
        let body = self.send(self.post(&url).form(snapshot)).await?;
        let new_ids = match body.get("new_ids") {
            Some(ids) => serde_json::from_value::<BTreeMap<String, i64>>(ids.clone())
                .map_err(|err| ClientError::Decode(err.to_string()))?,
            None => BTreeMap::new(),
        };
        Ok(SaveOutcome { new_ids })
    }

    pub async fn create_task(&self, draft: &TaskDraft) -> Result<TaskEnvelope, ClientError> {
        let url = self.config.url(Endpoint::TaskCreate, &[])?;
        decode(self.send(self.post(&url).form(draft)).await?)
    }

    pub async fn task(&self, id: i64) -> Result<TaskEnvelope, ClientError> {
        let url = self.config.url(Endpoint::TaskDetail, &[("id", id.to_string())])?;
        decode(self.send(self.http.get(&url)).await?)
    }

    pub async fn update_task(&self, id: i64, draft: &TaskDraft) -> Result<TaskEnvelope, ClientError> {
        let url = self.config.url(Endpoint::TaskUpdate, &[("id", id.to_string())])?;
        decode(self.send(self.post(&url).form(draft)).await?)
    }

    pub async fn archive_task(&self, id: i64) -> Result<(), ClientError> {
        let url = self.config.url(Endpoint::TaskArchive, &[("id", id.to_string())])?;
        self.send(self.post(&url)).await?;
        Ok(())
    }

    /// Toggles today's completion of a task. The reply carries `added` or
    /// `removed` in `status` rather than the usual envelope.
    pub async fn toggle_task(&self, id: i64) -> Result<TaskToggle, ClientError> {
        let url = self.config.url(Endpoint::TaskToggle, &[("id", id.to_string())])?;
        decode(self.send_toggle(self.post(&url)).await?)
    }

    pub async fn toggle_habit(&self, id: i64, date: NaiveDate) -> Result<HabitToggle, ClientError> {
        let url = self.config.url(
            Endpoint::HabitToggle,
            &[("id", id.to_string()), ("date", date.format("%Y-%m-%d").to_string())],
        )?;
        decode(self.send_toggle(self.post(&url)).await?)
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let request = self.http.post(url);
        match &self.config.csrf_token {
            Some(token) => request.header(CSRF_HEADER, token),
            None => request,
        }
    }

    /// Sends the request and unwraps the `{"status": ...}` envelope.
    async fn send(&self, request: RequestBuilder) -> Result<Value, ClientError> {
        let response = request.send().await.map_err(|err| {
            error!("gate backend unreachable: {err}");
            ClientError::Transport(err)
        })?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let body: Value = match serde_json::from_slice(&bytes) {
            Ok(body) => body,
            Err(_) if !status.is_success() => return Err(ClientError::Status(status)),
            Err(err) => return Err(ClientError::Decode(err.to_string())),
        };

        let accepted = body.get("status").and_then(Value::as_str) == Some("success");
        if accepted {
            debug!("gate backend accepted request ({status})");
            return Ok(body);
        }

        let errors = body.get("errors").cloned().unwrap_or(body);
        warn!("gate backend rejected request ({status}): {errors}");
        Err(ClientError::Rejected { errors })
    }

    /// Toggle replies skip the envelope and report failure in an `error` field.
    async fn send_toggle(&self, request: RequestBuilder) -> Result<Value, ClientError> {
        let response = request.send().await.map_err(|err| {
            error!("gate backend unreachable: {err}");
            ClientError::Transport(err)
        })?;
        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => return Err(ClientError::Status(status)),
            Err(err) => return Err(ClientError::Decode(err.to_string())),
        };

        if let Some(errors) = body.get("error") {
            warn!("toggle rejected ({status}): {errors}");
            return Err(ClientError::Rejected {
                errors: errors.clone(),
            });
        }
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }
        Ok(body)
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ClientError> {
    serde_json::from_value(body).map_err(|err| ClientError::Decode(err.to_string()))
}

#[async_trait]
impl Persist for GateClient {
    async fn submit(&self, snapshot: &FormSnapshot) -> Result<SaveOutcome, PersistError> {
        self.autosave(snapshot).await.map_err(PersistError::from)
    }
}

use crate::autosave::{AutosaveCoordinator, DEFAULT_DEBOUNCE, FormSnapshot, StatusSink};
use crate::client::{ClientError, GateClient};
use std::{collections::BTreeMap, env, time::Duration};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
pub const DEFAULT_STATS: [&str; 5] = ["STR", "INT", "CHA", "WIL", "WIS"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    #[error("invalid autosave debounce '{0}', expected milliseconds")]
    InvalidDebounce(String),
    #[error("no url configured for endpoint '{0}'")]
    MissingEndpoint(&'static str),
}

/// Backend routes the client talks to. Paths may contain `{id}` and `{date}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    Autosave,
    TaskCreate,
    TaskDetail,
    TaskUpdate,
    TaskArchive,
    TaskToggle,
    HabitToggle,
}

impl Endpoint {
    pub const ALL: [Endpoint; 7] = [
        Endpoint::Autosave,
        Endpoint::TaskCreate,
        Endpoint::TaskDetail,
        Endpoint::TaskUpdate,
        Endpoint::TaskArchive,
        Endpoint::TaskToggle,
        Endpoint::HabitToggle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Autosave => "autosave",
            Endpoint::TaskCreate => "task_create",
            Endpoint::TaskDetail => "task_detail",
            Endpoint::TaskUpdate => "task_update",
            Endpoint::TaskArchive => "task_archive",
            Endpoint::TaskToggle => "task_toggle",
            Endpoint::HabitToggle => "habit_toggle",
        }
    }

    pub fn default_path(self) -> &'static str {
        match self {
            Endpoint::Autosave => "/gate/autosave/",
            Endpoint::TaskCreate => "/gate/tasks/create/",
            Endpoint::TaskDetail => "/gate/tasks/{id}/",
            Endpoint::TaskUpdate => "/gate/tasks/{id}/update/",
            Endpoint::TaskArchive => "/gate/tasks/{id}/archive/",
            Endpoint::TaskToggle => "/gate/tasks/{id}/toggle/",
            Endpoint::HabitToggle => "/habit/toggle/{id}/{date}/",
        }
    }

    fn env_key(self) -> String {
        format!("GATE_ENDPOINT_{}", self.name().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub csrf_token: Option<String>,
    pub endpoints: BTreeMap<Endpoint, String>,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            csrf_token: None,
            endpoints: Endpoint::ALL
                .into_iter()
                .map(|endpoint| (endpoint, endpoint.default_path().to_string()))
                .collect(),
        }
    }

    /// Resolves an endpoint to an absolute url, filling `{name}` placeholders.
    pub fn url(&self, endpoint: Endpoint, params: &[(&str, String)]) -> Result<String, ConfigError> {
        let path = self
            .endpoints
            .get(&endpoint)
            .map(|path| path.trim())
            .filter(|path| !path.is_empty())
            .ok_or(ConfigError::MissingEndpoint(endpoint.name()))?;

        let mut path = path.to_string();
        for (name, value) in params {
            path = path.replace(&format!("{{{name}}}"), value);
        }

        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path);
        }
        Ok(format!("{}{}", self.base_url.trim_end_matches('/'), path))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub log_level: String,
    pub stats: Vec<String>,
    pub autosave_debounce: Duration,
    pub api: ApiConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(value))?,
            None => DEFAULT_PORT,
        };

        let autosave_debounce = match lookup("GATE_AUTOSAVE_DEBOUNCE_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidDebounce(value))?,
            None => DEFAULT_DEBOUNCE,
        };

        let stats = lookup("GATE_STATS")
            .map(|value| {
                value
                    .split(',')
                    .map(|code| code.trim().to_ascii_uppercase())
                    .filter(|code| !code.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|codes| !codes.is_empty())
            .unwrap_or_else(|| DEFAULT_STATS.iter().map(|code| code.to_string()).collect());

        let mut api = ApiConfig::new(
            lookup("GATE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        );
        api.csrf_token = lookup("GATE_CSRF_TOKEN").filter(|token| !token.trim().is_empty());
        for endpoint in Endpoint::ALL {
            if let Some(path) = lookup(&endpoint.env_key()) {
                api.endpoints.insert(endpoint, path);
            }
        }

        Ok(Self {
            port,
            log_level: lookup("GATE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            stats,
            autosave_debounce,
            api,
        })
    }

    /// Coordinator that saves `form` through the configured backend with the
    /// configured quiet period.
    pub fn autosave_coordinator<S: StatusSink>(
        &self,
        sink: S,
        form: FormSnapshot,
    ) -> Result<AutosaveCoordinator<GateClient, S>, ClientError> {
        let client = GateClient::new(self.api.clone())?;
        Ok(AutosaveCoordinator::with_debounce(
            client,
            sink,
            form,
            self.autosave_debounce,
        ))
    }
}

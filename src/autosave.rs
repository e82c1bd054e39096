//! Single-flight autosave for one form.
//!
//! At most one persist call is outstanding per coordinator. Requests that
//! arrive while a save is in flight fold into one queued retry that submits
//! the form as it is when the retry launches, reporting to the most recently
//! recorded status target.

use async_trait::async_trait;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};
use tracing::{debug, error, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);
pub const STATUS_CLEAR_DELAY: Duration = Duration::from_millis(2000);

/// Whole-form submission: field name to value.
pub type FormSnapshot = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusTarget(pub String);

impl StatusTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn global() -> Self {
        Self("global-save-status".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saving,
    Saved,
    Error(String),
    Offline,
    Cleared,
}

pub trait StatusSink: Send + Sync + 'static {
    fn report(&self, target: &StatusTarget, status: SaveStatus);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    pub new_ids: BTreeMap<String, i64>,
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("backend unreachable: {0}")]
    Offline(String),
    #[error("save rejected: {0}")]
    Rejected(serde_json::Value),
    #[error("autosave misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait Persist: Send + Sync + 'static {
    async fn submit(&self, snapshot: &FormSnapshot) -> Result<SaveOutcome, PersistError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text; saved after the debounce quiet period.
    Text,
    /// Toggles, selects and time pickers; saved immediately.
    Discrete,
}

impl FieldKind {
    pub fn from_input_type(input_type: &str) -> Self {
        match input_type {
            "radio" | "checkbox" | "select-one" | "time" => FieldKind::Discrete,
            _ => FieldKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub name: String,
    pub value: String,
    pub kind: FieldKind,
    pub target: StatusTarget,
}

impl FieldChange {
    pub fn text(name: impl Into<String>, value: impl Into<String>, target: StatusTarget) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: FieldKind::Text,
            target,
        }
    }

    pub fn discrete(
        name: impl Into<String>,
        value: impl Into<String>,
        target: StatusTarget,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: FieldKind::Discrete,
            target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    SavingWithPendingRetry { target: StatusTarget },
}

impl SaveState {
    /// Records a save request. Returns the target to launch a save for, or
    /// `None` when the request was folded into the pending retry.
    pub fn request(&mut self, target: StatusTarget) -> Option<StatusTarget> {
        match *self {
            SaveState::Idle => {
                *self = SaveState::Saving;
                Some(target)
            }
            SaveState::Saving | SaveState::SavingWithPendingRetry { .. } => {
                *self = SaveState::SavingWithPendingRetry { target };
                None
            }
        }
    }

    /// Records completion of the in-flight save. Returns the target of the
    /// queued retry, which is now in flight.
    pub fn complete(&mut self) -> Option<StatusTarget> {
        match std::mem::take(self) {
            SaveState::SavingWithPendingRetry { target } => {
                *self = SaveState::Saving;
                Some(target)
            }
            SaveState::Saving | SaveState::Idle => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SaveState::Idle)
    }
}

struct DebounceTimer {
    handle: JoinHandle<()>,
    target: StatusTarget,
}

struct Inner<P, S> {
    persist: P,
    sink: S,
    debounce: Duration,
    form: Mutex<FormSnapshot>,
    state: watch::Sender<SaveState>,
    debounce_timer: Mutex<Option<DebounceTimer>>,
    /// Bumped on every status reported to a target; a delayed clear only
    /// applies while its generation is current.
    status_generations: Mutex<HashMap<StatusTarget, u64>>,
}

impl<P, S: StatusSink> Inner<P, S> {
    async fn report(&self, target: &StatusTarget, status: SaveStatus) -> u64 {
        let generation = {
            let mut generations = self.status_generations.lock().await;
            let generation = generations.entry(target.clone()).or_default();
            *generation += 1;
            *generation
        };
        self.sink.report(target, status);
        generation
    }
}

pub struct AutosaveCoordinator<P, S> {
    inner: Arc<Inner<P, S>>,
}

impl<P, S> Clone for AutosaveCoordinator<P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Persist, S: StatusSink> AutosaveCoordinator<P, S> {
    pub fn new(persist: P, sink: S, form: FormSnapshot) -> Self {
        Self::with_debounce(persist, sink, form, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(persist: P, sink: S, form: FormSnapshot, debounce: Duration) -> Self {
        let (state, _) = watch::channel(SaveState::Idle);
        Self {
            inner: Arc::new(Inner {
                persist,
                sink,
                debounce,
                form: Mutex::new(form),
                state,
                debounce_timer: Mutex::new(None),
                status_generations: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn state(&self) -> SaveState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.inner.state.subscribe()
    }

    pub async fn snapshot(&self) -> FormSnapshot {
        self.inner.form.lock().await.clone()
    }

    /// Resolves once no save is in flight or queued.
    pub async fn wait_idle(&self) {
        let mut state = self.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = state.wait_for(SaveState::is_idle).await;
    }

    pub async fn field_changed(&self, change: FieldChange) {
        self.inner
            .form
            .lock()
            .await
            .insert(change.name, change.value);

        match change.kind {
            FieldKind::Text => self.schedule_debounced(change.target).await,
            FieldKind::Discrete => {
                self.request_save(change.target);
                self.restart_pending_debounce().await;
            }
        }
    }

    async fn schedule_debounced(&self, target: StatusTarget) {
        let mut pending = self.inner.debounce_timer.lock().await;
        if let Some(previous) = pending.take() {
            previous.handle.abort();
        }
        *pending = Some(self.spawn_debounce(target));
    }

    /// Any edit counts against the quiet period, so a discrete change pushes
    /// back a text save that is still waiting.
    async fn restart_pending_debounce(&self) {
        let mut pending = self.inner.debounce_timer.lock().await;
        let Some(timer) = pending.take() else {
            return;
        };
        if timer.handle.is_finished() {
            return;
        }
        timer.handle.abort();
        debug!("debounced save pushed back by discrete edit");
        *pending = Some(self.spawn_debounce(timer.target));
    }

    fn spawn_debounce(&self, target: StatusTarget) -> DebounceTimer {
        let coordinator = self.clone();
        let timer_target = target.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(coordinator.inner.debounce).await;
            coordinator.request_save(timer_target);
        });
        DebounceTimer { handle, target }
    }

    /// Starts a save, or folds the request into the queued retry when one is
    /// already in flight.
    pub fn request_save(&self, target: StatusTarget) {
        let mut launch = None;
        self.inner
            .state
            .send_modify(|state| launch = state.request(target));

        match launch {
            Some(target) => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(run_saves(inner, target));
            }
            None => debug!("save in flight, queued retry"),
        }
    }
}

async fn run_saves<P: Persist, S: StatusSink>(inner: Arc<Inner<P, S>>, mut target: StatusTarget) {
    loop {
        inner.report(&target, SaveStatus::Saving).await;
        let snapshot = inner.form.lock().await.clone();

        match inner.persist.submit(&snapshot).await {
            Ok(outcome) => {
                apply_new_ids(&mut *inner.form.lock().await, &outcome.new_ids);
                let generation = inner.report(&target, SaveStatus::Saved).await;
                schedule_clear(Arc::clone(&inner), target.clone(), generation);
            }
            Err(PersistError::Offline(reason)) => {
                error!("autosave failed, backend unreachable: {reason}");
                inner.report(&target, SaveStatus::Offline).await;
            }
            Err(PersistError::Rejected(errors)) => {
                warn!("autosave rejected: {errors}");
                inner
                    .report(&target, SaveStatus::Error(errors.to_string()))
                    .await;
            }
            Err(PersistError::Config(reason)) => {
                error!("autosave aborted: {reason}");
                inner.report(&target, SaveStatus::Error(reason)).await;
            }
        }

        let mut next = None;
        inner.state.send_modify(|state| next = state.complete());
        match next {
            Some(queued) => {
                debug!("launching queued save");
                target = queued;
            }
            None => break,
        }
    }
}

fn schedule_clear<P: Persist, S: StatusSink>(
    inner: Arc<Inner<P, S>>,
    target: StatusTarget,
    generation: u64,
) {
    tokio::spawn(async move {
        tokio::time::sleep(STATUS_CLEAR_DELAY).await;
        let generations = inner.status_generations.lock().await;
        if generations.get(&target) == Some(&generation) {
            inner.sink.report(&target, SaveStatus::Cleared);
        } else {
            debug!("skipping stale status clear for {}", target.0);
        }
    });
}

/// Writes identifiers assigned by the backend into the matching hidden fields
/// so the next save updates those rows instead of creating them again. Names
/// that are not part of the form are ignored.
pub fn apply_new_ids(form: &mut FormSnapshot, new_ids: &BTreeMap<String, i64>) {
    for (name, id) in new_ids {
        if let Some(value) = form.get_mut(name) {
            *value = id.to_string();
        }
    }
    refresh_initial_form_counts(form);
}

/// Formset management fields (`<prefix>-INITIAL_FORMS`) count the rows of the
/// prefix that already carry an id.
fn refresh_initial_form_counts(form: &mut FormSnapshot) {
    let prefixes: Vec<String> = form
        .keys()
        .filter_map(|name| name.strip_suffix("-INITIAL_FORMS"))
        .map(str::to_string)
        .collect();

    for prefix in prefixes {
        let row_prefix = format!("{prefix}-");
        let count = form
            .iter()
            .filter(|(name, value)| {
                name.starts_with(&row_prefix) && name.ends_with("-id") && !value.is_empty()
            })
            .count();
        form.insert(format!("{prefix}-INITIAL_FORMS"), count.to_string());
    }
}

use crate::progression::PlayerProgress;
use crate::scoring::{
    DEFAULT_DURATION_MINUTES, DEFAULT_EFFORT_LEVEL, DEFAULT_FEAR_FACTOR, DEFAULT_IMPACT_LEVEL,
    DEFAULT_PRIMARY_STAT, Rank, ScoreError, ScoreInput, XpShare,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Default, Deserialize)]
pub struct PreviewRequest {
    pub duration_minutes: Option<i64>,
    pub effort_level: Option<u32>,
    pub impact_level: Option<u32>,
    pub fear_factor: Option<f64>,
    pub manual_rank: Option<String>,
    pub primary_stat: Option<String>,
    pub secondary_stat: Option<String>,
}

impl PreviewRequest {
    pub fn into_input(self) -> Result<ScoreInput, ScoreError> {
        let manual_rank = non_empty(self.manual_rank)
            .map(|code| code.parse::<Rank>())
            .transpose()?;

        Ok(ScoreInput {
            duration_minutes: self.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            effort_level: self.effort_level.unwrap_or(DEFAULT_EFFORT_LEVEL),
            impact_level: self.impact_level.unwrap_or(DEFAULT_IMPACT_LEVEL),
            fear_factor: self.fear_factor.unwrap_or(DEFAULT_FEAR_FACTOR),
            manual_rank,
            primary_stat: non_empty(self.primary_stat)
                .unwrap_or_else(|| DEFAULT_PRIMARY_STAT.to_string()),
            secondary_stat: non_empty(self.secondary_stat),
        })
    }
}

/// Raw query-string form of the preview page. Anything missing or unparseable
/// falls back to the blank-form defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    pub duration_minutes: Option<String>,
    pub effort_level: Option<String>,
    pub impact_level: Option<String>,
    pub fear_factor: Option<String>,
    pub manual_rank: Option<String>,
    pub primary_stat: Option<String>,
    pub secondary_stat: Option<String>,
}

impl PreviewQuery {
    pub fn to_input(&self) -> ScoreInput {
        ScoreInput {
            duration_minutes: parse_or(&self.duration_minutes, DEFAULT_DURATION_MINUTES),
            effort_level: parse_or(&self.effort_level, DEFAULT_EFFORT_LEVEL),
            impact_level: parse_or(&self.impact_level, DEFAULT_IMPACT_LEVEL),
            fear_factor: parse_or(&self.fear_factor, DEFAULT_FEAR_FACTOR),
            manual_rank: self
                .manual_rank
                .as_deref()
                .and_then(|code| code.parse().ok()),
            primary_stat: non_empty(self.primary_stat.clone())
                .unwrap_or_else(|| DEFAULT_PRIMARY_STAT.to_string()),
            secondary_stat: non_empty(self.secondary_stat.clone()),
        }
    }
}

fn parse_or<T: FromStr>(value: &Option<String>, default: T) -> T {
    value
        .as_deref()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub computed_rank: Rank,
    pub total_score: f64,
    pub final_rank: Rank,
    pub is_manual: bool,
    pub xp_total: u32,
    pub xp_split: Vec<XpShare>,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RankRow {
    pub rank: Rank,
    pub label: String,
    pub xp: u32,
    pub min_score_exclusive: Option<f64>,
}

/// Task fields as the backend's create and update forms expect them.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub primary_stat: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_stat: Option<String>,
    pub duration_minutes: i64,
    pub effort_level: u32,
    pub impact_level: u32,
    pub fear_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_rank: Option<Rank>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, input: ScoreInput) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            primary_stat: input.primary_stat,
            secondary_stat: input.secondary_stat,
            duration_minutes: input.duration_minutes,
            effort_level: input.effort_level,
            impact_level: input.impact_level,
            fear_factor: input.fear_factor,
            manual_rank: input.manual_rank,
        }
    }

    pub fn score_input(&self) -> ScoreInput {
        ScoreInput {
            duration_minutes: self.duration_minutes,
            effort_level: self.effort_level,
            impact_level: self.impact_level,
            fear_factor: self.fear_factor,
            manual_rank: self.manual_rank,
            primary_stat: self.primary_stat.clone(),
            secondary_stat: self.secondary_stat.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: i64,
    pub title: String,
    pub rank: Rank,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub xp_reward: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub level: u32,
    pub xp_current: u64,
    pub xp_max: u64,
    pub xp_percent: u8,
}

impl ProfileSummary {
    pub fn progress(&self) -> PlayerProgress {
        PlayerProgress {
            level: self.level,
            xp_current: self.xp_current,
        }
    }
}

impl From<PlayerProgress> for ProfileSummary {
    fn from(progress: PlayerProgress) -> Self {
        Self {
            level: progress.level,
            xp_current: progress.xp_current,
            xp_max: progress.xp_max(),
            xp_percent: progress.xp_percent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task: TaskSummary,
    #[serde(default)]
    pub profile: Option<ProfileSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleState {
    Added,
    Removed,
}

/// Reply to a task completion toggle for today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskToggle {
    pub status: ToggleState,
    pub task_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitToggle {
    pub status: ToggleState,
    pub date: String,
    pub task_id: i64,
    pub daily_count: u32,
    #[serde(default)]
    pub daily_titles: Vec<String>,
}

//! Task rank and XP scoring.
//!
//! `compute_score` is the live preview of the rank the backend assigns when a
//! task is saved, so every rule here has to match it exactly: the duration
//! cap, the strict `>` thresholds and the floor-then-remainder XP split.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

pub const DURATION_CAP_MINUTES: i64 = 240;
pub const DEFAULT_DURATION_MINUTES: i64 = 15;
pub const DEFAULT_EFFORT_LEVEL: u32 = 1;
pub const DEFAULT_IMPACT_LEVEL: u32 = 1;
pub const DEFAULT_FEAR_FACTOR: f64 = 1.0;
pub const DEFAULT_PRIMARY_STAT: &str = "STR";

/// Share of the XP reward that goes to the primary stat when a secondary
/// stat is set.
pub const PRIMARY_SHARE: f64 = 0.60;

/// Fallback reward for a rank that is not in the table.
pub const FALLBACK_XP: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    E,
    D,
    C,
    B,
    A,
    S,
    SS,
    Monarch,
}

impl Rank {
    pub const ALL: [Rank; 8] = [
        Rank::E,
        Rank::D,
        Rank::C,
        Rank::B,
        Rank::A,
        Rank::S,
        Rank::SS,
        Rank::Monarch,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Rank::E => "E",
            Rank::D => "D",
            Rank::C => "C",
            Rank::B => "B",
            Rank::A => "A",
            Rank::S => "S",
            Rank::SS => "SS",
            Rank::Monarch => "Monarch",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rank::Monarch => "Shadow Monarch",
            Rank::E => "E-Rank",
            Rank::D => "D-Rank",
            Rank::C => "C-Rank",
            Rank::B => "B-Rank",
            Rank::A => "A-Rank",
            Rank::S => "S-Rank",
            Rank::SS => "SS-Rank",
        }
    }

    pub fn xp(self) -> u32 {
        RANK_XP
            .iter()
            .find(|(rank, _)| *rank == self)
            .map(|(_, xp)| *xp)
            .unwrap_or(FALLBACK_XP)
    }

    /// Score that must be strictly exceeded to reach this rank. `E` has none.
    pub fn min_score_exclusive(self) -> Option<f64> {
        RANK_THRESHOLDS
            .iter()
            .find(|(_, rank)| *rank == self)
            .map(|(threshold, _)| *threshold)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("unknown rank code '{0}'")]
    UnknownRank(String),
}

impl FromStr for Rank {
    type Err = ScoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Rank::ALL
            .into_iter()
            .find(|rank| rank.code() == value)
            .ok_or_else(|| ScoreError::UnknownRank(value.to_string()))
    }
}

pub const RANK_XP: [(Rank, u32); 8] = [
    (Rank::E, 15),
    (Rank::D, 35),
    (Rank::C, 75),
    (Rank::B, 150),
    (Rank::A, 350),
    (Rank::S, 700),
    (Rank::SS, 1200),
    (Rank::Monarch, 1500),
];

/// Ascending `(threshold, rank)` pairs. A total score strictly greater than
/// the threshold reaches the rank.
pub const RANK_THRESHOLDS: [(f64, Rank); 7] = [
    (20.0, Rank::D),
    (45.0, Rank::C),
    (75.0, Rank::B),
    (120.0, Rank::A),
    (180.0, Rank::S),
    (250.0, Rank::SS),
    (280.0, Rank::Monarch),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInput {
    pub duration_minutes: i64,
    pub effort_level: u32,
    pub impact_level: u32,
    pub fear_factor: f64,
    pub manual_rank: Option<Rank>,
    pub primary_stat: String,
    pub secondary_stat: Option<String>,
}

impl Default for ScoreInput {
    fn default() -> Self {
        Self {
            duration_minutes: DEFAULT_DURATION_MINUTES,
            effort_level: DEFAULT_EFFORT_LEVEL,
            impact_level: DEFAULT_IMPACT_LEVEL,
            fear_factor: DEFAULT_FEAR_FACTOR,
            manual_rank: None,
            primary_stat: DEFAULT_PRIMARY_STAT.to_string(),
            secondary_stat: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpShare {
    pub stat: String,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub computed_rank: Rank,
    pub total_score: f64,
    pub final_rank: Rank,
    pub xp_split: Vec<XpShare>,
}

impl ScoreResult {
    pub fn xp_total(&self) -> u32 {
        self.xp_split.iter().map(|share| share.amount).sum()
    }
}

pub fn compute_score(input: &ScoreInput) -> ScoreResult {
    let total_score = total_score(input);
    let computed_rank = classify(total_score);
    let final_rank = input.manual_rank.unwrap_or(computed_rank);
    let xp_split = split_xp(
        final_rank.xp(),
        &input.primary_stat,
        input.secondary_stat.as_deref(),
    );

    ScoreResult {
        computed_rank,
        total_score,
        final_rank,
        xp_split,
    }
}

pub fn total_score(input: &ScoreInput) -> f64 {
    let duration = input.duration_minutes.clamp(0, DURATION_CAP_MINUTES) as f64;
    let base = duration * 0.25
        + f64::from(input.effort_level) * 1.5
        + f64::from(input.impact_level).powi(3);
    base * input.fear_factor
}

pub fn classify(total_score: f64) -> Rank {
    RANK_THRESHOLDS
        .iter()
        .filter(|(threshold, _)| total_score > *threshold)
        .map(|(_, rank)| *rank)
        .last()
        .unwrap_or(Rank::E)
}

pub fn split_xp(total_xp: u32, primary: &str, secondary: Option<&str>) -> Vec<XpShare> {
    let secondary = secondary.filter(|stat| !stat.is_empty() && *stat != primary);

    match secondary {
        None => vec![XpShare {
            stat: primary.to_string(),
            amount: total_xp,
        }],
        Some(secondary) => {
            let primary_amount = (f64::from(total_xp) * PRIMARY_SHARE).floor() as u32;
            vec![
                XpShare {
                    stat: primary.to_string(),
                    amount: primary_amount,
                },
                XpShare {
                    stat: secondary.to_string(),
                    amount: total_xp - primary_amount,
                },
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(duration: i64, effort: u32, impact: u32, fear: f64) -> ScoreInput {
        ScoreInput {
            duration_minutes: duration,
            effort_level: effort,
            impact_level: impact,
            fear_factor: fear,
            ..ScoreInput::default()
        }
    }

    #[test]
    fn blank_form_defaults_to_e_rank() {
        let result = compute_score(&ScoreInput::default());
        assert!((result.total_score - 6.25).abs() < f64::EPSILON);
        assert_eq!(result.computed_rank, Rank::E);
        assert_eq!(result.final_rank, Rank::E);
        assert_eq!(
            result.xp_split,
            vec![XpShare {
                stat: "STR".into(),
                amount: 15
            }]
        );
    }

    #[test]
    fn capped_duration_reaches_s_rank() {
        let at_cap = compute_score(&input(240, 10, 5, 1.0));
        let over_cap = compute_score(&input(600, 10, 5, 1.0));
        assert!((at_cap.total_score - 200.0).abs() < f64::EPSILON);
        assert_eq!(at_cap, over_cap);
        assert_eq!(at_cap.final_rank, Rank::S);
        assert_eq!(at_cap.xp_total(), 700);
    }

    #[test]
    fn fear_factor_pushes_to_monarch_with_split() {
        let mut scored = input(240, 10, 5, 1.5);
        scored.secondary_stat = Some("INT".into());
        let result = compute_score(&scored);
        assert!((result.total_score - 300.0).abs() < f64::EPSILON);
        assert_eq!(result.final_rank, Rank::Monarch);
        assert_eq!(
            result.xp_split,
            vec![
                XpShare {
                    stat: "STR".into(),
                    amount: 900
                },
                XpShare {
                    stat: "INT".into(),
                    amount: 600
                },
            ]
        );
    }

    #[test]
    fn threshold_value_stays_in_lower_rank() {
        assert_eq!(classify(20.0), Rank::E);
        assert_eq!(classify(20.01), Rank::D);
        for (threshold, rank) in RANK_THRESHOLDS {
            assert!(classify(threshold) < rank);
            assert_eq!(classify(threshold + 0.001), rank);
        }
    }

    #[test]
    fn classification_is_monotonic() {
        let mut previous = Rank::E;
        let mut score = -10.0;
        while score < 400.0 {
            let rank = classify(score);
            assert!(rank >= previous, "rank dropped at score {score}");
            previous = rank;
            score += 0.5;
        }
        assert_eq!(previous, Rank::Monarch);
    }

    #[test]
    fn thresholds_and_rewards_increase_with_rank() {
        for pair in RANK_THRESHOLDS.windows(2) {
            assert!(pair[0].0 < pair[1].0);
            assert!(pair[0].1 < pair[1].1);
        }
        for pair in RANK_XP.windows(2) {
            assert!(pair[0].0 < pair[1].0);
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn manual_rank_overrides_computed() {
        for manual in Rank::ALL {
            let mut scored = input(240, 10, 5, 2.0);
            scored.manual_rank = Some(manual);
            let result = compute_score(&scored);
            assert_eq!(result.computed_rank, Rank::Monarch);
            assert_eq!(result.final_rank, manual);
            assert_eq!(result.xp_total(), manual.xp());
        }
    }

    #[test]
    fn split_always_sums_to_reward() {
        for (_, xp) in RANK_XP {
            let split = split_xp(xp, "WIL", Some("WIS"));
            assert_eq!(split.len(), 2);
            assert_eq!(split[0].amount + split[1].amount, xp);
            assert_eq!(split[0].amount, (f64::from(xp) * 0.6).floor() as u32);
        }
        let odd = split_xp(35, "STR", Some("CHA"));
        assert_eq!(odd[0].amount, 21);
        assert_eq!(odd[1].amount, 14);
    }

    #[test]
    fn same_or_empty_secondary_collapses_to_primary() {
        for secondary in [None, Some(""), Some("INT")] {
            let split = split_xp(75, "INT", secondary);
            assert_eq!(
                split,
                vec![XpShare {
                    stat: "INT".into(),
                    amount: 75
                }]
            );
        }
    }

    #[test]
    fn negative_duration_counts_as_zero() {
        let negative = total_score(&input(-30, 1, 1, 1.0));
        let zero = total_score(&input(0, 1, 1, 1.0));
        assert!((negative - zero).abs() < f64::EPSILON);
        assert!((zero - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rank_codes_parse_back() {
        for rank in Rank::ALL {
            assert_eq!(rank.code().parse::<Rank>(), Ok(rank));
        }
        assert_eq!(
            "Z".parse::<Rank>(),
            Err(ScoreError::UnknownRank("Z".into()))
        );
        assert_eq!(Rank::E.min_score_exclusive(), None);
        assert_eq!(Rank::Monarch.min_score_exclusive(), Some(280.0));
    }
}

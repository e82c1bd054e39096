use crate::scoring::{ScoreResult, XpShare};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub fn xp_required(level: u32) -> u64 {
    u64::from(level.max(1)) * 100
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProgress {
    pub level: u32,
    pub xp_current: u64,
}

impl Default for PlayerProgress {
    fn default() -> Self {
        Self {
            level: 1,
            xp_current: 0,
        }
    }
}

impl PlayerProgress {
    pub fn xp_max(&self) -> u64 {
        xp_required(self.level)
    }

    pub fn xp_percent(&self) -> u8 {
        let percent = self.xp_current.saturating_mul(100) / self.xp_max();
        percent.min(100) as u8
    }

    /// Adds XP, levelling up as many times as the gain covers.
    pub fn award(&mut self, xp: u64) {
        self.xp_current = self.xp_current.saturating_add(xp);
        while self.xp_current >= xp_required(self.level) {
            self.xp_current -= xp_required(self.level);
            self.level += 1;
        }
    }

    /// Removes XP, dropping levels while the balance is negative. Never goes
    /// below level 1 with 0 XP.
    pub fn revoke(&mut self, xp: u64) {
        let mut balance = self.xp_current as i128 - i128::from(xp);
        while balance < 0 {
            if self.level <= 1 {
                self.level = 1;
                balance = 0;
                break;
            }
            self.level -= 1;
            balance += i128::from(xp_required(self.level));
        }
        self.xp_current = balance as u64;
    }
}

/// Per-stat progression keyed by stat code (`STR`, `INT`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBook {
    pub stats: BTreeMap<String, PlayerProgress>,
}

impl StatBook {
    pub fn with_stats<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            stats: codes
                .into_iter()
                .map(|code| (code.to_string(), PlayerProgress::default()))
                .collect(),
        }
    }

    pub fn get(&self, stat: &str) -> Option<&PlayerProgress> {
        self.stats.get(stat)
    }

    /// Unknown stats are skipped.
    pub fn apply_completion(&mut self, split: &[XpShare]) {
        for share in split {
            if let Some(progress) = self.stats.get_mut(&share.stat) {
                progress.award(u64::from(share.amount));
            }
        }
    }

    pub fn revert_completion(&mut self, split: &[XpShare]) {
        for share in split {
            if let Some(progress) = self.stats.get_mut(&share.stat) {
                progress.revoke(u64::from(share.amount));
            }
        }
    }
}

/// Player and stat state after a task completion is logged.
pub fn complete_task(player: &mut PlayerProgress, stats: &mut StatBook, score: &ScoreResult) {
    player.award(u64::from(score.xp_total()));
    stats.apply_completion(&score.xp_split);
}

pub fn undo_task(player: &mut PlayerProgress, stats: &mut StatBook, score: &ScoreResult) {
    player.revoke(u64::from(score.xp_total()));
    stats.revert_completion(&score.xp_split);
}

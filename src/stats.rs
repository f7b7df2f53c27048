//! Rolling attempt statistics, learner achievements and course completion progress.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ContentTree;
use crate::util::round_to;

pub const FIRST_SUCCESS: &str = "first_success";

/// Counters attached to a content tree or a learner profile. Never decremented.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunningStats {
  pub attempts: u64,
  pub successes: u64,
  /// Whole seconds after the first attempt.
  pub avg_time_secs: f64,
  /// Learner-level mean score, two decimals.
  pub avg_score: f64,
}

impl RunningStats {
  /// Stats after one more attempt. The mean is updated online from the previous mean and
  /// count, so no running sum is stored. `learner_score` is given only for learner profiles.
  pub fn applied(&self, success: bool, elapsed_secs: f64, learner_score: Option<f64>) -> Self {
    let n = self.attempts as f64;
    let attempts = self.attempts + 1;
    let elapsed = elapsed_secs.max(0.0);

    let avg_time_secs = if self.attempts == 0 {
      elapsed
    } else {
      ((self.avg_time_secs * n + elapsed) / attempts as f64).round()
    };
    let avg_score = match learner_score {
      Some(score) => round_to((self.avg_score * n + score) / attempts as f64, 2),
      None => self.avg_score,
    };

    Self {
      attempts,
      successes: self.successes + u64::from(success),
      avg_time_secs,
      avg_score,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
  pub code: String,
  pub title: String,
  pub earned_at: DateTime<Utc>,
}

/// Set of achievements keyed by code.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Achievements(BTreeMap<String, Achievement>);

impl Achievements {
  /// Insert unless `code` is already present. Returns whether it was newly earned.
  pub fn award(&mut self, code: &str, title: &str, earned_at: DateTime<Utc>) -> bool {
    if self.0.contains_key(code) {
      return false;
    }
    self.0.insert(code.to_string(), Achievement { code: code.to_string(), title: title.to_string(), earned_at });
    true
  }

  pub fn contains(&self, code: &str) -> bool {
    self.0.contains_key(code)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Achievement> {
    self.0.values()
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
  pub id: String,
  pub stats: RunningStats,
  pub achievements: Achievements,
}

impl LearnerProfile {
  pub fn new(id: impl Into<String>) -> Self {
    Self { id: id.into(), ..Default::default() }
  }
}

/// Lesson completion across a whole tree.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
  pub total: usize,
  pub completed: usize,
  /// Rounded percentage, 0 for an empty tree.
  pub percent: u8,
  pub is_completed: bool,
}

pub fn completion_progress(tree: &ContentTree) -> Progress {
  let total = tree.item_count();
  let completed = tree.sections.iter().flat_map(|s| &s.items).filter(|i| i.completed).count();
  let percent = if total == 0 { 0 } else { ((completed as f64 / total as f64) * 100.0).round() as u8 };
  Progress { total, completed, percent, is_completed: percent == 100 }
}

//! Scoring a learner's attempt against a stored tree.
//!
//! Unknown sections or items are reported inline and skipped; they never fail the call.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::domain::{AttemptSubmission, ContentTree, Item, ItemKind};

/// Per-answer trace entry, in submission order.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDetail {
  pub section_index: u32,
  pub item_id: String,
  #[serde(flatten)]
  pub outcome: AnswerOutcome,
  /// Human-readable diagnostic for answers that could not be scored.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<&'static str>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
  Scored {
    kind: ItemKind,
    #[serde(rename = "scoreDelta")]
    score_delta: i64,
  },
  SectionNotFound,
  ItemNotFound,
}

impl AnswerOutcome {
  pub fn reason(&self) -> Option<&'static str> {
    match self {
      AnswerOutcome::Scored { .. } => None,
      AnswerOutcome::SectionNotFound => Some("section not found"),
      AnswerOutcome::ItemNotFound => Some("item not found"),
    }
  }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
  pub total_score: i64,
  pub correct_count: usize,
  /// Number of sections in the tree, not the number of answers submitted.
  pub total_expected: usize,
  pub success: bool,
  pub elapsed_secs: f64,
  pub details: Vec<AnswerDetail>,
}

/// Score `submission` against `tree`. Pure.
///
/// `success` requires a correct answer in every section of the tree; repeated answers
/// to one section cannot stand in for another section.
pub fn evaluate(tree: &ContentTree, submission: &AttemptSubmission) -> EvaluationResult {
  let lookup: HashMap<u32, HashMap<&str, &Item>> = tree
    .sections
    .iter()
    .map(|s| (s.index, s.items.iter().map(|i| (i.local_id.as_str(), i)).collect()))
    .collect();

  let mut total_score = 0i64;
  let mut correct_count = 0usize;
  let mut correct_sections: HashSet<u32> = HashSet::new();
  let mut details = Vec::with_capacity(submission.answers.len());

  for answer in &submission.answers {
    let outcome = match lookup.get(&answer.section_index) {
      None => AnswerOutcome::SectionNotFound,
      Some(items) => match items.get(answer.item_id.as_str()) {
        None => AnswerOutcome::ItemNotFound,
        Some(item) => {
          total_score = total_score.saturating_add(item.score_delta);
          if item.kind == ItemKind::Correct {
            correct_count += 1;
            correct_sections.insert(answer.section_index);
          }
          AnswerOutcome::Scored { kind: item.kind, score_delta: item.score_delta }
        }
      },
    };
    details.push(AnswerDetail {
      section_index: answer.section_index,
      item_id: answer.item_id.clone(),
      reason: outcome.reason(),
      outcome,
    });
  }

  let total_expected = tree.sections.len();
  EvaluationResult {
    total_score,
    correct_count,
    total_expected,
    success: total_expected > 0 && correct_sections.len() == total_expected,
    elapsed_secs: submission.elapsed_secs.max(0.0),
    details,
  }
}

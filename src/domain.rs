//! Domain models: the unified content tree (course or scenario), its sections and items,
//! structural parameters for generation, and attempt submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which shape of content a tree represents.
/// Both share one structure and differ only in labels and in whether items carry outcomes.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
  /// Weeks of lessons, each lesson with theory and practice.
  #[default]
  Course,
  /// Scenes of choices, each choice with a consequence and a score delta.
  Scenario,
}

impl ContentKind {
  /// Generic noun used when the topic yields nothing usable.
  pub fn placeholder(self) -> &'static str {
    match self {
      ContentKind::Course => "Course",
      ContentKind::Scenario => "Scenario",
    }
  }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

/// Outcome class of a choice-style item.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
  Correct,
  Warning,
  Fatal,
  #[default]
  Neutral,
}

impl ItemKind {
  /// Lenient parse of model output ("correct", "Warning ", ...). Unknown values are neutral.
  pub fn parse_loose(s: &str) -> Self {
    match s.trim().to_ascii_lowercase().as_str() {
      "correct" => ItemKind::Correct,
      "warning" => ItemKind::Warning,
      "fatal" => ItemKind::Fatal,
      _ => ItemKind::Neutral,
    }
  }
}

/// Leaf unit of a section: a lesson (course) or a choice option (scenario).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
  /// Unique within the owning section only.
  pub local_id: String,
  pub title: String,
  /// Lesson theory.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<String>,
  /// Lesson practice task.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub task: Option<String>,
  #[serde(default)]
  pub kind: ItemKind,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub consequence: Option<String>,
  #[serde(default)]
  pub score_delta: i64,
  #[serde(default)]
  pub default_flag: bool,
  #[serde(default)]
  pub completed: bool,
}

/// One ordered top-level division: a week or a scene.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
  pub index: u32,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<String>,
  #[serde(default)]
  pub items: Vec<Item>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_item: Option<String>,
}

impl Section {
  pub fn item(&self, local_id: &str) -> Option<&Item> {
    self.items.iter().find(|i| i.local_id == local_id)
  }
}

/// Audit trail of how a tree was produced. Never consulted for scoring.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
  pub generated: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub seed: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<DateTime<Utc>>,
}

/// The generated artifact.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentTree {
  pub kind: ContentKind,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub summary: Option<String>,
  #[serde(default)]
  pub difficulty: Difficulty,
  pub sections: Vec<Section>,
  #[serde(default)]
  pub provenance: Provenance,
}

impl ContentTree {
  pub fn section(&self, index: u32) -> Option<&Section> {
    self.sections.iter().find(|s| s.index == index)
  }

  pub fn section_mut(&mut self, index: u32) -> Option<&mut Section> {
    self.sections.iter_mut().find(|s| s.index == index)
  }

  pub fn item_count(&self) -> usize {
    self.sections.iter().map(|s| s.items.len()).sum()
  }
}

pub const MAX_SECTIONS: u32 = 52;
pub const MAX_ITEMS_PER_SECTION: u32 = 7;
/// Bound on a single choice's score change, whatever the model proposes.
pub const MAX_SCORE_DELTA: i64 = 100;

/// Requested shape of a tree.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StructuralParams {
  pub sections: u32,
  pub items_per_section: u32,
  /// Index given to the first generated section. 1 for whole trees; the target
  /// section when regenerating one section of an existing tree.
  #[serde(default = "first_section_default")]
  pub first_section: u32,
}

fn first_section_default() -> u32 { 1 }

impl StructuralParams {
  pub fn new(sections: u32, items_per_section: u32) -> Self {
    Self { sections, items_per_section, first_section: 1 }
  }

  /// Bring caller-supplied counts into the supported range. Every produced index
  /// stays within `1..=MAX_SECTIONS`.
  pub fn clamped(self) -> Self {
    let sections = self.sections.clamp(1, MAX_SECTIONS);
    Self {
      sections,
      items_per_section: self.items_per_section.clamp(1, MAX_ITEMS_PER_SECTION),
      first_section: self.first_section.clamp(1, MAX_SECTIONS - sections + 1),
    }
  }

  /// Section indices this request produces, in order.
  pub fn section_indices(&self) -> impl Iterator<Item = u32> {
    let first = self.first_section.max(1);
    first..first.saturating_add(self.sections)
  }
}

impl Default for StructuralParams {
  fn default() -> Self { Self::new(4, 2) }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
  /// Titles only.
  Skeleton,
  /// Titles, bodies and (for scenarios) choice outcomes.
  #[default]
  Detailed,
}

/// Everything the orchestrator needs to produce one tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
  pub kind: ContentKind,
  pub topic: String,
  pub params: StructuralParams,
  pub detail: DetailLevel,
}

/// One learner selection.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
  pub section_index: u32,
  pub item_id: String,
}

impl Answer {
  pub fn new(section_index: u32, item_id: impl Into<String>) -> Self {
    Self { section_index, item_id: item_id.into() }
  }
}

/// A learner's run through a tree. Not persisted on its own.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSubmission {
  pub answers: Vec<Answer>,
  #[serde(default)]
  pub elapsed_secs: f64,
}

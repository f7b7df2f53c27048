//! In-memory persistence for content trees and learner profiles.
//!
//! Stats updates are read-modify-write inside a single write-lock scope, so concurrent
//! attempts on the same record never lose an update.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::domain::{ContentTree, Section};
use crate::error::StoreError;
use crate::generate::merge_section;
use crate::stats::{LearnerProfile, RunningStats, FIRST_SUCCESS};

/// A persisted tree with its content-level stats.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTree {
  pub id: String,
  pub tree: ContentTree,
  pub stats: RunningStats,
  pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
  async fn insert_tree(&self, id: &str, tree: ContentTree) -> Result<StoredTree, StoreError>;

  async fn get_tree(&self, id: &str) -> Result<StoredTree, StoreError>;

  /// Replace the section with the same index or insert it in order.
  async fn upsert_section(&self, id: &str, section: Section) -> Result<StoredTree, StoreError>;

  async fn set_item_completed(&self, id: &str, section_index: u32, item_id: &str, completed: bool) -> Result<StoredTree, StoreError>;

  async fn record_content_attempt(&self, id: &str, success: bool, elapsed_secs: f64) -> Result<RunningStats, StoreError>;

  /// Update a learner's stats, creating the profile on first use. The first successful
  /// attempt also earns `first_success`.
  async fn record_learner_attempt(&self, learner_id: &str, success: bool, elapsed_secs: f64, score: f64) -> LearnerProfile;

  async fn get_learner(&self, learner_id: &str) -> Result<LearnerProfile, StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
  trees: Arc<RwLock<HashMap<String, StoredTree>>>,
  learners: Arc<RwLock<HashMap<String, LearnerProfile>>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

fn tree_not_found(id: &str) -> StoreError {
  StoreError::NotFound(format!("tree {id}"))
}

#[async_trait]
impl ContentStore for InMemoryStore {
  #[instrument(level = "debug", skip(self, tree), fields(%id))]
  async fn insert_tree(&self, id: &str, tree: ContentTree) -> Result<StoredTree, StoreError> {
    let mut trees = self.trees.write().await;
    if trees.contains_key(id) {
      return Err(StoreError::AlreadyExists(format!("tree {id}")));
    }
    let stored = StoredTree { id: id.to_string(), tree, stats: RunningStats::default(), created_at: Utc::now() };
    trees.insert(id.to_string(), stored.clone());
    info!(target: "trainforge", %id, sections = stored.tree.sections.len(), "Stored content tree");
    Ok(stored)
  }

  #[instrument(level = "debug", skip(self), fields(%id))]
  async fn get_tree(&self, id: &str) -> Result<StoredTree, StoreError> {
    self.trees.read().await.get(id).cloned().ok_or_else(|| tree_not_found(id))
  }

  #[instrument(level = "debug", skip(self, section), fields(%id, index = section.index))]
  async fn upsert_section(&self, id: &str, section: Section) -> Result<StoredTree, StoreError> {
    let mut trees = self.trees.write().await;
    let stored = trees.get_mut(id).ok_or_else(|| tree_not_found(id))?;
    merge_section(&mut stored.tree, section);
    Ok(stored.clone())
  }

  #[instrument(level = "debug", skip(self), fields(%id))]
  async fn set_item_completed(&self, id: &str, section_index: u32, item_id: &str, completed: bool) -> Result<StoredTree, StoreError> {
    let mut trees = self.trees.write().await;
    let stored = trees.get_mut(id).ok_or_else(|| tree_not_found(id))?;
    let item = stored
      .tree
      .section_mut(section_index)
      .and_then(|s| s.items.iter_mut().find(|i| i.local_id == item_id))
      .ok_or_else(|| StoreError::NotFound(format!("item {item_id} in section {section_index} of tree {id}")))?;
    item.completed = completed;
    Ok(stored.clone())
  }

  #[instrument(level = "debug", skip(self), fields(%id))]
  async fn record_content_attempt(&self, id: &str, success: bool, elapsed_secs: f64) -> Result<RunningStats, StoreError> {
    let mut trees = self.trees.write().await;
    let stored = trees.get_mut(id).ok_or_else(|| tree_not_found(id))?;
    stored.stats = stored.stats.applied(success, elapsed_secs, None);
    debug!(target: "attempt", %id, attempts = stored.stats.attempts, successes = stored.stats.successes, "Content stats updated");
    Ok(stored.stats)
  }

  #[instrument(level = "debug", skip(self), fields(%learner_id))]
  async fn record_learner_attempt(&self, learner_id: &str, success: bool, elapsed_secs: f64, score: f64) -> LearnerProfile {
    let mut learners = self.learners.write().await;
    let profile = learners
      .entry(learner_id.to_string())
      .or_insert_with(|| LearnerProfile::new(learner_id));
    profile.stats = profile.stats.applied(success, elapsed_secs, Some(score));
    if success && profile.achievements.award(FIRST_SUCCESS, "First success", Utc::now()) {
      info!(target: "attempt", %learner_id, code = FIRST_SUCCESS, "Achievement earned");
    }
    profile.clone()
  }

  #[instrument(level = "debug", skip(self), fields(%learner_id))]
  async fn get_learner(&self, learner_id: &str) -> Result<LearnerProfile, StoreError> {
    self.learners
      .read()
      .await
      .get(learner_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("learner {learner_id}")))
  }
}

//! Training service: the operations a routing layer would expose.
//!
//! Ties the generator, the evaluator and the store together:
//!   - creating a tree (whole, or skeleton plus pending sections)
//!   - detailing one section of a stored tree
//!   - scoring an attempt and updating content and learner stats
//!   - marking lessons completed

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{AttemptSubmission, ContentKind, ContentTree, StructuralParams};
use crate::error::ServiceError;
use crate::evaluate::{evaluate, EvaluationResult};
use crate::generate::Generator;
use crate::stats::{completion_progress, LearnerProfile, Progress, RunningStats};
use crate::store::{ContentStore, StoredTree};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
  pub id: String,
  pub tree: ContentTree,
  pub pending_sections: Vec<u32>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutcome {
  pub evaluation: EvaluationResult,
  pub content_stats: RunningStats,
  pub learner: LearnerProfile,
}

#[derive(Clone)]
pub struct TrainingService {
  generator: Generator,
  store: Arc<dyn ContentStore>,
}

impl TrainingService {
  pub fn new(generator: Generator, store: Arc<dyn ContentStore>) -> Self {
    Self { generator, store }
  }

  /// Plan and persist a new tree under a fresh id.
  #[instrument(level = "info", skip(self, topic), fields(kind = ?kind, topic_len = topic.len()))]
  pub async fn create(&self, kind: ContentKind, topic: &str, params: StructuralParams) -> Result<Created, ServiceError> {
    let plan = self.generator.plan(kind, topic, params.clamped()).await;
    let id = Uuid::new_v4().to_string();
    let stored = self.store.insert_tree(&id, plan.tree).await?;
    info!(target: "trainforge", %id, pending = plan.pending_sections.len(), "Created content tree");
    Ok(Created { id, tree: stored.tree, pending_sections: plan.pending_sections })
  }

  /// Generate detailed content for section `index` and store it in place.
  /// `items` defaults to the stored section's item count.
  #[instrument(level = "info", skip(self), fields(%id))]
  pub async fn expand_section(&self, id: &str, index: u32, items: Option<u32>) -> Result<StoredTree, ServiceError> {
    let stored = self.store.get_tree(id).await?;
    let existing = stored
      .tree
      .section(index)
      .ok_or_else(|| ServiceError::SectionNotFound { tree_id: id.to_string(), index })?;
    let items = items.unwrap_or(existing.items.len() as u32).max(1);
    let topic = stored.tree.provenance.seed.as_deref().unwrap_or(&stored.tree.title);

    let mut section = self
      .generator
      .generate_section(stored.tree.kind, topic, index, items)
      .await;
    // Keep completion marks for lessons that survive regeneration.
    for item in &mut section.items {
      item.completed = existing.item(&item.local_id).map(|i| i.completed).unwrap_or(false);
    }

    let updated = self.store.upsert_section(id, section).await?;
    info!(target: "trainforge", %id, index, items, "Section expanded");
    Ok(updated)
  }

  /// Score a submission, then record it against the tree and the learner.
  #[instrument(level = "info", skip(self, submission), fields(%id, %learner_id, answers = submission.answers.len()))]
  pub async fn submit_attempt(&self, id: &str, learner_id: &str, submission: &AttemptSubmission) -> Result<AttemptOutcome, ServiceError> {
    let stored = self.store.get_tree(id).await?;
    let evaluation = evaluate(&stored.tree, submission);

    let content_stats = self
      .store
      .record_content_attempt(id, evaluation.success, evaluation.elapsed_secs)
      .await?;
    let learner = self
      .store
      .record_learner_attempt(learner_id, evaluation.success, evaluation.elapsed_secs, evaluation.total_score as f64)
      .await;

    info!(
      target: "attempt",
      %id,
      %learner_id,
      score = evaluation.total_score,
      correct = evaluation.correct_count,
      expected = evaluation.total_expected,
      success = evaluation.success,
      "Attempt recorded"
    );
    Ok(AttemptOutcome { evaluation, content_stats, learner })
  }

  #[instrument(level = "info", skip(self), fields(%id))]
  pub async fn complete_item(&self, id: &str, section_index: u32, item_id: &str, completed: bool) -> Result<Progress, ServiceError> {
    let stored = self.store.set_item_completed(id, section_index, item_id, completed).await?;
    let progress = completion_progress(&stored.tree);
    info!(target: "trainforge", %id, completed = progress.completed, total = progress.total, percent = progress.percent, "Progress updated");
    Ok(progress)
  }

  pub async fn get(&self, id: &str) -> Result<StoredTree, ServiceError> {
    Ok(self.store.get_tree(id).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::GeneratorConfig;
  use crate::domain::{Answer, ItemKind};
  use crate::error::StoreError;
  use crate::remote::mock::ScriptedRemote;
  use crate::stats::FIRST_SUCCESS;
  use crate::store::InMemoryStore;

  fn service(remote: Arc<ScriptedRemote>) -> TrainingService {
    let generator = Generator::new(GeneratorConfig::default(), remote);
    TrainingService::new(generator, Arc::new(InMemoryStore::new()))
  }

  fn offline() -> TrainingService {
    service(ScriptedRemote::with(Vec::new()))
  }

  #[tokio::test]
  async fn create_short_course_is_fully_detailed() {
    let svc = offline();
    let created = svc.create(ContentKind::Course, "Rust ownership", StructuralParams::new(2, 3)).await.unwrap();
    assert!(created.pending_sections.is_empty());
    assert_eq!(created.tree.sections.len(), 2);
    assert!(created.tree.sections.iter().flat_map(|s| &s.items).all(|i| i.body.is_some()));
    assert_eq!(svc.get(&created.id).await.unwrap().tree, created.tree);
  }

  #[tokio::test]
  async fn long_course_expands_section_by_section() {
    let svc = offline();
    let created = svc.create(ContentKind::Course, "Algebra", StructuralParams::new(6, 2)).await.unwrap();
    assert_eq!(created.pending_sections, vec![1, 2, 3, 4, 5, 6]);
    assert!(created.tree.sections[2].items[0].body.is_none());

    svc.complete_item(&created.id, 3, "a", true).await.unwrap();
    let stored = svc.expand_section(&created.id, 3, None).await.unwrap();
    let section = stored.tree.section(3).unwrap();
    assert_eq!(section.items.len(), 2);
    assert!(section.items.iter().all(|i| i.body.is_some()));
    assert!(section.items[0].completed);
    assert_eq!(stored.tree.sections.len(), 6);
  }

  #[tokio::test]
  async fn expand_unknown_section_fails() {
    let svc = offline();
    let created = svc.create(ContentKind::Course, "Algebra", StructuralParams::new(2, 1)).await.unwrap();
    let err = svc.expand_section(&created.id, 9, None).await.unwrap_err();
    assert_eq!(err, ServiceError::SectionNotFound { tree_id: created.id.clone(), index: 9 });
    let err = svc.expand_section("missing", 1, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Store(StoreError::NotFound(_))));
  }

  #[tokio::test]
  async fn scenario_attempt_updates_stats_and_achievements() {
    let svc = offline();
    let created = svc.create(ContentKind::Scenario, "Negotiation", StructuralParams::new(2, 3)).await.unwrap();
    let correct: Vec<Answer> = created
      .tree
      .sections
      .iter()
      .map(|s| {
        let item = s.items.iter().find(|i| i.kind == ItemKind::Correct).unwrap();
        Answer::new(s.index, item.local_id.clone())
      })
      .collect();

    let submission = AttemptSubmission { answers: correct, elapsed_secs: 40.0 };
    let out = svc.submit_attempt(&created.id, "learner-1", &submission).await.unwrap();
    assert!(out.evaluation.success);
    assert_eq!(out.content_stats.attempts, 1);
    assert_eq!(out.content_stats.avg_time_secs, 40.0);
    assert!(out.learner.achievements.contains(FIRST_SUCCESS));

    let miss = AttemptSubmission { answers: vec![Answer::new(99, "a")], elapsed_secs: 60.0 };
    let out = svc.submit_attempt(&created.id, "learner-1", &miss).await.unwrap();
    assert!(!out.evaluation.success);
    assert_eq!(out.content_stats.attempts, 2);
    assert_eq!(out.content_stats.successes, 1);
    assert_eq!(out.content_stats.avg_time_secs, 50.0);
    assert_eq!(out.learner.achievements.len(), 1);
  }

  #[tokio::test]
  async fn completing_items_reports_progress() {
    let svc = offline();
    let created = svc.create(ContentKind::Course, "Rust", StructuralParams::new(1, 2)).await.unwrap();
    let p = svc.complete_item(&created.id, 1, "a", true).await.unwrap();
    assert_eq!((p.completed, p.total, p.percent, p.is_completed), (1, 2, 50, false));
    let p = svc.complete_item(&created.id, 1, "b", true).await.unwrap();
    assert!(p.is_completed);
    let p = svc.complete_item(&created.id, 1, "b", false).await.unwrap();
    assert_eq!(p.percent, 50);
  }

  #[tokio::test]
  async fn remote_scenario_is_persisted_with_provenance() {
    let reply = r#"{"title":"Late delivery","scenes":[{"id":1,"description":"Client calls","choices":[
      {"id":"a","text":"Apologize and plan","consequenceType":"correct","scoreDelta":10},
      {"id":"b","text":"Blame logistics","consequenceType":"fatal","scoreDelta":-10}]}]}"#;
    let remote = ScriptedRemote::with(vec![Ok(reply.into())]);
    let svc = service(remote.clone());
    let created = svc.create(ContentKind::Scenario, "Customer care", StructuralParams::new(1, 2)).await.unwrap();
    assert!(created.tree.provenance.generated);
    assert_eq!(created.tree.title, "Late delivery");
    assert_eq!(remote.calls(), 1);
  }
}

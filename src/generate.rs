//! Generation orchestrator: remote model first, local synthesis as the terminal fallback.
//!
//! Flow (one outbound call per invocation, no retries):
//! 1) Build the prompt from the configured templates and call the completion service.
//! 2) Extract the JSON value (array for courses, object for scenarios).
//! 3) Coerce into a tree, trim to the requested counts, normalize, validate.
//! 4) Any failure along the way → `synth::synthesize` with the same request.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::GeneratorConfig;
use crate::domain::{ContentKind, ContentTree, DetailLevel, GenerationRequest, Section, StructuralParams};
use crate::error::GenerationError;
use crate::extract::{extract_array, extract_object};
use crate::normalize::{course_from_value, normalize_tree, scenario_from_value, truncate_to, validate, validate_detail};
use crate::remote::{CompletionRequest, CompletionService};
use crate::synth::synthesize;
use crate::util::{fill_template, trunc_for_log};

/// Result of planning a new tree. Long trees come back as a skeleton whose sections
/// are detailed later, one `generate_section` call each.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPlan {
  pub tree: ContentTree,
  pub pending_sections: Vec<u32>,
}

#[derive(Clone)]
pub struct Generator {
  config: Arc<GeneratorConfig>,
  remote: Arc<dyn CompletionService>,
}

impl Generator {
  pub fn new(config: GeneratorConfig, remote: Arc<dyn CompletionService>) -> Self {
    Self { config: Arc::new(config), remote }
  }

  pub fn config(&self) -> &GeneratorConfig {
    &self.config
  }

  /// Produce a tree for `req`. Total: remote failures of any kind end in local synthesis.
  #[instrument(level = "info", skip_all, fields(kind = ?req.kind, detail = ?req.detail, sections = req.params.sections, items = req.params.items_per_section))]
  pub async fn generate(&self, req: &GenerationRequest) -> ContentTree {
    let req = GenerationRequest { params: req.params.clamped(), ..req.clone() };

    match self.try_remote(&req).await {
      Ok(tree) => {
        info!(target: "generation", topic = %trunc_for_log(&req.topic, 60), sections = tree.sections.len(), "Remote generation accepted");
        tree
      }
      Err(e) => {
        warn!(target: "generation", topic = %trunc_for_log(&req.topic, 60), error = %e, "Remote generation failed; using local synthesis");
        let mut tree = synthesize(&req, &self.config.vocabulary);
        tree.provenance.seed = Some(req.topic.trim().to_string());
        tree.provenance.version = Some(Utc::now());
        tree
      }
    }
  }

  /// Plan a new tree: fully detailed when small, skeleton plus pending sections when long.
  #[instrument(level = "info", skip_all, fields(kind = ?kind, sections = params.sections))]
  pub async fn plan(&self, kind: ContentKind, topic: &str, params: StructuralParams) -> GenerationPlan {
    let params = StructuralParams { first_section: 1, ..params }.clamped();
    let long_form = params.sections > self.config.skeleton_threshold;
    let detail = if long_form { DetailLevel::Skeleton } else { DetailLevel::Detailed };

    let tree = self
      .generate(&GenerationRequest { kind, topic: topic.to_string(), params, detail })
      .await;
    let pending_sections = if long_form { tree.sections.iter().map(|s| s.index).collect() } else { Vec::new() };

    info!(target: "generation", long_form, pending = pending_sections.len(), "Generation plan ready");
    GenerationPlan { tree, pending_sections }
  }

  /// Detailed content for one section of an existing tree. Re-enters `generate`
  /// with a single section anchored at `index` (at most `MAX_SECTIONS`).
  #[instrument(level = "info", skip_all, fields(kind = ?kind, index = index, items = items))]
  pub async fn generate_section(&self, kind: ContentKind, topic: &str, index: u32, items: u32) -> Section {
    let params = StructuralParams { sections: 1, items_per_section: items, first_section: index }.clamped();
    let index = params.first_section;
    let tree = self
      .generate(&GenerationRequest { kind, topic: topic.to_string(), params, detail: DetailLevel::Detailed })
      .await;

    // A validated or synthesized tree always holds exactly the requested section.
    tree.sections.into_iter().next().unwrap_or_else(|| Section { index, ..Default::default() })
  }

  async fn try_remote(&self, req: &GenerationRequest) -> Result<ContentTree, GenerationError> {
    let completion = self.completion_request(req);
    let text = self.remote.complete(&completion).await?;

    let mut tree = match req.kind {
      ContentKind::Course => course_from_value(&extract_array(&text)?, req)?,
      ContentKind::Scenario => scenario_from_value(&extract_object(&text)?, req)?,
    };
    truncate_to(&mut tree, &req.params);
    let mut tree = normalize_tree(tree, &self.config.vocabulary);
    validate(&tree, Some(&req.params))?;
    validate_detail(&tree, req.detail)?;

    tree.provenance.generated = true;
    tree.provenance.model = self.remote.model().map(str::to_string);
    tree.provenance.seed = Some(req.topic.trim().to_string());
    tree.provenance.version = Some(Utc::now());
    Ok(tree)
  }

  /// System instruction plus user prompt embedding topic, counts and the expected schema.
  pub fn completion_request(&self, req: &GenerationRequest) -> CompletionRequest {
    let cfg = &self.config;
    let p = &cfg.prompts;
    let template = match (req.kind, req.detail) {
      (ContentKind::Course, DetailLevel::Skeleton) => &p.course_skeleton_user_template,
      (ContentKind::Course, DetailLevel::Detailed) => &p.course_detailed_user_template,
      (ContentKind::Scenario, DetailLevel::Skeleton) => &p.scenario_skeleton_user_template,
      (ContentKind::Scenario, DetailLevel::Detailed) => &p.scenario_detailed_user_template,
    };

    let first = req.params.first_section.max(1);
    let last = first + req.params.sections.saturating_sub(1);
    let (sections, items, first, last) = (
      req.params.sections.to_string(),
      req.params.items_per_section.to_string(),
      first.to_string(),
      last.to_string(),
    );
    let topic = match req.topic.trim() {
      "" => req.kind.placeholder(),
      t => t,
    };
    let pairs = [
      ("language", cfg.vocabulary.language.as_str()),
      ("topic", topic),
      ("sections", sections.as_str()),
      ("items", items.as_str()),
      ("first", first.as_str()),
      ("last", last.as_str()),
    ];

    let (max_new_tokens, temperature) = match req.detail {
      DetailLevel::Skeleton => (cfg.remote.skeleton_max_new_tokens, cfg.remote.skeleton_temperature),
      DetailLevel::Detailed => (cfg.remote.detailed_max_new_tokens, cfg.remote.detailed_temperature),
    };

    CompletionRequest {
      system: fill_template(&p.system, &pairs),
      user: fill_template(template, &pairs),
      max_new_tokens,
      temperature,
    }
  }
}

/// Replace the section with the same index, or insert it keeping indices ordered.
pub fn merge_section(tree: &mut ContentTree, section: Section) {
  match tree.sections.binary_search_by_key(&section.index, |s| s.index) {
    Ok(pos) => tree.sections[pos] = section,
    Err(pos) => tree.sections.insert(pos, section),
  }
}

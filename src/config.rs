//! Generator configuration: remote endpoint settings, prompt templates, display vocabulary.
//!
//! Built once from the environment (plus an optional TOML overlay) and passed explicitly
//! into the client and orchestrator. Nothing here is read again after construction.
//!
//! TOML schema (every table and key optional):
//!
//! ```toml
//! skeleton_threshold = 4
//!
//! [remote]
//! base_url = "https://router.huggingface.co/v1"
//! model = "meta-llama/Llama-3.1-8B-Instruct"
//! timeout_secs = 90
//!
//! [prompts]
//! system = "..."
//!
//! [vocabulary]
//! language = "English"
//! week = "Week"
//! ```

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::ContentKind;

/// Settings for the chat-completion endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
  /// Bearer credential. Absent means every call short-circuits to the local fallback.
  #[serde(skip)]
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  pub timeout_secs: u64,
  pub skeleton_max_new_tokens: u32,
  pub skeleton_temperature: f32,
  pub detailed_max_new_tokens: u32,
  pub detailed_temperature: f32,
}

impl Default for RemoteConfig {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: "https://router.huggingface.co/v1".into(),
      model: "meta-llama/Llama-3.1-8B-Instruct".into(),
      timeout_secs: 90,
      skeleton_max_new_tokens: 800,
      skeleton_temperature: 0.2,
      detailed_max_new_tokens: 1500,
      detailed_temperature: 0.6,
    }
  }
}

/// Prompt templates. Placeholders: `{language}`, `{topic}`, `{sections}`, `{items}`,
/// `{first}`, `{last}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub course_skeleton_user_template: String,
  pub course_detailed_user_template: String,
  pub scenario_skeleton_user_template: String,
  pub scenario_detailed_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You are an assistant that outputs ONLY valid JSON. Use concise {language}. No extra commentary.".into(),
      course_skeleton_user_template: concat!(
        "You are an expert course designer. Generate only titles for a course with goal: \"{topic}\".\n",
        "Structure:\n- weeks: {sections} (numbered {first} to {last})\n- lessonsPerWeek: {items}\n\n",
        "Return EXACTLY a JSON array of objects:\n",
        "[{\"week\":{first},\"lessonNumber\":1,\"title\":\"...\"}, ...]\n",
        "No theory, no practice, no extra text. Use concise {language}."
      ).into(),
      course_detailed_user_template: concat!(
        "Generate lessons for a course with goal: \"{topic}\".\n",
        "Weeks: {sections} (numbered {first} to {last}). LessonsPerWeek: {items}.\n",
        "Theory: one paragraph (about 80-150 words). Practice: one concrete exercise.\n",
        "Return EXACTLY a JSON array with objects:\n",
        "[{\"week\":{first},\"lessonNumber\":1,\"title\":\"...\",\"theory\":\"...\",\"practice\":\"...\"}, ...]\n",
        "No extra text, no explanation. Use concise {language}."
      ).into(),
      scenario_skeleton_user_template: concat!(
        "Design a training scenario about: \"{topic}\".\n",
        "Scenes: {sections} (ids {first} to {last}). Choices per scene: {items}.\n",
        "Titles only: no descriptions, no consequences.\n",
        "Return EXACTLY one JSON object:\n",
        "{\"title\":\"...\",\"scenes\":[{\"id\":{first},\"title\":\"...\",\"choices\":[{\"id\":\"a\",\"text\":\"...\"}]}]}\n",
        "No extra text. Use concise {language}."
      ).into(),
      scenario_detailed_user_template: concat!(
        "Design a training scenario about: \"{topic}\".\n",
        "Scenes: {sections} (ids {first} to {last}). Choices per scene: {items}.\n",
        "Every scene has exactly one correct choice (scoreDelta 10); other choices are warning (-2) or fatal (-10).\n",
        "Return EXACTLY one JSON object:\n",
        "{\"title\":\"...\",\"summary\":\"...\",\"difficulty\":\"medium\",\"scenes\":[{\"id\":{first},\"title\":\"...\",",
        "\"description\":\"...\",\"choices\":[{\"id\":\"a\",\"text\":\"...\",\"consequenceType\":\"correct\",",
        "\"consequenceText\":\"...\",\"scoreDelta\":10}],\"defaultChoiceId\":\"a\"}]}\n",
        "No extra text. Use concise {language}."
      ).into(),
    }
  }
}

/// Words used by the local synthesizer and for fallback titles during normalization.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
  pub language: String,
  pub week: String,
  pub lesson: String,
  pub scene: String,
  pub option: String,
  pub theory_prefix: String,
  pub key_idea: String,
  pub practice_prefix: String,
  pub situation_prefix: String,
  pub correct_consequence: String,
  pub warning_consequence: String,
  pub fatal_consequence: String,
}

impl Default for Vocabulary {
  fn default() -> Self {
    Self {
      language: "English".into(),
      week: "Week".into(),
      lesson: "Lesson".into(),
      scene: "Scene".into(),
      option: "Option".into(),
      theory_prefix: "Short theory".into(),
      key_idea: "Key idea: get acquainted with".into(),
      practice_prefix: "Practice: complete a short exercise on".into(),
      situation_prefix: "Situation".into(),
      correct_consequence: "Right call: this keeps everyone safe.".into(),
      warning_consequence: "Risky: it works, but costs valuable time.".into(),
      fatal_consequence: "Critical mistake: the situation gets out of control.".into(),
    }
  }
}

impl Vocabulary {
  pub fn section_label(&self, kind: ContentKind) -> &str {
    match kind {
      ContentKind::Course => &self.week,
      ContentKind::Scenario => &self.scene,
    }
  }

  pub fn item_label(&self, kind: ContentKind) -> &str {
    match kind {
      ContentKind::Course => &self.lesson,
      ContentKind::Scenario => &self.option,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
  pub remote: RemoteConfig,
  /// Requests with more sections than this get a skeleton first and per-section detail later.
  pub skeleton_threshold: u32,
  pub prompts: Prompts,
  pub vocabulary: Vocabulary,
}

impl Default for GeneratorConfig {
  fn default() -> Self {
    Self {
      remote: RemoteConfig::default(),
      skeleton_threshold: 4,
      prompts: Prompts::default(),
      vocabulary: Vocabulary::default(),
    }
  }
}

impl GeneratorConfig {
  /// Parse a TOML document. The credential is never read from TOML.
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str::<GeneratorConfig>(s)
  }

  /// Build from the environment:
  ///   TRAINFORGE_CONFIG_PATH  : optional TOML overlay (prompts, vocabulary, remote settings)
  ///   COMPLETION_API_KEY      : bearer credential; remote generation is skipped without it
  ///   COMPLETION_BASE_URL     : overrides `remote.base_url`
  ///   COMPLETION_MODEL        : overrides `remote.model`
  ///   COMPLETION_TIMEOUT_SECS : overrides `remote.timeout_secs`
  pub fn from_env() -> Self {
    let mut cfg = load_config_file_from_env().unwrap_or_default();

    cfg.remote.api_key = std::env::var("COMPLETION_API_KEY")
      .ok()
      .filter(|k| !k.trim().is_empty());
    if let Ok(url) = std::env::var("COMPLETION_BASE_URL") {
      cfg.remote.base_url = url;
    }
    if let Ok(model) = std::env::var("COMPLETION_MODEL") {
      cfg.remote.model = model;
    }
    if let Some(secs) = std::env::var("COMPLETION_TIMEOUT_SECS").ok().as_deref().and_then(parse_timeout_secs) {
      cfg.remote.timeout_secs = secs;
    }
    cfg
  }
}

/// Positive whole seconds. A zero timeout would fail every call, so it is ignored.
fn parse_timeout_secs(s: &str) -> Option<u64> {
  s.trim().parse::<u64>().ok().filter(|secs| *secs > 0)
}

/// Attempt to load a `GeneratorConfig` from TRAINFORGE_CONFIG_PATH. On any parsing/IO error, returns None.
fn load_config_file_from_env() -> Option<GeneratorConfig> {
  let path = std::env::var("TRAINFORGE_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match GeneratorConfig::from_toml_str(&s) {
      Ok(cfg) => {
        info!(target: "trainforge", %path, "Loaded generator config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "trainforge", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "trainforge", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timeout_override_must_be_positive() {
    assert_eq!(parse_timeout_secs("30"), Some(30));
    assert_eq!(parse_timeout_secs(" 45 "), Some(45));
    assert_eq!(parse_timeout_secs("0"), None);
    assert_eq!(parse_timeout_secs("-5"), None);
    assert_eq!(parse_timeout_secs("soon"), None);
  }

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg = GeneratorConfig::from_toml_str(
      r#"
        skeleton_threshold = 6

        [remote]
        model = "some/model"
        api_key = "ignored"

        [vocabulary]
        week = "Неделя"
        lesson = "Занятие"
      "#,
    )
    .expect("valid toml");

    assert_eq!(cfg.skeleton_threshold, 6);
    assert_eq!(cfg.remote.model, "some/model");
    assert_eq!(cfg.remote.timeout_secs, 90);
    assert!(cfg.remote.api_key.is_none());
    assert_eq!(cfg.vocabulary.week, "Неделя");
    assert_eq!(cfg.vocabulary.scene, "Scene");
    assert!(cfg.prompts.system.contains("{language}"));
  }

  #[test]
  fn empty_toml_is_default() {
    let cfg = GeneratorConfig::from_toml_str("").expect("empty is valid");
    assert_eq!(cfg.skeleton_threshold, 4);
    assert_eq!(cfg.remote.detailed_max_new_tokens, 1500);
  }
}

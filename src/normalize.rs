//! Turning loosely-typed model JSON into a `ContentTree`, and keeping trees well-formed.
//!
//! Model output is coerced field by field (numbers from numbers or numeric strings,
//! strings trimmed, missing ids assigned by position). `normalize_tree` is idempotent:
//! running it on its own output changes nothing. `validate` checks the tree invariants.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::config::Vocabulary;
use crate::domain::{
  ContentKind, ContentTree, DetailLevel, Difficulty, GenerationRequest, Item, ItemKind, Provenance, Section,
  StructuralParams, MAX_SCORE_DELTA,
};
use crate::error::GenerationError;
use crate::util::position_letter;

// -------- Coercion helpers --------

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
  keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

/// Integer from a JSON number or a numeric string.
fn coerce_int(v: Option<&Value>) -> Option<i64> {
  match v? {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
    Value::String(s) => {
      let s = s.trim();
      s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
    }
    _ => None,
  }
}

/// Positive ordinal, or `None` so the caller can fall back to position.
fn coerce_ordinal(v: Option<&Value>) -> Option<i64> {
  coerce_int(v).filter(|n| *n > 0)
}

fn coerce_text(v: Option<&Value>) -> String {
  match v {
    Some(Value::String(s)) => s.trim().to_string(),
    Some(Value::Number(n)) => n.to_string(),
    Some(Value::Bool(b)) => b.to_string(),
    _ => String::new(),
  }
}

fn non_empty(s: String) -> Option<String> {
  if s.is_empty() { None } else { Some(s) }
}

fn trim_opt(s: &Option<String>) -> Option<String> {
  s.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

fn empty_object() -> Map<String, Value> {
  Map::new()
}

// -------- Raw model output → tree --------

/// Build a course from the array-of-lessons shape:
/// `[{"week":1,"lessonNumber":1,"title":"...","theory":"...","practice":"..."}, ...]`.
/// Lessons are grouped by week; weeks are re-indexed contiguously from `first_section`.
pub fn course_from_value(value: &Value, req: &GenerationRequest) -> Result<ContentTree, GenerationError> {
  let lessons = value
    .as_array()
    .ok_or_else(|| GenerationError::Shape("course output is not an array".into()))?;

  let fallback_week = req.params.first_section.max(1) as i64;
  let mut weeks: BTreeMap<i64, Vec<(i64, usize, Item)>> = BTreeMap::new();
  let blank = empty_object();

  for (seq, raw) in lessons.iter().enumerate() {
    let obj = raw.as_object().unwrap_or(&blank);
    let week = coerce_ordinal(field(obj, &["week", "weekNumber", "section"])).unwrap_or(fallback_week);
    let bucket = weeks.entry(week).or_default();
    let lesson_no = coerce_ordinal(field(obj, &["lessonNumber", "lesson", "number"])).unwrap_or(bucket.len() as i64 + 1);

    let item = Item {
      local_id: coerce_text(field(obj, &["id", "localId"])),
      title: coerce_text(field(obj, &["title", "name"])),
      body: non_empty(coerce_text(field(obj, &["theory", "body"]))),
      task: non_empty(coerce_text(field(obj, &["practice", "task"]))),
      ..Default::default()
    };
    bucket.push((lesson_no, seq, item));
  }

  let sections = weeks
    .into_values()
    .zip(req.params.first_section.max(1)..)
    .map(|(mut lessons, index)| {
      lessons.sort_by_key(|(no, seq, _)| (*no, *seq));
      Section {
        index,
        items: lessons.into_iter().map(|(_, _, item)| item).collect(),
        ..Default::default()
      }
    })
    .collect();

  Ok(ContentTree {
    kind: ContentKind::Course,
    title: req.topic.trim().to_string(),
    summary: None,
    difficulty: Difficulty::default(),
    sections,
    provenance: Provenance::default(),
  })
}

/// Build a scenario from the object shape:
/// `{"title":..,"summary":..,"difficulty":..,"scenes":[{"id":1,"title":..,"description":..,
///   "choices":[{"id":"a","text":..,"consequenceType":..,"consequenceText":..,"scoreDelta":..}],
///   "defaultChoiceId":"a"}]}`.
pub fn scenario_from_value(value: &Value, req: &GenerationRequest) -> Result<ContentTree, GenerationError> {
  let obj = value
    .as_object()
    .ok_or_else(|| GenerationError::Shape("scenario output is not an object".into()))?;
  let scenes = field(obj, &["scenes", "sections"])
    .and_then(Value::as_array)
    .ok_or_else(|| GenerationError::Shape("scenario output has no scenes array".into()))?;

  let blank = empty_object();
  let mut keyed: Vec<(i64, usize, Section)> = scenes
    .iter()
    .enumerate()
    .map(|(pos, raw)| {
      let scene = raw.as_object().unwrap_or(&blank);
      let order = coerce_ordinal(field(scene, &["id", "index", "sceneNumber"])).unwrap_or(pos as i64 + 1);
      let items = field(scene, &["choices", "items"])
        .and_then(Value::as_array)
        .map(|choices| choices.iter().map(|c| choice_from_value(c.as_object().unwrap_or(&blank))).collect())
        .unwrap_or_default();

      let section = Section {
        index: 0,
        title: coerce_text(field(scene, &["title", "name"])),
        body: non_empty(coerce_text(field(scene, &["description", "body"]))),
        items,
        default_item: non_empty(coerce_text(field(scene, &["defaultChoiceId", "defaultItem"]))),
      };
      (order, pos, section)
    })
    .collect();

  keyed.sort_by_key(|(order, pos, _)| (*order, *pos));
  let sections = keyed
    .into_iter()
    .zip(req.params.first_section.max(1)..)
    .map(|((_, _, mut s), index)| {
      s.index = index;
      s
    })
    .collect();

  let title = non_empty(coerce_text(field(obj, &["title"]))).unwrap_or_else(|| req.topic.trim().to_string());
  let difficulty = match coerce_text(field(obj, &["difficulty"])).to_ascii_lowercase().as_str() {
    "easy" => Difficulty::Easy,
    "hard" => Difficulty::Hard,
    _ => Difficulty::Medium,
  };

  Ok(ContentTree {
    kind: ContentKind::Scenario,
    title,
    summary: non_empty(coerce_text(field(obj, &["summary"]))),
    difficulty,
    sections,
    provenance: Provenance::default(),
  })
}

fn choice_from_value(c: &Map<String, Value>) -> Item {
  Item {
    local_id: coerce_text(field(c, &["id", "localId"])),
    title: coerce_text(field(c, &["text", "title"])),
    kind: ItemKind::parse_loose(&coerce_text(field(c, &["consequenceType", "kind"]))),
    consequence: non_empty(coerce_text(field(c, &["consequenceText", "consequence"]))),
    score_delta: coerce_int(field(c, &["scoreDelta", "score"])).map_or(0, clamp_score),
    default_flag: matches!(field(c, &["default", "defaultFlag"]), Some(Value::Bool(true))),
    ..Default::default()
  }
}

// -------- Tree normalization --------

/// Drop sections and items beyond the requested counts.
pub fn truncate_to(tree: &mut ContentTree, params: &StructuralParams) {
  tree.sections.truncate(params.sections as usize);
  for s in &mut tree.sections {
    s.items.truncate(params.items_per_section as usize);
  }
}

/// Trim text, fill empty titles, assign missing/duplicate ids, re-derive each section's default.
/// Sections keep their indices when those are already valid (≥ 1, strictly increasing).
pub fn normalize_tree(mut tree: ContentTree, vocab: &Vocabulary) -> ContentTree {
  let kind = tree.kind;
  tree.title = match tree.title.trim() {
    "" => kind.placeholder().to_string(),
    t => t.to_string(),
  };
  tree.summary = trim_opt(&tree.summary);

  tree.sections.sort_by_key(|s| s.index);
  let ordered = tree.sections.first().map_or(true, |s| s.index >= 1)
    && tree.sections.windows(2).all(|w| w[0].index < w[1].index);
  if !ordered {
    for (pos, s) in tree.sections.iter_mut().enumerate() {
      s.index = pos as u32 + 1;
    }
  }

  for s in &mut tree.sections {
    s.title = match s.title.trim() {
      "" => format!("{} {}", vocab.section_label(kind), s.index),
      t => t.to_string(),
    };
    s.body = trim_opt(&s.body);
    normalize_items(&mut s.items, vocab.item_label(kind));
    s.default_item = resolve_default(s);
    let default = s.default_item.clone();
    for item in &mut s.items {
      item.default_flag = default.as_deref() == Some(item.local_id.as_str());
    }
  }
  tree
}

fn normalize_items(items: &mut [Item], label: &str) {
  let mut used: HashSet<String> = HashSet::new();
  let mut missing = Vec::new();

  for (pos, item) in items.iter_mut().enumerate() {
    item.title = match item.title.trim() {
      "" => format!("{} {}", label, pos + 1),
      t => t.to_string(),
    };
    item.body = trim_opt(&item.body);
    item.task = trim_opt(&item.task);
    item.consequence = trim_opt(&item.consequence);
    item.score_delta = clamp_score(item.score_delta);

    let id = item.local_id.trim().to_string();
    if !id.is_empty() && used.insert(id.clone()) {
      item.local_id = id;
    } else {
      missing.push(pos);
    }
  }

  for pos in missing {
    let mut k = pos;
    loop {
      let candidate = position_letter(k);
      if used.insert(candidate.clone()) {
        items[pos].local_id = candidate;
        break;
      }
      k += 1;
    }
  }
}

fn clamp_score(delta: i64) -> i64 {
  delta.clamp(-MAX_SCORE_DELTA, MAX_SCORE_DELTA)
}

fn resolve_default(s: &Section) -> Option<String> {
  let wanted = s.default_item.as_deref().map(str::trim);
  wanted
    .and_then(|id| s.item(id))
    .or_else(|| s.items.iter().find(|i| i.default_flag))
    .or_else(|| s.items.first())
    .map(|i| i.local_id.clone())
}

// -------- Validation --------

/// Check tree invariants. With `expected`, also check the section/item counts and indices.
pub fn validate(tree: &ContentTree, expected: Option<&StructuralParams>) -> Result<(), GenerationError> {
  if tree.sections.is_empty() {
    return Err(GenerationError::Shape("tree has no sections".into()));
  }
  if tree.sections[0].index < 1 {
    return Err(GenerationError::Shape("section index must be >= 1".into()));
  }
  if !tree.sections.windows(2).all(|w| w[0].index < w[1].index) {
    return Err(GenerationError::Shape("section indices are not strictly increasing".into()));
  }

  for s in &tree.sections {
    if s.items.is_empty() {
      return Err(GenerationError::Shape(format!("section {} has no items", s.index)));
    }
    let mut seen = HashSet::new();
    for item in &s.items {
      if item.local_id.is_empty() || !seen.insert(item.local_id.as_str()) {
        return Err(GenerationError::Shape(format!("section {} has a missing or duplicate item id", s.index)));
      }
    }
    let default = s
      .default_item
      .as_deref()
      .ok_or_else(|| GenerationError::Shape(format!("section {} has no default item", s.index)))?;
    if s.item(default).is_none() {
      return Err(GenerationError::Shape(format!("section {} default '{}' does not exist", s.index, default)));
    }
    if s.items.iter().any(|i| i.default_flag != (i.local_id == default)) {
      return Err(GenerationError::Shape(format!("section {} default flags disagree with default item", s.index)));
    }
  }

  if let Some(p) = expected {
    let indices: Vec<u32> = tree.sections.iter().map(|s| s.index).collect();
    let wanted: Vec<u32> = p.section_indices().collect();
    if indices != wanted {
      return Err(GenerationError::Shape(format!("expected sections {:?}, got {:?}", wanted, indices)));
    }
    if let Some(s) = tree.sections.iter().find(|s| s.items.len() != p.items_per_section as usize) {
      return Err(GenerationError::Shape(format!(
        "section {} has {} items, expected {}",
        s.index,
        s.items.len(),
        p.items_per_section
      )));
    }
  }
  Ok(())
}

/// Detailed content must actually carry detail: lesson theory for courses, a correct
/// choice per scene for scenarios.
pub fn validate_detail(tree: &ContentTree, detail: DetailLevel) -> Result<(), GenerationError> {
  if detail == DetailLevel::Skeleton {
    return Ok(());
  }
  for s in &tree.sections {
    match tree.kind {
      ContentKind::Course => {
        if s.items.iter().any(|i| i.body.is_none()) {
          return Err(GenerationError::Shape(format!("week {} has lessons without theory", s.index)));
        }
      }
      ContentKind::Scenario => {
        if !s.items.iter().any(|i| i.kind == ItemKind::Correct) {
          return Err(GenerationError::Shape(format!("scene {} has no correct choice", s.index)));
        }
      }
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn req(kind: ContentKind, sections: u32, items: u32, detail: DetailLevel) -> GenerationRequest {
    GenerationRequest { kind, topic: " Fire safety ".into(), params: StructuralParams::new(sections, items), detail }
  }

  #[test]
  fn course_lessons_grouped_and_coerced() {
    let raw = json!([
      {"week": "2", "lessonNumber": 2, "title": " B2 ", "theory": "t", "practice": "p"},
      {"week": 1, "lessonNumber": "1", "title": "A1", "theory": "t"},
      {"week": 2, "lessonNumber": 1, "title": "B1", "theory": "t"},
      {"title": "no week", "theory": "t"},
    ]);
    let r = req(ContentKind::Course, 2, 2, DetailLevel::Detailed);
    let tree = normalize_tree(course_from_value(&raw, &r).unwrap(), &Vocabulary::default());

    assert_eq!(tree.title, "Fire safety");
    assert_eq!(tree.sections.len(), 2);
    let titles: Vec<_> = tree.sections[0].items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["A1", "no week"]);
    let titles: Vec<_> = tree.sections[1].items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["B1", "B2"]);
    assert_eq!(tree.sections[1].items[1].task.as_deref(), Some("p"));
    assert_eq!(tree.sections[1].items[0].task, None);
    assert_eq!(tree.sections[0].items[1].local_id, "b");
    assert_eq!(tree.sections[0].default_item.as_deref(), Some("a"));
    validate(&tree, Some(&r.params)).expect("valid");
  }

  #[test]
  fn sparse_weeks_become_contiguous() {
    let raw = json!([{"week": 3, "title": "x"}, {"week": 9, "title": "y"}]);
    let tree = course_from_value(&raw, &req(ContentKind::Course, 2, 1, DetailLevel::Skeleton)).unwrap();
    assert_eq!(tree.sections.iter().map(|s| s.index).collect::<Vec<_>>(), vec![1, 2]);
  }

  #[test]
  fn scenario_object_parsed() {
    let raw = json!({
      "title": "Evacuation",
      "difficulty": "HARD",
      "scenes": [
        {"id": 2, "title": "Stairs", "choices": [
          {"id": "a", "text": "Run", "consequenceType": "fatal", "scoreDelta": "-10"},
          {"id": "b", "text": "Walk", "consequenceType": "correct", "scoreDelta": 10}
        ], "defaultChoiceId": "b"},
        {"id": 1, "title": "Alarm", "description": "  It rings  ", "choices": [
          {"text": "Leave", "consequenceType": "correct", "scoreDelta": 10},
          {"text": "Ignore", "consequenceType": "warning", "scoreDelta": -2.0}
        ]}
      ]
    });
    let r = req(ContentKind::Scenario, 2, 2, DetailLevel::Detailed);
    let tree = normalize_tree(scenario_from_value(&raw, &r).unwrap(), &Vocabulary::default());

    assert_eq!(tree.title, "Evacuation");
    assert_eq!(tree.difficulty, Difficulty::Hard);
    assert_eq!(tree.sections[0].title, "Alarm");
    assert_eq!(tree.sections[0].body.as_deref(), Some("It rings"));
    assert_eq!(tree.sections[0].items[1].local_id, "b");
    assert_eq!(tree.sections[0].items[1].score_delta, -2);
    assert_eq!(tree.sections[1].default_item.as_deref(), Some("b"));
    assert!(tree.sections[1].items[1].default_flag);
    assert_eq!(tree.sections[1].items[0].score_delta, -10);
    validate(&tree, Some(&r.params)).expect("valid");
    validate_detail(&tree, DetailLevel::Detailed).expect("detailed");
  }

  #[test]
  fn oversized_score_deltas_are_bounded() {
    let raw = json!({"scenes": [{"choices": [
      {"text": "a", "consequenceType": "correct", "scoreDelta": 9e18},
      {"text": "b", "consequenceType": "fatal", "scoreDelta": "-9223372036854775808"}
    ]}]});
    let r = req(ContentKind::Scenario, 1, 2, DetailLevel::Detailed);
    let tree = normalize_tree(scenario_from_value(&raw, &r).unwrap(), &Vocabulary::default());
    assert_eq!(tree.sections[0].items[0].score_delta, MAX_SCORE_DELTA);
    assert_eq!(tree.sections[0].items[1].score_delta, -MAX_SCORE_DELTA);

    let mut s = Section { index: 1, items: vec![Item { score_delta: i64::MAX, ..Default::default() }], ..Default::default() };
    normalize_items(&mut s.items, "Option");
    assert_eq!(s.items[0].score_delta, MAX_SCORE_DELTA);
  }

  #[test]
  fn scenario_without_scenes_is_shape_error() {
    let r = req(ContentKind::Scenario, 1, 1, DetailLevel::Detailed);
    assert!(matches!(scenario_from_value(&json!({"title": "x"}), &r), Err(GenerationError::Shape(_))));
    assert!(matches!(course_from_value(&json!({"a": 1}), &r), Err(GenerationError::Shape(_))));
  }

  #[test]
  fn duplicate_and_missing_ids_are_reassigned() {
    let mut s = Section {
      index: 1,
      title: "s".into(),
      items: vec![
        Item { local_id: "b".into(), title: "x".into(), ..Default::default() },
        Item { local_id: "b".into(), title: "y".into(), ..Default::default() },
        Item { local_id: " ".into(), title: "z".into(), ..Default::default() },
      ],
      default_item: Some("missing".into()),
      ..Default::default()
    };
    normalize_items(&mut s.items, "Option");
    let ids: Vec<_> = s.items.iter().map(|i| i.local_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "d"]);
    assert_eq!(resolve_default(&s).as_deref(), Some("b"));
  }

  #[test]
  fn normalization_is_idempotent() {
    let raw = json!({
      "scenes": [
        {"title": "  ", "choices": [{"text": ""}, {"id": "a", "text": "dup"}, {"id": "a", "default": true}]},
        {"id": 0, "choices": [{"id": "z", "consequenceType": "Correct"}]}
      ]
    });
    let r = req(ContentKind::Scenario, 2, 3, DetailLevel::Detailed);
    let once = normalize_tree(scenario_from_value(&raw, &r).unwrap(), &Vocabulary::default());
    let twice = normalize_tree(once.clone(), &Vocabulary::default());
    assert_eq!(once, twice);
    validate(&once, None).expect("valid after normalization");
  }

  #[test]
  fn invalid_indices_are_renumbered() {
    let tree = ContentTree {
      sections: vec![
        Section { index: 0, items: vec![Item::default()], ..Default::default() },
        Section { index: 0, items: vec![Item::default()], ..Default::default() },
      ],
      ..Default::default()
    };
    let tree = normalize_tree(tree, &Vocabulary::default());
    assert_eq!(tree.sections.iter().map(|s| s.index).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(tree.sections[1].title, "Week 2");
    assert_eq!(tree.sections[1].items[0].title, "Lesson 1");
    assert_eq!(tree.title, "Course");
  }

  #[test]
  fn validate_rejects_count_mismatch_and_empty() {
    let r = req(ContentKind::Course, 2, 2, DetailLevel::Skeleton);
    let raw = json!([{"week": 1, "title": "a"}, {"week": 1, "title": "b"}]);
    let tree = normalize_tree(course_from_value(&raw, &r).unwrap(), &Vocabulary::default());
    assert!(validate(&tree, None).is_ok());
    assert!(matches!(validate(&tree, Some(&r.params)), Err(GenerationError::Shape(_))));

    let empty = course_from_value(&json!([]), &r).unwrap();
    assert!(matches!(validate(&empty, None), Err(GenerationError::Shape(_))));
  }

  #[test]
  fn detail_checks() {
    let r = req(ContentKind::Scenario, 1, 2, DetailLevel::Detailed);
    let raw = json!({"scenes": [{"choices": [{"text": "a"}, {"text": "b"}]}]});
    let tree = normalize_tree(scenario_from_value(&raw, &r).unwrap(), &Vocabulary::default());
    assert!(validate_detail(&tree, DetailLevel::Skeleton).is_ok());
    assert!(matches!(validate_detail(&tree, DetailLevel::Detailed), Err(GenerationError::Shape(_))));
  }
}

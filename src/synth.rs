//! Deterministic offline generator. Guarantees the pipeline is useful without a model.
//!
//! No I/O, no randomness: the same request and vocabulary always produce the same tree,
//! and every produced tree satisfies the invariants checked by `normalize::validate`.

use crate::config::Vocabulary;
use crate::domain::{ContentKind, ContentTree, DetailLevel, GenerationRequest, Item, ItemKind, Provenance, Section};
use crate::util::position_letter;

const SKELETON_KEYWORDS: usize = 4;
const DETAILED_KEYWORDS: usize = 3;

pub const CORRECT_DELTA: i64 = 10;
pub const WARNING_DELTA: i64 = -2;
pub const FATAL_DELTA: i64 = -10;

/// Short phrase derived from the first `max_tokens` words of the topic.
/// Falls back to the trimmed topic, then to the kind's placeholder noun.
pub fn keyword_phrase(topic: &str, max_tokens: usize, kind: ContentKind) -> String {
  let base = topic.trim();
  let phrase = base
    .split_whitespace()
    .take(max_tokens)
    .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
    .filter(|w| !w.is_empty())
    .collect::<Vec<_>>()
    .join(" ");

  if !phrase.is_empty() {
    phrase
  } else if !base.is_empty() {
    base.to_string()
  } else {
    kind.placeholder().to_string()
  }
}

/// Outcome assigned to the item at `pos` of a detailed scenario section.
pub fn outcome_for_position(pos: usize) -> (ItemKind, i64) {
  match pos {
    0 => (ItemKind::Correct, CORRECT_DELTA),
    1 => (ItemKind::Warning, WARNING_DELTA),
    _ => (ItemKind::Fatal, FATAL_DELTA),
  }
}

pub fn section_title(vocab: &Vocabulary, kind: ContentKind, phrase: &str, index: u32) -> String {
  format!("{} — {} {}", phrase, vocab.section_label(kind), index)
}

pub fn item_title(vocab: &Vocabulary, kind: ContentKind, phrase: &str, section: u32, item: u32) -> String {
  format!("{} — {} {}, {} {}", phrase, vocab.section_label(kind), section, vocab.item_label(kind), item)
}

/// Build a complete tree for `req` without any network dependency.
pub fn synthesize(req: &GenerationRequest, vocab: &Vocabulary) -> ContentTree {
  let params = req.params.clamped();
  let kind = req.kind;
  let detailed = req.detail == DetailLevel::Detailed;
  let phrase = keyword_phrase(
    &req.topic,
    if detailed { DETAILED_KEYWORDS } else { SKELETON_KEYWORDS },
    kind,
  );

  let mut step = 1u32;
  let sections = params
    .section_indices()
    .map(|index| {
      let items: Vec<Item> = (0..params.items_per_section as usize)
        .map(|pos| {
          let number = pos as u32 + 1;
          let title = item_title(vocab, kind, &phrase, index, number);
          let mut item = Item {
            local_id: position_letter(pos),
            default_flag: pos == 0,
            ..Default::default()
          };

          if detailed {
            match kind {
              ContentKind::Course => {
                item.body = Some(format!("{}: {}. {} {} (step {}).", vocab.theory_prefix, title, vocab.key_idea, phrase, step));
                item.task = Some(format!("{} \"{}\".", vocab.practice_prefix, title));
              }
              ContentKind::Scenario => {
                let (k, delta) = outcome_for_position(pos);
                item.kind = k;
                item.score_delta = delta;
                item.consequence = Some(match k {
                  ItemKind::Correct => vocab.correct_consequence.clone(),
                  ItemKind::Warning => vocab.warning_consequence.clone(),
                  _ => vocab.fatal_consequence.clone(),
                });
              }
            }
          }
          item.title = title;
          step += 1;
          item
        })
        .collect();

      let body = match (detailed, kind) {
        (true, ContentKind::Scenario) => {
          Some(format!("{} {}: {}. {}", vocab.situation_prefix, index, phrase, "Choose how to act."))
        }
        _ => None,
      };

      Section {
        index,
        title: section_title(vocab, kind, &phrase, index),
        body,
        default_item: items.first().map(|i| i.local_id.clone()),
        items,
      }
    })
    .collect();

  let title = match req.topic.trim() {
    "" => kind.placeholder().to_string(),
    t => t.to_string(),
  };

  ContentTree {
    kind,
    title,
    summary: None,
    difficulty: Default::default(),
    sections,
    provenance: Provenance { generated: false, ..Default::default() },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::StructuralParams;
  use crate::normalize::validate;

  fn req(kind: ContentKind, topic: &str, sections: u32, items: u32, detail: DetailLevel) -> GenerationRequest {
    GenerationRequest { kind, topic: topic.into(), params: StructuralParams::new(sections, items), detail }
  }

  #[test]
  fn keyword_phrase_strips_and_limits() {
    assert_eq!(keyword_phrase("Fire safety: evacuation drills at work", 3, ContentKind::Course), "Fire safety evacuation");
    assert_eq!(keyword_phrase("  Пожарная   безопасность! ", 4, ContentKind::Course), "Пожарная безопасность");
    assert_eq!(keyword_phrase("1984 ??? 2025", 4, ContentKind::Course), "1984 2025");
  }

  #[test]
  fn keyword_phrase_degenerate_topics() {
    assert_eq!(keyword_phrase("", 4, ContentKind::Course), "Course");
    assert_eq!(keyword_phrase("   \t ", 4, ContentKind::Scenario), "Scenario");
    assert_eq!(keyword_phrase("!!! ---", 4, ContentKind::Course), "!!! ---");
  }

  #[test]
  fn skeleton_has_titles_only() {
    let tree = synthesize(&req(ContentKind::Course, "Rust ownership", 3, 2, DetailLevel::Skeleton), &Vocabulary::default());
    assert_eq!(tree.sections.len(), 3);
    assert_eq!(tree.sections[1].items[1].title, "Rust ownership — Week 2, Lesson 2");
    assert!(tree.sections.iter().flat_map(|s| &s.items).all(|i| i.body.is_none() && i.task.is_none()));
    assert!(!tree.provenance.generated);
    validate(&tree, None).expect("skeleton valid");
  }

  #[test]
  fn detailed_course_has_theory_and_practice() {
    let tree = synthesize(&req(ContentKind::Course, "Rust ownership and borrowing", 2, 2, DetailLevel::Detailed), &Vocabulary::default());
    let last = &tree.sections[1].items[1];
    assert_eq!(last.title, "Rust ownership and — Week 2, Lesson 2");
    assert!(last.body.as_deref().unwrap_or_default().contains("(step 4)"));
    assert!(last.task.as_deref().unwrap_or_default().contains(&last.title));
  }

  #[test]
  fn detailed_scenario_assigns_outcomes_by_position() {
    let tree = synthesize(&req(ContentKind::Scenario, "Office fire", 2, 4, DetailLevel::Detailed), &Vocabulary::default());
    for s in &tree.sections {
      let kinds: Vec<_> = s.items.iter().map(|i| (i.kind, i.score_delta)).collect();
      assert_eq!(kinds, vec![
        (ItemKind::Correct, 10),
        (ItemKind::Warning, -2),
        (ItemKind::Fatal, -10),
        (ItemKind::Fatal, -10),
      ]);
      assert_eq!(s.default_item.as_deref(), Some("a"));
      assert!(s.items[0].default_flag && !s.items[1].default_flag);
      assert!(s.body.is_some());
    }
    validate(&tree, None).expect("scenario valid");
  }

  #[test]
  fn degenerate_topics_still_produce_valid_trees() {
    for topic in ["", "   ", "12345", "?!#", "😀 🔥"] {
      for kind in [ContentKind::Course, ContentKind::Scenario] {
        for detail in [DetailLevel::Skeleton, DetailLevel::Detailed] {
          let tree = synthesize(&req(kind, topic, 5, 3, detail), &Vocabulary::default());
          validate(&tree, None).unwrap_or_else(|e| panic!("{topic:?} {kind:?} {detail:?}: {e}"));
          assert!(!tree.title.is_empty());
        }
      }
    }
  }

  #[test]
  fn synthesis_is_deterministic() {
    let r = req(ContentKind::Scenario, "Flood at the warehouse", 3, 3, DetailLevel::Detailed);
    assert_eq!(synthesize(&r, &Vocabulary::default()), synthesize(&r, &Vocabulary::default()));
  }

  #[test]
  fn respects_first_section_offset() {
    let mut r = req(ContentKind::Course, "Algebra", 1, 2, DetailLevel::Detailed);
    r.params.first_section = 7;
    let tree = synthesize(&r, &Vocabulary::default());
    assert_eq!(tree.sections.len(), 1);
    assert_eq!(tree.sections[0].index, 7);
    assert_eq!(tree.sections[0].items[0].title, "Algebra — Week 7, Lesson 1");
  }
}

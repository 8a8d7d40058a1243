//! Cards document parsing.
//!
//! A cards document is UTF-8 markdown: card blocks separated by a line
//! containing only `---`, each block opening with a heading like
//! `# 卡片1A` (or the `# Card 1A` spelling), sections introduced by
//! second-level headings, and optional stage metadata in an HTML comment.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::model::{Card, StageMeta};
use super::role::{CardRole, RoleMap};
use crate::error::{Result, ScenaError};

static CARD_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#\s*(?:卡片|[Cc]ard\s*)(\d+)([A-Za-z])\s*$").expect("card heading regex")
});
static STAGE_META: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--\s*STAGE_META:\s*(\{.*?\})\s*-->").expect("stage meta regex"));

/// Parses cards documents and orders cards for execution.
#[derive(Debug, Clone, Default)]
pub struct CardLoader {
    role_map: RoleMap,
}

impl CardLoader {
    /// Creates a loader with the default `{A: dialogue, B: transition}` map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader with a caller-supplied tag-to-role mapping.
    pub fn with_role_map(role_map: RoleMap) -> Self {
        Self { role_map }
    }

    /// The tag-to-role mapping this loader partitions with.
    pub fn role_map(&self) -> &RoleMap {
        &self.role_map
    }

    /// Parses a cards document into structured cards.
    ///
    /// Blocks without a recognizable card heading are discarded. Duplicate
    /// `(stage_num, card_type)` pairs and documents with zero dialogue-role
    /// cards are hard errors; everything else degrades to empty sections
    /// and default metadata.
    pub fn parse(&self, text: &str) -> Result<Vec<Card>> {
        let mut cards = Vec::new();
        let mut seen: HashSet<(u32, char)> = HashSet::new();

        for block in split_blocks(text) {
            let Some(caps) = CARD_HEADING.captures(block) else {
                debug!("discarding block without card heading");
                continue;
            };
            let stage_num: u32 = caps[1]
                .parse()
                .map_err(|_| ScenaError::card_parse(format!("invalid stage number: {}", &caps[1])))?;
            let card_type = caps[2].chars().next().unwrap_or('A').to_ascii_uppercase();

            if !seen.insert((stage_num, card_type)) {
                return Err(ScenaError::card_parse(format!(
                    "duplicate card {stage_num}{card_type}"
                )));
            }

            cards.push(parse_block(block, stage_num, card_type, caps[0].trim()));
        }

        let dialogue_count = cards
            .iter()
            .filter(|c| self.role_map.role_of(c.card_type) == Some(CardRole::Dialogue))
            .count();
        if dialogue_count == 0 {
            return Err(ScenaError::card_parse(
                "document contains no dialogue-role cards, nothing to simulate",
            ));
        }

        debug!(
            total = cards.len(),
            dialogue = dialogue_count,
            "parsed cards document"
        );
        Ok(cards)
    }

    /// Returns cards in execution order: ascending stage number, then the
    /// caller-specified type order within a stage (default: dialogue tags
    /// before transition tags). `(stage, type)` pairs absent from the input
    /// are skipped; sparse stage numbering is legal.
    pub fn card_sequence(&self, cards: &[Card], type_order: Option<&[char]>) -> Vec<Card> {
        let default_order = self.role_map.default_type_order();
        let order: &[char] = type_order.unwrap_or(&default_order);

        let mut stages: Vec<u32> = cards.iter().map(|c| c.stage_num).collect();
        stages.sort_unstable();
        stages.dedup();

        let mut sequence = Vec::new();
        for stage in stages {
            for &tag in order {
                if let Some(card) = cards
                    .iter()
                    .find(|c| c.stage_num == stage && c.card_type == tag)
                {
                    sequence.push(card.clone());
                }
            }
        }
        sequence
    }

    /// Partitions cards into dialogue-role and transition-role lists, each
    /// sorted by ascending stage number. Cards with unmapped tags are
    /// dropped from both lists.
    pub fn separate_by_role(&self, cards: &[Card]) -> (Vec<Card>, Vec<Card>) {
        let mut dialogue = Vec::new();
        let mut transition = Vec::new();
        for card in cards {
            match self.role_map.role_of(card.card_type) {
                Some(CardRole::Dialogue) => dialogue.push(card.clone()),
                Some(CardRole::Transition) => transition.push(card.clone()),
                None => warn!(card_id = %card.card_id, "card tag has no mapped role, skipping"),
            }
        }
        dialogue.sort_by_key(|c| c.stage_num);
        transition.sort_by_key(|c| c.stage_num);
        (dialogue, transition)
    }
}

fn split_blocks(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n---\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
}

fn parse_block(block: &str, stage_num: u32, card_type: char, title: &str) -> Card {
    let meta = STAGE_META
        .captures(block)
        .and_then(|caps| match serde_json::from_str::<StageMeta>(&caps[1]) {
            Ok(meta) => Some(meta),
            Err(err) => {
                warn!(%err, "malformed STAGE_META comment, using defaults");
                None
            }
        })
        .unwrap_or_default();

    let mut card = Card {
        card_id: format!("{stage_num}{card_type}"),
        stage_num,
        card_type,
        title: title.trim_start_matches('#').trim().to_string(),
        full_content: block.to_string(),
        role: String::new(),
        context: String::new(),
        interaction: String::new(),
        transition: String::new(),
        constraints: String::new(),
        prologue: String::new(),
        output: String::new(),
        meta,
    };

    for (name, body) in extract_sections(block) {
        match name.as_str() {
            "Role" => card.role = body,
            "Context" => card.context = body,
            "Interaction" => card.interaction = body,
            "Transition" => card.transition = body,
            "Constraints" => card.constraints = body,
            "Prologue" => card.prologue = body,
            "Output" => card.output = body,
            // Unrecognized headings are ignored for forward compatibility.
            other => debug!(heading = other, "ignoring unrecognized section"),
        }
    }

    card
}

/// Extracts `## Name` sections; a section runs until the next second-level
/// heading or end of block.
fn extract_sections(block: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            if let Some((name, body)) = current.take() {
                sections.push((name, body.join("\n").trim().to_string()));
            }
            current = Some((rest.trim().to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((name, body)) = current.take() {
        sections.push((name, body.join("\n").trim().to_string()));
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_STAGE_DOC: &str = "# 卡片1A\n<!-- STAGE_META: {\"stage_name\": \"Opening\", \"interaction_rounds\": 3} -->\n## Role\nYou are the shop mentor.\n## Prologue\nWelcome to the shop.\n\n---\n\n# 卡片1B\n## Output\nThe lights dim as you move to the workbench.\n\n---\n\n# 卡片2A\n## Role\nYou are the inspector.\n";

    #[test]
    fn parses_blocks_and_sections() {
        let loader = CardLoader::new();
        let cards = loader.parse(TWO_STAGE_DOC).unwrap();
        assert_eq!(cards.len(), 3);

        let first = &cards[0];
        assert_eq!(first.card_id, "1A");
        assert_eq!(first.stage_num, 1);
        assert_eq!(first.card_type, 'A');
        assert_eq!(first.role, "You are the shop mentor.");
        assert_eq!(first.prologue, "Welcome to the shop.");
        assert_eq!(first.meta.stage_name, "Opening");
        assert_eq!(first.meta.interaction_rounds, 3);

        let bridge = &cards[1];
        assert_eq!(bridge.card_id, "1B");
        assert!(bridge.output.contains("lights dim"));
    }

    #[test]
    fn accepts_english_heading_spelling() {
        let loader = CardLoader::new();
        let cards = loader.parse("# Card 1A\n## Role\nMentor.").unwrap();
        assert_eq!(cards[0].card_id, "1A");
    }

    #[test]
    fn discards_blocks_without_heading() {
        let loader = CardLoader::new();
        let doc = "Some preamble text.\n\n---\n\n# 卡片1A\n## Role\nMentor.";
        let cards = loader.parse(doc).unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn duplicate_identity_is_an_error() {
        let loader = CardLoader::new();
        let doc = "# 卡片1A\n## Role\nOne.\n\n---\n\n# 卡片1A\n## Role\nTwo.";
        let err = loader.parse(doc).unwrap_err();
        assert!(err.is_card_parse());
    }

    #[test]
    fn zero_dialogue_cards_is_an_error() {
        let loader = CardLoader::new();
        let err = loader.parse("# 卡片1B\n## Output\nBridge only.").unwrap_err();
        assert!(err.is_card_parse());
    }

    #[test]
    fn malformed_stage_meta_degrades_to_defaults() {
        let loader = CardLoader::new();
        let doc = "# 卡片1A\n<!-- STAGE_META: {not json} -->\n## Role\nMentor.";
        let cards = loader.parse(doc).unwrap();
        assert_eq!(cards[0].meta, StageMeta::default());
        assert_eq!(cards[0].meta.interaction_rounds, 5);
    }

    #[test]
    fn stage_meta_accepts_model_id_alias() {
        let loader = CardLoader::new();
        let doc = "# 卡片1A\n<!-- STAGE_META: {\"stage_name\": \"Intake\", \"model_id\": \"ward-model\"} -->\n## Role\nMentor.";
        let cards = loader.parse(doc).unwrap();
        assert_eq!(cards[0].meta.model_hint.as_deref(), Some("ward-model"));
    }

    #[test]
    fn sequence_tolerates_sparse_stages() {
        let loader = CardLoader::new();
        let doc = "# 卡片1A\n## Role\nOne.\n\n---\n\n# 卡片3A\n## Role\nThree.";
        let cards = loader.parse(doc).unwrap();
        let seq = loader.card_sequence(&cards, None);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq[0].card_id, "1A");
        assert_eq!(seq[1].card_id, "3A");
    }

    #[test]
    fn sequence_interleaves_dialogue_then_transition() {
        let loader = CardLoader::new();
        let cards = loader.parse(TWO_STAGE_DOC).unwrap();
        let seq = loader.card_sequence(&cards, None);
        let ids: Vec<&str> = seq.iter().map(|c| c.card_id.as_str()).collect();
        assert_eq!(ids, vec!["1A", "1B", "2A"]);
    }

    #[test]
    fn separate_by_role_partitions_and_sorts() {
        let loader = CardLoader::new();
        let cards = loader.parse(TWO_STAGE_DOC).unwrap();
        let (dialogue, transition) = loader.separate_by_role(&cards);
        assert_eq!(dialogue.len(), 2);
        assert_eq!(transition.len(), 1);
        assert_eq!(dialogue[0].stage_num, 1);
        assert_eq!(dialogue[1].stage_num, 2);
    }
}

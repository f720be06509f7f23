//! # Stage 3: Outline Generation
//!
//! Two passes: a prior-knowledge draft from the topic alone, then a
//! refinement grounded in the flattened research dialogues. The refined
//! outline is canonical; an unusable refinement degrades to the draft.

use crate::config::history_limit;
use crate::errors::PipelineError;
use crate::prompts::outline::{
    OUTLINE_DRAFT_SYSTEM_PROMPT, OUTLINE_DRAFT_USER_PROMPT, OUTLINE_REFINE_SYSTEM_PROMPT,
    OUTLINE_REFINE_USER_PROMPT,
};
use crate::providers::ai::LanguageModel;
use crate::types::{InformationTable, Outline, OutlineNode};
use std::sync::Arc;
use tracing::{info, warn};

/// Draft and refined outline of one run. The refined tree is canonical.
#[derive(Debug, Clone)]
pub struct OutlineBundle {
    pub draft: Outline,
    pub refined: Outline,
}

/// Stage 3 generator.
pub struct OutlineGenerator {
    lm: Arc<dyn LanguageModel>,
}

impl OutlineGenerator {
    pub fn new(lm: Arc<dyn LanguageModel>) -> Self {
        Self { lm }
    }

    pub async fn generate(
        &self,
        topic: &str,
        table: &InformationTable,
    ) -> Result<OutlineBundle, PipelineError> {
        let draft_text = self
            .lm
            .complete(
                OUTLINE_DRAFT_SYSTEM_PROMPT,
                &OUTLINE_DRAFT_USER_PROMPT.replace("{topic}", topic),
            )
            .await?;
        let draft = parse_outline(&draft_text);

        let conversations = flatten_conversations(table);
        let refined = if conversations.is_empty() {
            // Nothing was learned (e.g. zero-turn dialogues); refinement
            // would only paraphrase the draft.
            Outline::default()
        } else {
            let refine_prompt = OUTLINE_REFINE_USER_PROMPT
                .replace("{topic}", topic)
                .replace("{draft_outline}", &draft.to_markdown())
                .replace("{conversations}", &conversations);
            let refined_text = self
                .lm
                .complete(OUTLINE_REFINE_SYSTEM_PROMPT, &refine_prompt)
                .await?;
            parse_outline(&refined_text)
        };

        let refined = if refined.is_empty() {
            if !draft.is_empty() {
                warn!("Outline refinement unusable, falling back to the draft");
            }
            draft.clone()
        } else {
            refined
        };

        if refined.is_empty() {
            return Err(PipelineError::EmptyStageOutput {
                stage: "outline generation",
            });
        }
        info!(
            headings = refined.all_headings().len(),
            "Outline generation complete"
        );
        Ok(OutlineBundle { draft, refined })
    }
}

/// Flattens every dialogue into `Writer:`/`Expert:` lines, word-capped
/// from the tail so the earliest exchanges survive. Truncation counts
/// whitespace-separated words, not tokens.
fn flatten_conversations(table: &InformationTable) -> String {
    let flattened = table
        .conversations
        .iter()
        .flat_map(|conversation| {
            conversation.turns.iter().map(|turn| {
                format!("Writer: {}\nExpert: {}", turn.question, turn.answer)
            })
        })
        .collect::<Vec<_>>()
        .join("\n");

    let words: Vec<&str> = flattened.split_whitespace().collect();
    if words.len() <= history_limit::OUTLINE_CONTEXT_WORDS {
        flattened
    } else {
        words[..history_limit::OUTLINE_CONTEXT_WORDS].join(" ")
    }
}

/// Parses heading-only Markdown into an outline tree by leading-`#`
/// count. Lines that are not headings are discarded; levels deeper than
/// four are clamped.
pub fn parse_outline(markdown: &str) -> Outline {
    let headings: Vec<(u8, String)> = markdown
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            let hash_count = trimmed.chars().take_while(|&c| c == '#').count();
            if hash_count == 0 {
                return None;
            }
            let heading = trimmed[hash_count..].trim();
            (!heading.is_empty()).then(|| (hash_count.min(4) as u8, heading.to_string()))
        })
        .collect();

    let mut cursor = 0;
    let nodes = build_subtree(&headings, &mut cursor, 1);
    Outline { nodes }
}

/// Consumes headings at or below `min_level` as siblings, recursing for
/// each node's deeper-level children.
fn build_subtree(headings: &[(u8, String)], cursor: &mut usize, min_level: u8) -> Vec<OutlineNode> {
    let mut nodes = Vec::new();
    while let Some((level, heading)) = headings.get(*cursor) {
        if *level < min_level {
            break;
        }
        *cursor += 1;
        let children = build_subtree(headings, cursor, level + 1);
        nodes.push(OutlineNode {
            heading: heading.clone(),
            level: *level,
            children,
        });
    }
    nodes
}

//! # Stage 4a: Article Generation
//!
//! Drafts one Markdown section per top-level outline heading, in
//! parallel. Evidence is selected locally: the snippets already curated
//! into the information table are embedded once and ranked by cosine
//! similarity against a section-keyed query. The model cites evidence by
//! local index; those markers are remapped to the unified citation index
//! before the section is accepted.

use crate::config::{history_limit, PipelineConfig};
use crate::prompts::article::{SECTION_DRAFT_SYSTEM_PROMPT, SECTION_DRAFT_USER_PROMPT};
use crate::providers::ai::embedding::cosine_similarity;
use crate::providers::ai::{EmbeddingClient, LanguageModel};
use crate::types::{Article, ArticleSection, InformationTable, Outline, OutlineNode};
use futures::StreamExt;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

/// Lead-like headings are not drafted here; the polisher writes the lead.
const LEAD_HEADINGS: [&str; 3] = ["introduction", "conclusion", "summary"];

/// Stage 4a generator.
pub struct ArticleGenerator {
    lm: Arc<dyn LanguageModel>,
    embedder: EmbeddingClient,
    config: PipelineConfig,
}

/// One embedded snippet of the information table.
struct EvidenceEntry {
    url: String,
    embedding: Vec<f32>,
}

impl ArticleGenerator {
    pub fn new(
        lm: Arc<dyn LanguageModel>,
        embedder: EmbeddingClient,
        config: PipelineConfig,
    ) -> Self {
        Self {
            lm,
            embedder,
            config,
        }
    }

    /// Drafts all sections, collected in outline order.
    pub async fn generate(
        &self,
        topic: &str,
        outline: &Outline,
        table: &InformationTable,
    ) -> Article {
        let sections: Vec<&OutlineNode> = outline
            .nodes
            .iter()
            .filter(|node| !is_lead_heading(&node.heading))
            .collect();
        info!(sections = sections.len(), "Drafting article sections");

        let evidence_index = self.build_evidence_index(table).await;

        let drafted: Vec<ArticleSection> = futures::stream::iter(
            sections
                .into_iter()
                .map(|node| self.draft_section(topic, node, table, &evidence_index)),
        )
        .buffered(self.config.max_thread_num.max(1))
        .collect()
        .await;

        Article { sections: drafted }
    }

    /// Embeds every snippet of the table once, in unified-index order.
    async fn build_evidence_index(&self, table: &InformationTable) -> Vec<EvidenceEntry> {
        let mut texts: Vec<(String, String)> = Vec::new();
        for url in table.urls_by_index() {
            if let Some(passage) = table.url_to_info.get(url) {
                for snippet in &passage.snippets {
                    texts.push((url.to_string(), snippet.clone()));
                }
            }
        }
        if texts.is_empty() {
            return Vec::new();
        }

        let inputs: Vec<&str> = texts.iter().map(|(_, text)| text.as_str()).collect();
        match self.embedder.embed_batch(&inputs).await {
            Ok(embeddings) => texts
                .into_iter()
                .zip(embeddings)
                .map(|((url, _), embedding)| EvidenceEntry { url, embedding })
                .collect(),
            Err(e) => {
                warn!("Snippet embedding failed; sections will draft without evidence: {e}");
                Vec::new()
            }
        }
    }

    async fn draft_section(
        &self,
        topic: &str,
        node: &OutlineNode,
        table: &InformationTable,
        evidence_index: &[EvidenceEntry],
    ) -> ArticleSection {
        let heading_line = format!("# {}", node.heading);
        let query = section_query(node);
        let selected = self.select_evidence(&query, evidence_index).await;

        let evidence_text = render_evidence(&selected, table);
        let user_prompt = SECTION_DRAFT_USER_PROMPT
            .replace("{topic}", topic)
            .replace("{section_heading}", &heading_line)
            .replace("{evidence}", &evidence_text);

        let drafted = match self
            .lm
            .complete(SECTION_DRAFT_SYSTEM_PROMPT, &user_prompt)
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Section drafting failed for '{}': {e}", node.heading);
                String::new()
            }
        };

        // An empty draft is kept as a heading-only section.
        let markdown = if drafted.is_empty() {
            heading_line.clone()
        } else {
            let remapped = remap_citations(&drafted, &selected, table);
            enforce_heading(&remapped, &heading_line)
        };

        ArticleSection {
            heading: node.heading.clone(),
            level: node.level,
            markdown,
        }
    }

    /// Top `retrieve_top_k` URLs by best-snippet cosine similarity.
    async fn select_evidence(&self, query: &str, evidence_index: &[EvidenceEntry]) -> Vec<String> {
        if evidence_index.is_empty() {
            return Vec::new();
        }
        let query_embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Query embedding failed for '{query}': {e}");
                return Vec::new();
            }
        };

        let mut best: Vec<(String, f64)> = Vec::new();
        for entry in evidence_index {
            let score = cosine_similarity(&query_embedding, &entry.embedding);
            match best.iter_mut().find(|(url, _)| url == &entry.url) {
                Some((_, existing)) => *existing = existing.max(score),
                None => best.push((entry.url.clone(), score)),
            }
        }
        best.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        best.truncate(self.config.retrieve_top_k);
        best.into_iter().map(|(url, _)| url).collect()
    }
}

/// The heading and all of its subheadings, space-joined, as the evidence
/// selection query.
fn section_query(node: &OutlineNode) -> String {
    fn walk(node: &OutlineNode, parts: &mut Vec<String>) {
        parts.push(node.heading.clone());
        for child in &node.children {
            walk(child, parts);
        }
    }
    let mut parts = Vec::new();
    walk(node, &mut parts);
    parts.join(" ")
}

fn is_lead_heading(heading: &str) -> bool {
    let normalized = heading.trim().to_lowercase();
    LEAD_HEADINGS.contains(&normalized.as_str())
}

/// Numbered local evidence block, word-capped.
fn render_evidence(selected_urls: &[String], table: &InformationTable) -> String {
    let mut parts = Vec::new();
    let mut words_used = 0usize;
    for (i, url) in selected_urls.iter().enumerate() {
        let Some(passage) = table.url_to_info.get(url) else {
            continue;
        };
        let content = passage.raw_content();
        let words: Vec<&str> = content.split_whitespace().collect();
        let remaining = history_limit::SECTION_EVIDENCE_WORDS.saturating_sub(words_used);
        if remaining == 0 {
            break;
        }
        let clipped = if words.len() > remaining {
            words[..remaining].join(" ")
        } else {
            content.clone()
        };
        words_used += words.len().min(remaining);
        parts.push(format!("[{}] {}", i + 1, clipped));
    }
    parts.join("\n\n")
}

/// Rewrites local `[i]` markers to the unified citation index. Markers
/// that resolve to nothing are stripped; this is the only mechanism that
/// assigns citation numbers to drafted text.
fn remap_citations(markdown: &str, selected_urls: &[String], table: &InformationTable) -> String {
    let Ok(marker) = Regex::new(r"\[(\d+)\]") else {
        return markdown.to_string();
    };
    marker
        .replace_all(markdown, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|local| selected_urls.get(local.checked_sub(1)?))
                .and_then(|url| table.url_to_unified_index.get(url))
                .map(|unified| format!("[{unified}]"))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Removes `[k]` markers that do not resolve through the unified index.
/// Drafted sections only carry remapped markers, but the lead and polish
/// passes can invent one; stripping beats aborting the run.
pub(crate) fn strip_unresolvable_citations(markdown: &str, table: &InformationTable) -> String {
    let Ok(marker) = Regex::new(r"\[(\d+)\]") else {
        return markdown.to_string();
    };
    marker
        .replace_all(markdown, |caps: &regex::Captures<'_>| {
            let resolves = caps[1]
                .parse::<usize>()
                .map(|index| table.url_to_unified_index.values().any(|&v| v == index))
                .unwrap_or(false);
            if resolves {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Guarantees the section starts with its canonical heading line.
fn enforce_heading(markdown: &str, heading_line: &str) -> String {
    let trimmed = markdown.trim_start();
    if trimmed.lines().next() == Some(heading_line) {
        return trimmed.to_string();
    }
    // Drop a model-invented top-level heading line before prepending ours.
    let body = match trimmed.lines().next() {
        Some(first) if first.starts_with("# ") => trimmed
            .lines()
            .skip(1)
            .collect::<Vec<_>>()
            .join("\n")
            .trim_start()
            .to_string(),
        _ => trimmed.to_string(),
    };
    if body.is_empty() {
        heading_line.to_string()
    } else {
        format!("{heading_line}\n\n{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Conversation, DialogueTurn, Passage, Persona};

    fn table_with(urls: &[&str]) -> InformationTable {
        let passages = urls
            .iter()
            .map(|url| Passage {
                url: url.to_string(),
                title: String::new(),
                snippets: vec![format!("content of {url}")],
                description: String::new(),
                score: 1.0,
                source_tag: String::new(),
                provenance: None,
            })
            .collect();
        InformationTable::from_conversations(vec![Conversation {
            persona: Persona::basic_fact_writer(),
            turns: vec![DialogueTurn {
                question: "q".into(),
                queries: vec![],
                retrieved_passages: passages,
                answer: "a".into(),
            }],
        }])
    }

    #[test]
    fn remaps_local_markers_to_unified_indices() {
        let table = table_with(&["u1", "u2", "u3"]);
        // Section evidence selected u3 then u1: local [1] -> unified 3,
        // local [2] -> unified 1.
        let selected = vec!["u3".to_string(), "u1".to_string()];
        let remapped = remap_citations("Fact [1]. Other [2]. Bogus [7].", &selected, &table);
        assert_eq!(remapped, "Fact [3]. Other [1]. Bogus .");
    }

    #[test]
    fn enforce_heading_replaces_model_heading() {
        let fixed = enforce_heading("# Wrong title\n\nBody text.", "# 재무 분석");
        assert_eq!(fixed, "# 재무 분석\n\nBody text.");
        let kept = enforce_heading("# 재무 분석\nBody.", "# 재무 분석");
        assert!(kept.starts_with("# 재무 분석\n"));
        let prepended = enforce_heading("Body only.", "# 재무 분석");
        assert_eq!(prepended, "# 재무 분석\n\nBody only.");
    }

    #[test]
    fn unresolvable_markers_are_stripped_resolvable_ones_kept() {
        let table = table_with(&["u1", "u2"]);
        let cleaned =
            strip_unresolvable_citations("Kept [1] and [2], dropped [9].", &table);
        assert_eq!(cleaned, "Kept [1] and [2], dropped .");
    }

    #[test]
    fn lead_like_headings_are_skipped() {
        assert!(is_lead_heading("Introduction"));
        assert!(is_lead_heading(" SUMMARY "));
        assert!(is_lead_heading("conclusion"));
        assert!(!is_lead_heading("재무 분석"));
    }

    #[test]
    fn section_query_includes_subheadings() {
        let node = OutlineNode {
            heading: "재무".into(),
            level: 1,
            children: vec![OutlineNode {
                heading: "매출".into(),
                level: 2,
                children: vec![],
            }],
        };
        assert_eq!(section_query(&node), "재무 매출");
    }
}

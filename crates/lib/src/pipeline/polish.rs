//! # Stage 4b: Article Polishing
//!
//! Prepends a lead section, then removes intra-article repetition. The
//! deduplication pass is only accepted when it preserves the article's
//! heading structure; otherwise the pre-polish text is kept. Both calls
//! are best-effort: a failed lead leaves the draft without one, and a
//! failed polish reverts to the draft.

use crate::prompts::article::{
    DEDUP_POLISH_SYSTEM_PROMPT, DEDUP_POLISH_USER_PROMPT, LEAD_SECTION_SYSTEM_PROMPT,
    LEAD_SECTION_USER_PROMPT,
};
use crate::providers::ai::LanguageModel;
use crate::types::{Article, ArticleSection};
use std::sync::Arc;
use tracing::{info, warn};

/// The heading given to the generated lead section. The heading text is
/// not semantic; downstream consumers recognize the lead by position.
pub const LEAD_HEADING: &str = "summary";

/// Stage 4b polisher.
pub struct ArticlePolisher {
    lm: Arc<dyn LanguageModel>,
}

impl ArticlePolisher {
    pub fn new(lm: Arc<dyn LanguageModel>) -> Self {
        Self { lm }
    }

    /// Produces the polished article from the drafted one.
    pub async fn polish(&self, topic: &str, draft: &Article) -> Article {
        let mut article = draft.clone();

        if let Some(lead) = self.write_lead(topic, draft).await {
            article.sections.insert(
                0,
                ArticleSection {
                    heading: LEAD_HEADING.to_string(),
                    level: 1,
                    markdown: format!("# {LEAD_HEADING}\n\n{lead}"),
                },
            );
        }

        self.deduplicate(article).await
    }

    async fn write_lead(&self, topic: &str, draft: &Article) -> Option<String> {
        let user_prompt = LEAD_SECTION_USER_PROMPT
            .replace("{topic}", topic)
            .replace("{article}", &draft.to_markdown());
        match self.lm.complete(LEAD_SECTION_SYSTEM_PROMPT, &user_prompt).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                warn!("Lead section came back empty; keeping the draft without one");
                None
            }
            Err(e) => {
                warn!("Lead section generation failed: {e}");
                None
            }
        }
    }

    /// Runs the deduplication pass. The result must keep every heading
    /// line of the input; a structurally degraded rewrite is discarded.
    async fn deduplicate(&self, article: Article) -> Article {
        let markdown = article.to_markdown();
        let user_prompt = DEDUP_POLISH_USER_PROMPT.replace("{article}", &markdown);
        let polished = match self
            .lm
            .complete(DEDUP_POLISH_SYSTEM_PROMPT, &user_prompt)
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Deduplication polish failed; keeping the unpolished article: {e}");
                return article;
            }
        };

        if polished.is_empty() || !preserves_headings(&markdown, &polished) {
            warn!("Deduplication dropped headings; keeping the unpolished article");
            return article;
        }

        info!("Deduplication polish accepted");
        rebuild_sections(&polished, &article)
    }
}

/// Every heading line of `original` must reappear verbatim in `polished`.
fn preserves_headings(original: &str, polished: &str) -> bool {
    let polished_headings: Vec<&str> = heading_lines(polished).collect();
    heading_lines(original).all(|heading| polished_headings.contains(&heading))
}

fn heading_lines(markdown: &str) -> impl Iterator<Item = &str> {
    markdown
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('#'))
}

/// Splits the polished text back into sections at top-level headings,
/// matching them to the input sections by heading text.
fn rebuild_sections(polished: &str, original: &Article) -> Article {
    let mut sections: Vec<ArticleSection> = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in polished.lines() {
        let trimmed = line.trim_end();
        if let Some(heading) = trimmed.strip_prefix("# ") {
            if let Some((previous_heading, lines)) = current.take() {
                sections.push(section_from(previous_heading, lines, original));
            }
            current = Some((heading.trim().to_string(), vec![trimmed.to_string()]));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(trimmed.to_string());
        }
    }
    if let Some((heading, lines)) = current.take() {
        sections.push(section_from(heading, lines, original));
    }

    if sections.is_empty() {
        return original.clone();
    }
    Article { sections }
}

fn section_from(heading: String, lines: Vec<String>, original: &Article) -> ArticleSection {
    let level = original
        .sections
        .iter()
        .find(|section| section.heading == heading)
        .map(|section| section.level)
        .unwrap_or(1);
    ArticleSection {
        heading,
        level,
        markdown: lines.join("\n").trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(headings: &[(&str, &str)]) -> Article {
        Article {
            sections: headings
                .iter()
                .map(|(heading, body)| ArticleSection {
                    heading: heading.to_string(),
                    level: 1,
                    markdown: format!("# {heading}\n\n{body}"),
                })
                .collect(),
        }
    }

    #[test]
    fn heading_preservation_check() {
        let original = "# A\nbody\n## B\nbody";
        assert!(preserves_headings(original, "# A\n## B\nshorter"));
        assert!(!preserves_headings(original, "# A\nonly one heading left"));
    }

    #[test]
    fn rebuild_splits_on_top_level_headings() {
        let original = article(&[("개요", "첫 단락"), ("재무", "둘째 단락")]);
        let polished = "# 개요\n\n첫 단락\n\n# 재무\n\n둘째 단락";
        let rebuilt = rebuild_sections(polished, &original);
        assert_eq!(rebuilt.sections.len(), 2);
        assert_eq!(rebuilt.sections[0].heading, "개요");
        assert_eq!(rebuilt.sections[1].heading, "재무");
        assert!(rebuilt.sections[1].markdown.contains("둘째 단락"));
    }
}

//! # Stage 1: Persona Generation
//!
//! Discovers encyclopedia pages related to the topic, turns their tables
//! of contents into inspiration for a panel of editor personas, and
//! prepends the fixed basic-fact writer so every run covers the plain
//! facts regardless of what the model invents.

use crate::errors::PipelineError;
use crate::prompts::persona::{
    PERSONA_SYNTHESIS_SYSTEM_PROMPT, PERSONA_SYNTHESIS_USER_PROMPT, RELATED_TOPICS_SYSTEM_PROMPT,
    RELATED_TOPICS_USER_PROMPT,
};
use crate::providers::ai::LanguageModel;
use crate::types::Persona;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on related pages fetched for inspiration.
const MAX_RELATED_PAGES: usize = 5;

/// Stage 1 generator.
pub struct PersonaGenerator {
    lm: Arc<dyn LanguageModel>,
    http: reqwest::Client,
}

impl PersonaGenerator {
    pub fn new(lm: Arc<dyn LanguageModel>) -> Self {
        Self {
            lm,
            http: reqwest::Client::new(),
        }
    }

    /// Emits `1..=max_perspective + 1` personas; the first is always the
    /// fixed basic-fact writer.
    pub async fn generate(
        &self,
        topic: &str,
        max_perspective: usize,
    ) -> Result<Vec<Persona>, PipelineError> {
        let mut personas = vec![Persona::basic_fact_writer()];
        if max_perspective == 0 {
            return Ok(personas);
        }

        let related_contents = self.collect_related_contents(topic).await;

        let user_prompt = PERSONA_SYNTHESIS_USER_PROMPT
            .replace("{topic}", topic)
            .replace("{related_contents}", &related_contents);
        let response = self
            .lm
            .complete(PERSONA_SYNTHESIS_SYSTEM_PROMPT, &user_prompt)
            .await?;

        let generated = parse_personas(&response, max_perspective);
        info!(
            generated = generated.len(),
            "Persona synthesis produced personas"
        );
        personas.extend(generated);
        Ok(personas)
    }

    /// Tables of contents of related pages, newline-joined. Every failure
    /// along the way (bad URL, fetch error, no headings) is skipped
    /// silently; personas can be synthesized from the topic alone.
    async fn collect_related_contents(&self, topic: &str) -> String {
        let user_prompt = RELATED_TOPICS_USER_PROMPT.replace("{topic}", topic);
        let response = match self
            .lm
            .complete(RELATED_TOPICS_SYSTEM_PROMPT, &user_prompt)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                debug!("Related-topic discovery failed, continuing without: {e}");
                return String::new();
            }
        };

        let urls: Vec<&str> = response
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
            .take(MAX_RELATED_PAGES)
            .collect();

        let mut contents = Vec::new();
        for url in urls {
            match self.fetch_table_of_contents(url).await {
                Some(toc) if !toc.is_empty() => contents.push(toc),
                _ => debug!("Skipping related page without usable headings: {url}"),
            }
        }
        contents.join("\n\n")
    }

    async fn fetch_table_of_contents(&self, url: &str) -> Option<String> {
        let response = self.http.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body = response.text().await.ok()?;
        Some(extract_headings(&body))
    }
}

/// Headings at levels 2 through 6, newline-joined in document order.
fn extract_headings(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse("h2, h3, h4, h5, h6").ok();
    let Some(selector) = selector else {
        return String::new();
    };
    document
        .select(&selector)
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|heading| !heading.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses `1. name: description` lines, keeping at most `max` entries.
fn parse_personas(response: &str, max: usize) -> Vec<Persona> {
    let Ok(item) = Regex::new(r"^\s*(?:\d+[.)]|[-*])\s*(.+)$") else {
        return Vec::new();
    };
    response
        .lines()
        .filter_map(|line| {
            let body = item.captures(line)?.get(1)?.as_str();
            let (name, description) = body.split_once(':')?;
            let name = name.trim().trim_matches('*');
            let description = description.trim();
            (!name.is_empty() && !description.is_empty()).then(|| Persona {
                name: name.to_string(),
                description: description.to_string(),
            })
        })
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_and_bulleted_personas() {
        let response = "\
1. Financial analyst: focuses on revenue, margins, and capital structure.
2) Industry historian: tracks the company's position across market cycles.
- Governance watcher: examines ownership and board composition.
not a persona line
4. MissingDescription:
";
        let personas = parse_personas(response, 10);
        assert_eq!(personas.len(), 3);
        assert_eq!(personas[0].name, "Financial analyst");
        assert_eq!(personas[1].name, "Industry historian");
        assert_eq!(personas[2].name, "Governance watcher");
    }

    #[test]
    fn caps_at_max_perspective() {
        let response = "1. A: a\n2. B: b\n3. C: c\n4. D: d";
        assert_eq!(parse_personas(response, 2).len(), 2);
    }

    #[test]
    fn extracts_heading_levels_two_through_six() {
        let html = r#"<html><body>
            <h1>Page title</h1>
            <h2>History</h2>
            <h3>Early   years</h3>
            <h6>Notes</h6>
        </body></html>"#;
        assert_eq!(extract_headings(html), "History\nEarly years\nNotes");
    }
}

//! # Stage 2: Knowledge Curation
//!
//! Runs one simulated writer/expert dialogue per persona, with the
//! retriever in the loop. Dialogues are independent and run concurrently
//! in a bounded pool; the information table is merged single-threaded
//! afterwards so the unified citation index stays deterministic.

use crate::config::{history_limit, PipelineConfig};
use crate::prompts::conversation::{
    ANSWER_SYSTEM_PROMPT, ANSWER_USER_PROMPT, CANNOT_ANSWER_PHRASE, DIALOGUE_TERMINATION_PHRASE,
    OMITTED_ANSWER_PLACEHOLDER, QUERY_EXPANSION_SYSTEM_PROMPT, QUERY_EXPANSION_USER_PROMPT,
    QUESTION_ANTI_DUPLICATION_INSTRUCTION, QUESTION_SYSTEM_PROMPT, QUESTION_USER_PROMPT,
};
use crate::providers::ai::LanguageModel;
use crate::retrieval::Retriever;
use crate::types::{Conversation, DialogueTurn, InformationTable, Passage, Persona};
use futures::StreamExt;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stage 2 curator.
pub struct KnowledgeCurator {
    question_lm: Arc<dyn LanguageModel>,
    simulator_lm: Arc<dyn LanguageModel>,
    retriever: Arc<dyn Retriever>,
    config: PipelineConfig,
}

impl KnowledgeCurator {
    pub fn new(
        question_lm: Arc<dyn LanguageModel>,
        simulator_lm: Arc<dyn LanguageModel>,
        retriever: Arc<dyn Retriever>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            question_lm,
            simulator_lm,
            retriever,
            config,
        }
    }

    /// Runs all dialogues and merges them into the information table.
    ///
    /// Dialogue tasks interleave freely, but the result is collected in
    /// persona order, so the merged table is deterministic for a given
    /// set of per-dialogue outcomes.
    pub async fn research(&self, topic: &str, personas: &[Persona]) -> InformationTable {
        let pool = self.config.max_thread_num.min(personas.len()).max(1);
        info!(
            personas = personas.len(),
            pool, "Starting knowledge curation dialogues"
        );

        let conversations: Vec<Conversation> =
            futures::stream::iter(personas.iter().map(|persona| self.run_dialogue(topic, persona)))
                .buffered(pool)
                .collect()
                .await;

        InformationTable::from_conversations(conversations)
    }

    /// One writer/expert dialogue, at most `max_conv_turn` turns.
    async fn run_dialogue(&self, topic: &str, persona: &Persona) -> Conversation {
        let mut turns: Vec<DialogueTurn> = Vec::new();
        let mut excluded_urls: HashSet<String> = HashSet::new();

        while turns.len() < self.config.max_conv_turn {
            let Some(question) = self.ask_question(topic, persona, &turns).await else {
                break;
            };

            let queries = match self.expand_question(topic, &question).await {
                Some(queries) if !queries.is_empty() => queries,
                _ => {
                    debug!("Query expansion produced nothing, ending dialogue");
                    break;
                }
            };

            let passages = self
                .retriever
                .retrieve(&queries, &excluded_urls, self.config.search_top_k)
                .await;

            let answer = match self.answer_question(topic, &question, &passages).await {
                Some(answer) => answer,
                None => break,
            };

            // URLs cited by this answer are excluded from later turns of
            // this dialogue only; other dialogues may still retrieve them.
            excluded_urls.extend(cited_urls(&answer, &passages));

            turns.push(DialogueTurn {
                question,
                queries,
                retrieved_passages: passages,
                answer,
            });
        }

        debug!(
            persona = %persona.name,
            turns = turns.len(),
            "Dialogue complete"
        );
        Conversation {
            persona: persona.clone(),
            turns,
        }
    }

    /// Produces the writer's next question, or `None` to end the dialogue.
    async fn ask_question(
        &self,
        topic: &str,
        persona: &Persona,
        turns: &[DialogueTurn],
    ) -> Option<String> {
        let history = render_history(turns);
        let user_prompt = QUESTION_USER_PROMPT
            .replace("{topic}", topic)
            .replace("{persona}", &format!("{}: {}", persona.name, persona.description))
            .replace("{history}", &history);

        let mut question = match self.question_lm.complete(QUESTION_SYSTEM_PROMPT, &user_prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Question generation failed, ending dialogue: {e}");
                return None;
            }
        };

        if question.is_empty() || question.contains(DIALOGUE_TERMINATION_PHRASE) {
            return None;
        }

        // One re-ask when the writer repeats itself verbatim; a second
        // duplicate ends the dialogue instead of looping.
        if turns.iter().any(|turn| turn.question == question) {
            let retry_prompt = format!("{user_prompt}{QUESTION_ANTI_DUPLICATION_INSTRUCTION}");
            question = match self
                .question_lm
                .complete(QUESTION_SYSTEM_PROMPT, &retry_prompt)
                .await
            {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!("Question re-ask failed, ending dialogue: {e}");
                    return None;
                }
            };
            if question.is_empty()
                || question.contains(DIALOGUE_TERMINATION_PHRASE)
                || turns.iter().any(|turn| turn.question == question)
            {
                return None;
            }
        }

        Some(question)
    }

    /// Expands a question into at most `max_search_queries_per_turn`
    /// search queries.
    async fn expand_question(&self, topic: &str, question: &str) -> Option<Vec<String>> {
        let system_prompt = QUERY_EXPANSION_SYSTEM_PROMPT.replace(
            "{max_queries}",
            &self.config.max_search_queries_per_turn.to_string(),
        );
        let user_prompt = QUERY_EXPANSION_USER_PROMPT
            .replace("{topic}", topic)
            .replace("{question}", question);

        let response = match self.simulator_lm.complete(&system_prompt, &user_prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Query expansion failed: {e}");
                return None;
            }
        };

        let mut queries = parse_query_bullets(&response);
        if queries.is_empty() {
            // The model ignored the bullet format; fall back to its first
            // non-empty line as a single query.
            queries = response
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(|line| vec![line.to_string()])
                .unwrap_or_default();
        }
        queries.truncate(self.config.max_search_queries_per_turn);
        Some(queries)
    }

    /// Produces the expert's grounded answer. Returns `None` only on a
    /// fatal model error; a blocked/empty completion is kept as `""` so
    /// the dialogue can continue.
    async fn answer_question(
        &self,
        topic: &str,
        question: &str,
        passages: &[Passage],
    ) -> Option<String> {
        if passages.is_empty() {
            return Some(CANNOT_ANSWER_PHRASE.to_string());
        }

        let evidence = passages
            .iter()
            .enumerate()
            .map(|(i, passage)| format!("[{}] {}", i + 1, passage.raw_content()))
            .collect::<Vec<_>>()
            .join("\n\n");
        let user_prompt = ANSWER_USER_PROMPT
            .replace("{topic}", topic)
            .replace("{question}", question)
            .replace("{evidence}", &evidence);

        match self
            .simulator_lm
            .complete(ANSWER_SYSTEM_PROMPT, &user_prompt)
            .await
        {
            Ok(text) => Some(text.trim().to_string()),
            Err(e) => {
                warn!("Answer generation failed, ending dialogue: {e}");
                None
            }
        }
    }
}

/// Renders the dialogue history fed back to the writer: the last few
/// turns in full, older answers elided, the whole window word-capped
/// from the front (oldest turns dropped first).
fn render_history(turns: &[DialogueTurn]) -> String {
    let elide_before = turns.len().saturating_sub(history_limit::RECENT_TURNS_KEPT);
    let rendered: Vec<String> = turns
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            if i < elide_before {
                format!("Writer: {}\n{}", turn.question, OMITTED_ANSWER_PLACEHOLDER)
            } else {
                format!("Writer: {}\nExpert: {}", turn.question, turn.answer)
            }
        })
        .collect();
    truncate_words_keeping_tail(
        &rendered.join("\n"),
        history_limit::QUESTION_CONTEXT_WORDS,
    )
}

/// Keeps the trailing `max_words` words of `text`.
fn truncate_words_keeping_tail(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    words[words.len() - max_words..].join(" ")
}

/// Parses `- query` / `* query` / `1. query` lines.
fn parse_query_bullets(response: &str) -> Vec<String> {
    let Ok(bullet) = Regex::new(r"^\s*(?:[-*]|\d+[.)])\s+(.+)$") else {
        return Vec::new();
    };
    response
        .lines()
        .filter_map(|line| {
            bullet
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|query| !query.is_empty())
        .collect()
}

/// URLs of the passages this answer actually cited via `[n]` markers.
fn cited_urls(answer: &str, passages: &[Passage]) -> Vec<String> {
    let Ok(marker) = Regex::new(r"\[(\d+)\]") else {
        return Vec::new();
    };
    marker
        .captures_iter(answer)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
        .filter_map(|index| passages.get(index.checked_sub(1)?))
        .map(|passage| passage.url.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(question: &str, answer: &str) -> DialogueTurn {
        DialogueTurn {
            question: question.to_string(),
            queries: vec![],
            retrieved_passages: vec![],
            answer: answer.to_string(),
        }
    }

    #[test]
    fn history_elides_answers_older_than_the_window() {
        let turns: Vec<DialogueTurn> = (0..6)
            .map(|i| turn(&format!("q{i}"), &format!("a{i}")))
            .collect();
        let history = render_history(&turns);
        assert!(history.contains("Writer: q0\nExpert: Omit the answer here due to space limit."));
        assert!(history.contains("Writer: q1\nExpert: Omit the answer here due to space limit."));
        assert!(history.contains("Writer: q2\nExpert: a2"));
        assert!(history.contains("Writer: q5\nExpert: a5"));
        assert!(!history.contains("Expert: a0"));
    }

    #[test]
    fn history_is_word_capped_from_the_front() {
        let long_answer = "word ".repeat(3000);
        let turns = vec![turn("old question", &long_answer), turn("new question", "short")];
        let history = render_history(&turns);
        let words = history.split_whitespace().count();
        assert!(words <= history_limit::QUESTION_CONTEXT_WORDS);
        assert!(history.contains("new question"));
    }

    #[test]
    fn parses_query_bullets_in_mixed_formats() {
        let response = "- SK하이닉스 매출\n* HBM 점유율\n1. 반도체 시장 전망\nnot a bullet";
        assert_eq!(
            parse_query_bullets(response),
            vec!["SK하이닉스 매출", "HBM 점유율", "반도체 시장 전망"]
        );
    }

    #[test]
    fn cited_urls_maps_markers_to_passage_urls() {
        let passages = vec![
            Passage {
                url: "u1".into(),
                title: String::new(),
                snippets: vec![],
                description: String::new(),
                score: 0.0,
                source_tag: String::new(),
                provenance: None,
            },
            Passage {
                url: "u2".into(),
                title: String::new(),
                snippets: vec![],
                description: String::new(),
                score: 0.0,
                source_tag: String::new(),
                provenance: None,
            },
        ];
        let urls = cited_urls("Revenue rose [1], margin fell [2], bogus [9].", &passages);
        assert_eq!(urls, vec!["u1", "u2"]);
    }
}

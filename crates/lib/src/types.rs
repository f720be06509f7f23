//! # Core Data Model
//!
//! The shared types that flow through the pipeline: personas, retrieved
//! passages, dialogue turns, the information table handed from knowledge
//! curation to drafting, and the outline/article trees.
//!
//! Dialogues reference passages by URL, never by object reference; the
//! `InformationTable` is a flat index map and stays serializable.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// A named editorial perspective used to diversify research questions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub description: String,
}

impl Persona {
    /// The fixed persona prepended to every run. It anchors the dialogue
    /// set with broad factual coverage regardless of what the model emits.
    pub fn basic_fact_writer() -> Self {
        Self {
            name: "Basic fact writer".to_string(),
            description: "Basic fact writer focusing on broadly covering the basic facts about the topic."
                .to_string(),
        }
    }
}

/// Chunk classification carried by the corpus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Text,
    Table,
    /// Boilerplate merged away during ingestion. Rows of this type are
    /// filtered in the store query and must never reach a passage.
    NoiseMerged,
}

impl ChunkType {
    pub fn from_db(value: &str) -> Self {
        match value {
            "table" => ChunkType::Table,
            "noise_merged" => ChunkType::NoiseMerged,
            _ => ChunkType::Text,
        }
    }
}

/// Provenance of an internal (corpus-backed) passage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provenance {
    pub chunk_id: i64,
    pub report_id: i64,
    pub company_name: String,
    pub chunk_type: ChunkType,
    pub sequence_order: i32,
    pub has_merged_meta: bool,
}

/// A retrieved unit of evidence with a globally unique, stable URL.
///
/// Internal passages use `dart_report_{report_id}_chunk_{chunk_id}` so the
/// same chunk always resolves to the same URL across queries and runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    pub url: String,
    pub title: String,
    pub snippets: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub score: f64,
    #[serde(default)]
    pub source_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl Passage {
    /// The stable URL for an internal corpus chunk.
    pub fn internal_url(report_id: i64, chunk_id: i64) -> String {
        format!("dart_report_{report_id}_chunk_{chunk_id}")
    }

    /// Full text of the passage as fed to the language models.
    pub fn raw_content(&self) -> String {
        self.snippets.join("\n")
    }
}

/// One writer/expert exchange inside a persona dialogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub question: String,
    pub queries: Vec<String>,
    pub retrieved_passages: Vec<Passage>,
    pub answer: String,
}

/// A completed dialogue for one persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub persona: Persona,
    pub turns: Vec<DialogueTurn>,
}

/// The canonical handoff between knowledge curation and drafting.
///
/// Built once after all dialogues finish; read-only afterwards. The
/// unified index numbers URLs 1..N in first-sighting order and is the key
/// space for every `[k]` citation in the final article.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InformationTable {
    pub conversations: Vec<Conversation>,
    pub url_to_info: HashMap<String, Passage>,
    pub url_to_unified_index: HashMap<String, usize>,
}

impl InformationTable {
    /// Merges completed dialogues into the table.
    ///
    /// Runs single-threaded after Stage 2 so the unified index is
    /// deterministic: personas in input order, turns in order, passages in
    /// retrieval order. First sighting wins for title and description;
    /// snippets seen later for the same URL are appended.
    pub fn from_conversations(conversations: Vec<Conversation>) -> Self {
        let mut url_to_info: HashMap<String, Passage> = HashMap::new();
        let mut url_to_unified_index: HashMap<String, usize> = HashMap::new();
        let mut next_index = 1usize;

        for conversation in &conversations {
            for turn in &conversation.turns {
                for passage in &turn.retrieved_passages {
                    match url_to_info.get_mut(&passage.url) {
                        Some(existing) => {
                            for snippet in &passage.snippets {
                                if !existing.snippets.contains(snippet) {
                                    existing.snippets.push(snippet.clone());
                                }
                            }
                        }
                        None => {
                            url_to_info.insert(passage.url.clone(), passage.clone());
                            url_to_unified_index.insert(passage.url.clone(), next_index);
                            next_index += 1;
                        }
                    }
                }
            }
        }

        Self {
            conversations,
            url_to_info,
            url_to_unified_index,
        }
    }

    /// URLs in unified-index order (1..N).
    pub fn urls_by_index(&self) -> Vec<&str> {
        let mut pairs: Vec<(&str, usize)> = self
            .url_to_unified_index
            .iter()
            .map(|(url, index)| (url.as_str(), *index))
            .collect();
        pairs.sort_by_key(|(_, index)| *index);
        pairs.into_iter().map(|(url, _)| url).collect()
    }

    /// The `conversation_log` artifact.
    pub fn conversation_log(&self) -> serde_json::Value {
        json!(self
            .conversations
            .iter()
            .map(|conversation| {
                json!({
                    "perspective": format!(
                        "{}: {}",
                        conversation.persona.name, conversation.persona.description
                    ),
                    "dlg_turns": conversation
                        .turns
                        .iter()
                        .map(|turn| {
                            json!({
                                "user_utterance": turn.question,
                                "agent_utterance": turn.answer,
                                "queries": turn.queries,
                                "search_results": turn.retrieved_passages,
                            })
                        })
                        .collect::<Vec<_>>(),
                })
            })
            .collect::<Vec<_>>())
    }

    /// The `url_to_info` artifact: passage metadata plus the unified index.
    pub fn url_snapshot(&self) -> serde_json::Value {
        let info: serde_json::Map<String, serde_json::Value> = self
            .url_to_info
            .iter()
            .map(|(url, passage)| {
                (
                    url.clone(),
                    json!({
                        "title": passage.title,
                        "snippets": passage.snippets,
                        "description": passage.description,
                    }),
                )
            })
            .collect();
        json!({
            "url_to_info": info,
            "url_to_unified_index": self.url_to_unified_index,
        })
    }
}

/// One heading in the outline tree. Levels run 1 (`#`) through 4 (`####`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutlineNode {
    pub heading: String,
    pub level: u8,
    pub children: Vec<OutlineNode>,
}

/// The article skeleton produced by Stage 3.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outline {
    pub nodes: Vec<OutlineNode>,
}

impl Outline {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every heading in document order, with its level.
    pub fn all_headings(&self) -> Vec<(u8, &str)> {
        fn walk<'a>(nodes: &'a [OutlineNode], out: &mut Vec<(u8, &'a str)>) {
            for node in nodes {
                out.push((node.level, node.heading.as_str()));
                walk(&node.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }

    /// Renders the outline back to heading-only Markdown.
    pub fn to_markdown(&self) -> String {
        self.all_headings()
            .into_iter()
            .map(|(level, heading)| format!("{} {}", "#".repeat(level as usize), heading))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One drafted section, heading plus cited Markdown body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSection {
    pub heading: String,
    pub level: u8,
    pub markdown: String,
}

/// The drafted (and later polished) article.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Article {
    pub sections: Vec<ArticleSection>,
}

impl Article {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        self.sections
            .iter()
            .map(|section| section.markdown.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

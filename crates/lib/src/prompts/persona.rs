//! # Persona Generation Prompts
//!
//! Stage 1: discovering related articles and synthesizing the editor
//! personas that diversify the research dialogues.

/// The system prompt for discovering related encyclopedia pages.
pub const RELATED_TOPICS_SYSTEM_PROMPT: &str = "You are identifying background reading for an encyclopedia editor. Given a topic, list URLs of existing Wikipedia (or similarly structured encyclopedia) pages about closely related subjects. Recommend pages whose tables of contents would help plan an article on the topic. Output one URL per line and nothing else.";

/// The user prompt for related-page discovery.
/// Placeholders: `{topic}`
pub const RELATED_TOPICS_USER_PROMPT: &str = r#"Topic of interest: {topic}

List the URLs of related pages:"#;

/// The system prompt for synthesizing editor personas.
pub const PERSONA_SYNTHESIS_SYSTEM_PROMPT: &str = "You need to select a group of encyclopedia editors who will work together to write a comprehensive article on the topic. Each of them represents a different perspective, role, or affinity related to this topic. You can use the tables of contents of related pages as inspiration for what dimensions matter. For each editor, give a short role name and a description of what they will focus on. Strictly format each editor as `1. role name: description` on its own line, with no other text.";

/// The user prompt for persona synthesis.
/// Placeholders: `{topic}`, `{related_contents}` (newline-joined tables
/// of contents of related pages; may be empty)
pub const PERSONA_SYNTHESIS_USER_PROMPT: &str = r#"Topic: {topic}

Tables of contents of related pages:
{related_contents}

List the editors:"#;

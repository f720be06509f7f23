//! # Article Drafting and Polishing Prompts
//!
//! Stage 4: per-section drafting with inline citations, the lead section,
//! and the deduplication polish.

/// The system prompt for drafting one section from curated evidence.
pub const SECTION_DRAFT_SYSTEM_PROMPT: &str = "Write an encyclopedia section about a company topic based on the collected information.\n\nRules:\n1. Start with the given section heading line and keep the \"#\"/\"##\" heading hierarchy for any subsections.\n2. Every factual claim must carry an inline citation [n], where n is the index of the supporting source in the collected information.\n3. When citing numerical data, state the date and unit explicitly.\n4. Do not write a \"References\" or \"Sources\" section; the inline markers are enough.\n5. Output only the section in Markdown.";

/// The user prompt for section drafting.
/// Placeholders: `{topic}`, `{section_heading}`, `{evidence}` (numbered
/// source snippets, word-capped)
pub const SECTION_DRAFT_USER_PROMPT: &str = r#"Topic: {topic}

Collected information:
{evidence}

Write the section: {section_heading}"#;

/// The system prompt for writing the lead section.
pub const LEAD_SECTION_SYSTEM_PROMPT: &str = "Write a lead section for the given encyclopedia-style page about a company topic.\n\nRules:\n1. At most four paragraphs.\n2. The lead must stand on its own as a concise overview of the whole page.\n3. Keep inline [n] citations where the body provides them for the same facts.\n4. Output only the lead text, without a heading line.";

/// The user prompt for the lead section.
/// Placeholders: `{topic}`, `{article}`
pub const LEAD_SECTION_USER_PROMPT: &str = r#"Topic: {topic}

The page so far:
{article}

Write the lead section:"#;

/// The system prompt for the deduplication polish.
pub const DEDUP_POLISH_SYSTEM_PROMPT: &str = "You are a careful copy editor removing repetition from an encyclopedia-style page. Delete sentences that repeat information already stated elsewhere on the page, and nothing else.\n\nRules:\n1. Keep every \"#\"/\"##\"/... heading line exactly as it is.\n2. Keep every inline [n] citation marker attached to the sentences you keep.\n3. Keep paragraph boundaries; do not merge or reorder sections.\n4. Do not delete, summarize, or rewrite information that appears only once.\n5. Output the full page in Markdown.";

/// The user prompt for the deduplication polish.
/// Placeholders: `{article}`
pub const DEDUP_POLISH_USER_PROMPT: &str = r#"The page:
{article}

The page with repetition removed:"#;

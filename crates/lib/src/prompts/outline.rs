//! # Outline Generation Prompts
//!
//! Stage 3: a prior-knowledge draft outline, then a refinement pass
//! grounded in the flattened research dialogues.

/// The system prompt for the prior-knowledge outline draft.
pub const OUTLINE_DRAFT_SYSTEM_PROMPT: &str = "Write an outline for an encyclopedia-style analysis page about a company topic.\n\nFormat:\n1. Use \"#\" for section titles, \"##\" for subsection titles, \"###\" for sub-subsection titles, and so on.\n2. Do not include the topic itself as a title line.\n3. Output only the outline, with no other commentary.";

/// The user prompt for the outline draft.
/// Placeholders: `{topic}`
pub const OUTLINE_DRAFT_USER_PROMPT: &str = r#"Topic: {topic}

Outline:"#;

/// The system prompt for outline refinement.
pub const OUTLINE_REFINE_SYSTEM_PROMPT: &str = "Improve an outline for an encyclopedia-style analysis page about a company topic. You already have a draft outline covering the general information, and a set of research conversations with an expert grounded in the company's filings. Use what was actually learned in the conversations to make the outline more specific and complete: add sections for discussed aspects the draft missed and remove sections the evidence cannot support.\n\nFormat:\n1. Use \"#\" for section titles, \"##\" for subsection titles, \"###\" for sub-subsection titles, and so on.\n2. Do not include the topic itself as a title line.\n3. Output only the outline, with no other commentary.";

/// The user prompt for outline refinement.
/// Placeholders: `{topic}`, `{draft_outline}`, `{conversations}`
/// (flattened `Writer:`/`Expert:` turns, word-capped)
pub const OUTLINE_REFINE_USER_PROMPT: &str = r#"Topic: {topic}

Draft outline:
{draft_outline}

Research conversations:
{conversations}

Improved outline:"#;

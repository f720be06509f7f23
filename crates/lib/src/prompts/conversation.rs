//! # Knowledge Curation Prompts
//!
//! Stage 2: the simulated writer/expert dialogue. The writer asks
//! questions from a persona's point of view; the expert expands each
//! question into search queries and answers strictly from retrieved,
//! source-tagged evidence.

/// The literal phrase that ends a dialogue when the writer runs out of
/// questions. Matched verbatim by the curation loop.
pub const DIALOGUE_TERMINATION_PHRASE: &str = "Thank you so much for your help!";

/// The literal answer the expert must give when the evidence is
/// inadequate. Matched by tests; do not reword.
pub const CANNOT_ANSWER_PHRASE: &str =
    "I cannot answer this question based on the available information.";

/// The system prompt for the writer asking questions.
pub const QUESTION_SYSTEM_PROMPT: &str = "You are an experienced encyclopedia writer and want to edit a specific page about a company. Besides your identity as an encyclopedia writer, you have a specific focus when researching the topic. Now, you are chatting with an expert who has access to the company's regulatory filings to get information. Ask one good question at a time to get more useful information. Do not ask what the expert has already answered. When you have no more questions, say exactly \"Thank you so much for your help!\". Output only the question (or the closing phrase), nothing else.";

/// The user prompt for question asking.
/// Placeholders: `{topic}`, `{persona}` (may be empty), `{history}`
pub const QUESTION_USER_PROMPT: &str = r#"Topic you are writing about: {topic}

Your persona (besides being an encyclopedia writer): {persona}

Conversation so far:
{history}

Your next question:"#;

/// Appended to the question prompt when the writer repeats itself.
pub const QUESTION_ANTI_DUPLICATION_INSTRUCTION: &str =
    "\n\nYou already asked that question. Ask a different question covering an aspect not yet discussed.";

/// The placeholder inserted for elided answers in the history window.
pub const OMITTED_ANSWER_PLACEHOLDER: &str = "Expert: Omit the answer here due to space limit.";

/// The system prompt for expanding a question into search queries.
pub const QUERY_EXPANSION_SYSTEM_PROMPT: &str = "You want to answer the question using a search engine over corporate filings and the web. What do you type into the search box? Write the queries you would use, at most {max_queries}, one per line, each formatted as `- query`. Output only the bullet list.";

/// The user prompt for query expansion.
/// Placeholders: `{topic}`, `{question}`
pub const QUERY_EXPANSION_USER_PROMPT: &str = r#"Topic context: {topic}

Question: {question}

Queries:"#;

/// The system prompt for the grounded expert answer.
pub const ANSWER_SYSTEM_PROMPT: &str = "You are an expert who can use information effectively. You are chatting with an encyclopedia writer who wants to write a page about the topic you know. You have gathered the related information listed below; each source begins with a [[Source: ...]] attribution header. Now use this information to form an informative answer.\n\nRules:\n1. Every factual claim must cite its source as an inline [n] marker, where n is the numbered index of the source below.\n2. Only use facts from the gathered information. Attribute each fact to the company named in its source header, never to another company.\n3. When citing numbers from a table, state the unit and the base date explicitly.\n4. If the gathered information cannot answer the question, reply exactly: \"I cannot answer this question based on the available information.\"\n5. Answer as plain text; do not add a references list.";

/// The user prompt for the expert answer.
/// Placeholders: `{topic}`, `{question}`, `{evidence}` (numbered,
/// source-tagged passages)
pub const ANSWER_USER_PROMPT: &str = r#"Topic: {topic}

Question: {question}

Gathered information:
{evidence}

Your answer:"#;

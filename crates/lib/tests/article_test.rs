//! # Article Generation and Polishing Tests
//!
//! Section selection, citation remapping to the unified index, empty
//! sections kept as heading-only, lead generation, and the polish
//! revert-on-degradation guard.

use dartwiki::pipeline::article::ArticleGenerator;
use dartwiki::pipeline::polish::ArticlePolisher;
use dartwiki::types::{
    Article, ArticleSection, Conversation, DialogueTurn, InformationTable, Outline, Passage,
    Persona,
};
use dartwiki::{EmbeddingClient, PipelineConfig};
use dartwiki_test_utils::{start_embedding_server, ScriptedLm};
use std::sync::Arc;

const DIMENSION: usize = 64;

fn passage(url: &str, content: &str) -> Passage {
    Passage {
        url: url.to_string(),
        title: String::new(),
        snippets: vec![content.to_string()],
        description: String::new(),
        score: 0.9,
        source_tag: "SK하이닉스".to_string(),
        provenance: None,
    }
}

/// Three sources, unified indices 1..3 in this order.
fn table() -> InformationTable {
    InformationTable::from_conversations(vec![Conversation {
        persona: Persona::basic_fact_writer(),
        turns: vec![DialogueTurn {
            question: "q".to_string(),
            queries: vec![],
            retrieved_passages: vec![
                passage("u1", "회사 연혁 설립 1983년"),
                passage("u2", "매출 실적 50조원 2023년"),
                passage("u3", "연구 개발 투자 확대"),
            ],
            answer: "a".to_string(),
        }],
    }])
}

async fn embedder(server: &wiremock::MockServer) -> EmbeddingClient {
    EmbeddingClient::new(
        format!("{}/v1/embeddings", server.uri()),
        "test-embedder".to_string(),
        None,
        DIMENSION,
    )
    .unwrap()
}

#[tokio::test]
async fn sections_are_drafted_in_outline_order_with_unified_citations() {
    let server = start_embedding_server(DIMENSION).await;
    let lm = ScriptedLm::new();
    // Every section cites its first local source; the remapped indices
    // must therefore differ per section when different evidence wins.
    lm.add_response("Write an encyclopedia section", "내용 설명 [1].");

    let outline = dartwiki::pipeline::outline::parse_outline(
        "# Introduction\n# 연혁\n## 설립\n# 매출 실적",
    );
    let generator = ArticleGenerator::new(
        Arc::new(lm),
        embedder(&server).await,
        PipelineConfig::default(),
    );
    let article = generator.generate("토픽", &outline, &table()).await;

    // Introduction is the polisher's job and was skipped.
    let headings: Vec<&str> = article
        .sections
        .iter()
        .map(|section| section.heading.as_str())
        .collect();
    assert_eq!(headings, vec!["연혁", "매출 실적"]);

    // Every remaining [k] marker resolves through the unified index.
    let table = table();
    for section in &article.sections {
        assert!(section.markdown.starts_with(&format!("# {}", section.heading)));
        for marker in extract_markers(&section.markdown) {
            assert!(
                table.url_to_unified_index.values().any(|&v| v == marker),
                "marker [{marker}] does not resolve"
            );
        }
    }

    // The 연혁 section's best evidence shares its wording with u1, so
    // its local [1] remapped to unified index 1.
    let history = &article.sections[0];
    assert!(history.markdown.contains("[1]"));
    // The 매출 실적 section's best evidence is u2 (unified index 2).
    let revenue = &article.sections[1];
    assert!(revenue.markdown.contains("[2]"));
}

fn extract_markers(markdown: &str) -> Vec<usize> {
    let regex = regex::Regex::new(r"\[(\d+)\]").unwrap();
    regex
        .captures_iter(markdown)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

#[tokio::test]
async fn empty_draft_is_kept_as_heading_only() {
    let server = start_embedding_server(DIMENSION).await;
    let lm = ScriptedLm::new();
    lm.add_response("Write an encyclopedia section", "");

    let outline = dartwiki::pipeline::outline::parse_outline("# 연혁");
    let generator = ArticleGenerator::new(
        Arc::new(lm),
        embedder(&server).await,
        PipelineConfig::default(),
    );
    let article = generator.generate("토픽", &outline, &table()).await;

    assert_eq!(article.sections.len(), 1);
    assert_eq!(article.sections[0].markdown, "# 연혁");
}

#[tokio::test]
async fn empty_information_table_yields_citation_free_sections() {
    let server = start_embedding_server(DIMENSION).await;
    let lm = ScriptedLm::new();
    lm.add_response("Write an encyclopedia section", "일반적인 설명 문단.");

    let outline = dartwiki::pipeline::outline::parse_outline("# 개요\n# 연혁");
    let generator = ArticleGenerator::new(
        Arc::new(lm),
        embedder(&server).await,
        PipelineConfig::default(),
    );
    let article = generator
        .generate("토픽", &outline, &InformationTable::default())
        .await;

    assert_eq!(article.sections.len(), 2);
    for section in &article.sections {
        assert!(extract_markers(&section.markdown).is_empty());
    }
}

fn drafted_article() -> Article {
    Article {
        sections: vec![
            ArticleSection {
                heading: "연혁".to_string(),
                level: 1,
                markdown: "# 연혁\n\n1983년 설립되었다 [1].".to_string(),
            },
            ArticleSection {
                heading: "매출 실적".to_string(),
                level: 1,
                markdown: "# 매출 실적\n\n2023년 매출은 50조원이다 [2].".to_string(),
            },
        ],
    }
}

#[tokio::test]
async fn polish_prepends_a_lead_and_keeps_headings() {
    let lm = ScriptedLm::new();
    lm.add_response("Write a lead section", "회사를 요약하는 문단 [1].");
    lm.add_response(
        "careful copy editor",
        "# summary\n\n회사를 요약하는 문단 [1].\n\n# 연혁\n\n1983년 설립되었다 [1].\n\n# 매출 실적\n\n2023년 매출은 50조원이다 [2].",
    );

    let polished = ArticlePolisher::new(Arc::new(lm))
        .polish("토픽", &drafted_article())
        .await;

    let headings: Vec<&str> = polished
        .sections
        .iter()
        .map(|section| section.heading.as_str())
        .collect();
    assert_eq!(headings, vec!["summary", "연혁", "매출 실적"]);
}

#[tokio::test]
async fn degraded_polish_output_reverts_to_the_draft() {
    let lm = ScriptedLm::new();
    lm.add_response("Write a lead section", "요약 문단.");
    // The copy editor dropped a heading; its output must be discarded.
    lm.add_response("careful copy editor", "# summary\n\n요약 문단.\n\n# 연혁\n\n내용");

    let polished = ArticlePolisher::new(Arc::new(lm))
        .polish("토픽", &drafted_article())
        .await;

    // The lead survived (it was added before deduplication), and every
    // draft heading is still present.
    let headings: Vec<&str> = polished
        .sections
        .iter()
        .map(|section| section.heading.as_str())
        .collect();
    assert_eq!(headings, vec!["summary", "연혁", "매출 실적"]);
    assert!(polished.sections[2].markdown.contains("50조원"));
}

#[tokio::test]
async fn polish_is_idempotent_when_nothing_repeats() {
    let lm = ScriptedLm::new();
    lm.add_response("Write a lead section", "요약 문단 [1].");
    // The copy editor returns its input unchanged.
    let fixed_point = "# summary\n\n요약 문단 [1].\n\n# 연혁\n\n1983년 설립되었다 [1].\n\n# 매출 실적\n\n2023년 매출은 50조원이다 [2].";
    lm.add_response("careful copy editor", fixed_point);

    let polisher = ArticlePolisher::new(Arc::new(lm));
    let once = polisher.polish("토픽", &drafted_article()).await;

    // Re-running only the deduplication on an already polished article
    // must not change it: rebuild from the same markdown and compare.
    assert_eq!(once.to_markdown(), fixed_point);
}

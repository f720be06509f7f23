//! # Outline Generation Tests
//!
//! Two-pass outline behavior: refinement over the dialogue history,
//! degradation to the draft, the empty-output abort, and parse
//! round-tripping.

use dartwiki::pipeline::outline::{parse_outline, OutlineGenerator};
use dartwiki::types::{Conversation, DialogueTurn, InformationTable, Persona};
use dartwiki_test_utils::ScriptedLm;
use std::sync::Arc;

fn table_with_dialogue() -> InformationTable {
    InformationTable::from_conversations(vec![Conversation {
        persona: Persona::basic_fact_writer(),
        turns: vec![DialogueTurn {
            question: "설립 연도는?".to_string(),
            queries: vec!["설립 연도".to_string()],
            retrieved_passages: vec![],
            answer: "1983년에 설립되었다.".to_string(),
        }],
    }])
}

#[tokio::test]
async fn refined_outline_is_canonical_and_draft_is_kept() {
    let lm = ScriptedLm::new();
    lm.add_response(
        "Write an outline",
        "# 개요\n## 연혁\n# 재무",
    );
    lm.add_response(
        "Improve an outline",
        "# 개요\n## 연혁\n### 창립기\n# 재무\n# 사업 부문",
    );

    let bundle = OutlineGenerator::new(Arc::new(lm))
        .generate("SK하이닉스 기업 분석", &table_with_dialogue())
        .await
        .unwrap();

    assert_eq!(bundle.draft.all_headings().len(), 3);
    assert_eq!(bundle.refined.all_headings().len(), 5);
    assert_eq!(bundle.refined.nodes[2].heading, "사업 부문");
}

#[tokio::test]
async fn empty_dialogue_history_degrades_to_the_draft() {
    let lm = ScriptedLm::new();
    lm.add_response("Write an outline", "# 개요\n# 재무");
    // No refinement response is programmed: with an empty information
    // table the refinement call must not happen at all.

    let bundle = OutlineGenerator::new(Arc::new(lm))
        .generate("토픽", &InformationTable::default())
        .await
        .unwrap();

    assert_eq!(bundle.refined, bundle.draft);
    assert_eq!(bundle.refined.all_headings().len(), 2);
}

#[tokio::test]
async fn unusable_refinement_falls_back_to_the_draft() {
    let lm = ScriptedLm::new();
    lm.add_response("Write an outline", "# 개요\n# 재무");
    lm.add_response("Improve an outline", "no headings in this reply");

    let bundle = OutlineGenerator::new(Arc::new(lm))
        .generate("토픽", &table_with_dialogue())
        .await
        .unwrap();

    assert_eq!(bundle.refined, bundle.draft);
}

#[tokio::test]
async fn both_passes_empty_abort_the_stage() {
    let lm = ScriptedLm::new();
    lm.add_response("Write an outline", "");
    lm.add_response("Improve an outline", "");

    let error = OutlineGenerator::new(Arc::new(lm))
        .generate("토픽", &table_with_dialogue())
        .await
        .unwrap_err();
    assert!(error.to_string().contains("produced no output"));
}

#[test]
fn outline_markdown_round_trips() {
    let markdown = "# 개요\n## 연혁\n### 창립기\n## 지배구조\n# 재무\n#### 깊은 항목";
    let outline = parse_outline(markdown);
    let rendered = outline.to_markdown();
    assert_eq!(parse_outline(&rendered), outline);
    // Rendering a parse of clean heading-only input reproduces it.
    let clean = "# A\n## B\n# C";
    assert_eq!(parse_outline(clean).to_markdown(), clean);
}

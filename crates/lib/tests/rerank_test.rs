//! # Entity-Aware Rerank Tests
//!
//! Ordering behavior of the reranker over mixed candidate sets: boosted
//! target-company passages must overtake higher-similarity foreign text,
//! and reranking must be stable for equal adjusted scores.

use dartwiki::retrieval::rerank::{
    classify_intent, extract_targets, rerank_by_entity, AliasRegistry, QueryIntent, RerankWeights,
};
use dartwiki::types::{ChunkType, Passage, Provenance};
use std::collections::HashMap;

fn registry() -> AliasRegistry {
    HashMap::from([
        (
            "SK하이닉스".to_string(),
            vec![
                "SK하이닉스".to_string(),
                "하이닉스".to_string(),
                "SK Hynix".to_string(),
            ],
        ),
        (
            "삼성전자".to_string(),
            vec!["삼성전자".to_string(), "삼성".to_string()],
        ),
    ])
}

fn corpus_passage(url: &str, company: &str, chunk_type: ChunkType, score: f64) -> Passage {
    Passage {
        url: url.to_string(),
        title: "사업의 내용".to_string(),
        snippets: vec!["본문".to_string()],
        description: String::new(),
        score,
        source_tag: String::new(),
        provenance: Some(Provenance {
            chunk_id: 1,
            report_id: 1,
            company_name: company.to_string(),
            chunk_type,
            sequence_order: 0,
            has_merged_meta: false,
        }),
    }
}

#[test]
fn boosted_target_passages_overtake_stronger_foreign_text() {
    // --- 1. Arrange ---
    // The foreign text passage starts with the best raw similarity.
    let candidates = vec![
        corpus_passage("foreign", "삼성전자", ChunkType::Text, 0.80),
        corpus_passage("target", "SK하이닉스", ChunkType::Text, 0.75),
    ];

    // --- 2. Act ---
    let result = rerank_by_entity(
        "SK하이닉스 시장 분석",
        candidates,
        &registry(),
        RerankWeights::default(),
    );

    // --- 3. Assert ---
    // target: 0.75 * 1.3 = 0.975; foreign: 0.80 * 0.5 = 0.40.
    let urls: Vec<&str> = result.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec!["target", "foreign"]);
}

#[test]
fn rerank_is_stable_for_equal_adjusted_scores() {
    let candidates = vec![
        corpus_passage("first", "SK하이닉스", ChunkType::Text, 0.5),
        corpus_passage("second", "SK하이닉스", ChunkType::Text, 0.5),
        corpus_passage("third", "SK하이닉스", ChunkType::Text, 0.5),
    ];
    let result = rerank_by_entity(
        "SK하이닉스 전망",
        candidates,
        &registry(),
        RerankWeights::default(),
    );
    let urls: Vec<&str> = result.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec!["first", "second", "third"]);
}

#[test]
fn target_extraction_pulls_in_every_alias_of_a_matched_company() {
    let reg = registry();
    let targets = extract_targets("하이닉스 실적은?", &reg);
    assert!(targets.contains(&"SK하이닉스"));
    assert!(targets.contains(&"SK Hynix"));
    assert!(!targets.contains(&"삼성전자"));
}

#[test]
fn intent_rules_follow_the_keyword_tables() {
    assert_eq!(
        classify_intent("두 회사의 점유율 비교"),
        QueryIntent::Analytical
    );
    assert_eq!(classify_intent("대표이사와 임원 현황"), QueryIntent::Factoid);
    // Unknown queries default to analytical, the lossless path.
    assert_eq!(classify_intent("그 외의 질문"), QueryIntent::Analytical);
}

#[test]
fn disabling_table_drop_keeps_foreign_tables_with_penalty() {
    let candidates = vec![corpus_passage(
        "foreign-table",
        "삼성전자",
        ChunkType::Table,
        0.9,
    )];
    let weights = RerankWeights {
        drop_unmatched_tables: false,
        ..RerankWeights::default()
    };
    let result = rerank_by_entity("SK하이닉스 시장 분석", candidates, &registry(), weights);
    assert_eq!(result.len(), 1);
    assert!((result[0].score - 0.9 * 0.5).abs() < 1e-9);
}

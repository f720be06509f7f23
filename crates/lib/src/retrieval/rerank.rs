//! # Entity-Aware Reranking
//!
//! Pure vector similarity happily returns chunks that merely *mention* a
//! target company (cross-reference noise), and tables are the worst
//! offenders because of their dense named-entity content. This reranker
//! classifies the query intent, extracts the target companies from an
//! alias registry, and filters or rescales candidates accordingly.
//!
//! Factoid queries drop every candidate that does not mention a target
//! company, which is what keeps single-company reports free of
//! cross-company leakage.

use crate::types::{ChunkType, Passage};
use std::collections::HashMap;
use tracing::debug;

/// Canonical company name to alias strings (the canonical name included).
pub type AliasRegistry = HashMap<String, Vec<String>>;

/// Deterministic, rule-based classification of what a query wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// Comparative or trend analysis; cross-company context is useful.
    Analytical,
    /// A single verifiable fact; foreign-company chunks are noise.
    Factoid,
}

/// Keywords marking comparative/analytical queries.
const ANALYTICAL_KEYWORDS: [&str; 14] = [
    "비교", "대비", "경쟁", "경쟁사", "분석", "SWOT", "전망", "추세", "점유율", "순위", "성장률",
    "동향", "전략", "시장",
];

/// Keywords marking factoid lookups.
const FACTOID_KEYWORDS: [&str; 14] = [
    "설립",
    "설립일",
    "주소",
    "본사",
    "대표",
    "대표이사",
    "CEO",
    "임원",
    "전화",
    "연락처",
    "주주",
    "지분",
    "자본금",
    "상장일",
];

/// Classifies a query by keyword lookup. Defaults to `Analytical`: the
/// penalty path loses less information than the factoid drop path.
pub fn classify_intent(query: &str) -> QueryIntent {
    if ANALYTICAL_KEYWORDS.iter().any(|kw| query.contains(kw)) {
        QueryIntent::Analytical
    } else if FACTOID_KEYWORDS.iter().any(|kw| query.contains(kw)) {
        QueryIntent::Factoid
    } else {
        QueryIntent::Analytical
    }
}

/// Alias strings of every company whose alias appears in the query.
///
/// Matching one alias pulls in all of that company's aliases, so a query
/// naming a ticker still matches chunks naming the full legal entity.
pub fn extract_targets<'a>(query: &str, aliases: &'a AliasRegistry) -> Vec<&'a str> {
    let mut targets = Vec::new();
    for alias_set in aliases.values() {
        if alias_set.iter().any(|alias| query.contains(alias.as_str())) {
            targets.extend(alias_set.iter().map(String::as_str));
        }
    }
    targets
}

/// Scoring adjustments applied around the boost/penalty multipliers.
#[derive(Debug, Clone, Copy)]
pub struct RerankWeights {
    pub boost_multiplier: f64,
    pub penalty_multiplier: f64,
    pub drop_unmatched_tables: bool,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            boost_multiplier: 1.3,
            penalty_multiplier: 0.5,
            drop_unmatched_tables: true,
        }
    }
}

/// Reranks candidates by target-entity match and query intent.
///
/// With no target extracted from the query the candidates pass through
/// untouched; reranking without a target would only destroy recall.
pub fn rerank_by_entity(
    query: &str,
    candidates: Vec<Passage>,
    aliases: &AliasRegistry,
    weights: RerankWeights,
) -> Vec<Passage> {
    let targets = extract_targets(query, aliases);
    if targets.is_empty() {
        return candidates;
    }
    let intent = classify_intent(query);
    debug!(?intent, targets = targets.len(), "Entity-aware rerank");

    let mut reranked: Vec<Passage> = candidates
        .into_iter()
        .filter_map(|mut passage| {
            // Corpus passages match on the JOIN-resolved company name: a
            // foreign company's chunk that merely mentions the target in
            // its text is exactly the cross-reference noise this filter
            // exists to remove. Text matching applies only to passages
            // without provenance.
            let matched = match passage.provenance.as_ref() {
                Some(provenance) => targets
                    .iter()
                    .any(|target| provenance.company_name.contains(target)),
                None => {
                    let haystack = format!("{} {}", passage.title, passage.raw_content());
                    targets.iter().any(|target| haystack.contains(target))
                }
            };
            let chunk_type = passage
                .provenance
                .as_ref()
                .map(|p| p.chunk_type)
                .unwrap_or(ChunkType::Text);

            if matched {
                passage.score *= weights.boost_multiplier;
                return Some(passage);
            }
            match (intent, chunk_type) {
                (QueryIntent::Factoid, _) => None,
                (QueryIntent::Analytical, ChunkType::Table) if weights.drop_unmatched_tables => {
                    None
                }
                (QueryIntent::Analytical, _) => {
                    passage.score *= weights.penalty_multiplier;
                    Some(passage)
                }
            }
        })
        .collect();

    reranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    reranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provenance;

    fn registry() -> AliasRegistry {
        HashMap::from([
            (
                "SK하이닉스".to_string(),
                vec!["SK하이닉스".to_string(), "하이닉스".to_string()],
            ),
            (
                "삼성전자".to_string(),
                vec!["삼성전자".to_string(), "삼성".to_string()],
            ),
        ])
    }

    fn passage(
        url: &str,
        company: &str,
        content: &str,
        chunk_type: ChunkType,
        score: f64,
    ) -> Passage {
        Passage {
            url: url.to_string(),
            title: String::new(),
            snippets: vec![content.to_string()],
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
    fn intent_classification_prefers_analytical() {
        assert_eq!(classify_intent("삼성전자와 비교"), QueryIntent::Analytical);
        assert_eq!(classify_intent("대표이사 이름"), QueryIntent::Factoid);
        // A query with both kinds of keywords is analytical.
        assert_eq!(
            classify_intent("설립 이후 점유율 추세"),
            QueryIntent::Analytical
        );
        assert_eq!(classify_intent("무언가 다른 질문"), QueryIntent::Analytical);
    }

    #[test]
    fn no_alias_match_is_a_passthrough() {
        let candidates = vec![passage("u1", "SK하이닉스", "아무 내용", ChunkType::Table, 0.9)];
        let result = rerank_by_entity(
            "어떤 회사와도 무관한 질문",
            candidates.clone(),
            &registry(),
            RerankWeights::default(),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].score, candidates[0].score);
    }

    #[test]
    fn factoid_drops_every_foreign_company_candidate() {
        // The foreign chunk mentions the target by name; the mention is
        // exactly the cross-reference noise the factoid filter removes.
        let candidates = vec![
            passage(
                "u1",
                "SK하이닉스",
                "본사는 이천시.",
                ChunkType::Text,
                0.8,
            ),
            passage(
                "u2",
                "삼성전자",
                "경쟁사인 SK하이닉스에 대해.",
                ChunkType::Text,
                0.9,
            ),
        ];
        let result = rerank_by_entity(
            "SK하이닉스 본사 주소",
            candidates,
            &registry(),
            RerankWeights::default(),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].url, "u1");
        assert!((result[0].score - 0.8 * 1.3).abs() < 1e-9);
    }

    #[test]
    fn analytical_keeps_foreign_text_with_penalty_and_drops_foreign_tables() {
        let candidates = vec![
            passage(
                "matched",
                "SK하이닉스",
                "점유율 상승",
                ChunkType::Text,
                0.5,
            ),
            passage("text", "삼성전자", "업계 전반의 동향", ChunkType::Text, 0.9),
            passage("table", "삼성전자", "| 매출 | 100 |", ChunkType::Table, 0.95),
        ];
        let result = rerank_by_entity(
            "SK하이닉스 점유율 분석",
            candidates,
            &registry(),
            RerankWeights::default(),
        );

        let urls: Vec<&str> = result.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["matched", "text"]);
        assert!((result[0].score - 0.5 * 1.3).abs() < 1e-9);
        assert!((result[1].score - 0.9 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn alias_match_covers_all_aliases_of_the_target() {
        // Query says 하이닉스; the chunk belongs to SK하이닉스. Both point
        // at the same canonical entry, so the chunk counts as matched.
        let candidates = vec![passage(
            "u1",
            "SK하이닉스",
            "설립일은 1983년.",
            ChunkType::Text,
            0.7,
        )];
        let result = rerank_by_entity(
            "하이닉스 설립일",
            candidates,
            &registry(),
            RerankWeights::default(),
        );
        assert_eq!(result.len(), 1);
        assert!((result[0].score - 0.7 * 1.3).abs() < 1e-9);
    }

    #[test]
    fn web_passages_match_on_text() {
        let mut web = passage("https://w.example", "", "SK하이닉스 뉴스", ChunkType::Text, 0.4);
        web.provenance = None;
        let result = rerank_by_entity(
            "SK하이닉스 본사 주소",
            vec![web],
            &registry(),
            RerankWeights::default(),
        );
        assert_eq!(result.len(), 1);
        assert!((result[0].score - 0.4 * 1.3).abs() < 1e-9);
    }
}

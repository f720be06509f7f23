//! # Source Tagging
//!
//! Prepends a visible provenance header to each internal passage. The
//! language model must *read* attribution as text; score adjustments
//! alone still let it hallucinate which company a number belongs to.

use crate::types::Passage;

/// The provenance header prefix, also used by tests to assert shape.
pub const SOURCE_TAG_PREFIX: &str = "[[Source: ";

/// Prepends `[[Source: {company} business report (Report ID: {id})]]` to
/// the passage text and records the company as the passage's source tag.
///
/// Passages without provenance (web results) pass through unchanged.
pub fn tag_passage(mut passage: Passage) -> Passage {
    let Some(provenance) = passage.provenance.as_ref() else {
        return passage;
    };

    let header = format!(
        "{SOURCE_TAG_PREFIX}{company} business report (Report ID: {report_id})]]\n\n",
        company = provenance.company_name,
        report_id = provenance.report_id,
    );
    match passage.snippets.first_mut() {
        Some(first) => *first = format!("{header}{first}"),
        None => passage.snippets.push(header),
    }
    passage.source_tag = provenance.company_name.clone();
    passage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkType, Provenance};

    #[test]
    fn header_lands_before_the_first_snippet() {
        let passage = Passage {
            url: "dart_report_3_chunk_9".into(),
            title: "사업의 개요".into(),
            snippets: vec!["매출은 증가했다.".into()],
            description: String::new(),
            score: 0.8,
            source_tag: String::new(),
            provenance: Some(Provenance {
                chunk_id: 9,
                report_id: 3,
                company_name: "SK하이닉스".into(),
                chunk_type: ChunkType::Text,
                sequence_order: 5,
                has_merged_meta: false,
            }),
        };

        let tagged = tag_passage(passage);
        assert!(tagged.snippets[0]
            .starts_with("[[Source: SK하이닉스 business report (Report ID: 3)]]\n\n"));
        assert!(tagged.snippets[0].ends_with("매출은 증가했다."));
        assert_eq!(tagged.source_tag, "SK하이닉스");
    }

    #[test]
    fn web_passages_are_untouched() {
        let passage = Passage {
            url: "https://example.com".into(),
            title: "t".into(),
            snippets: vec!["body".into()],
            description: String::new(),
            score: 0.5,
            source_tag: "web".into(),
            provenance: None,
        };
        let tagged = tag_passage(passage.clone());
        assert_eq!(tagged.snippets, passage.snippets);
        assert_eq!(tagged.source_tag, "web");
    }
}

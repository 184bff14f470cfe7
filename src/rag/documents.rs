//! Retrieval post-processing and prompt assembly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::models::ScoredDocument;

pub const CONTEXTS_PLACEHOLDER: &str = "contexts";

// `{{`, `}}` or a `{field}` replacement.
static TEMPLATE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}").unwrap());

/// Keep documents scoring strictly above `min_score`, preserving order.
/// The comparison is done in `f64`: a `0.3` threshold keeps a `0.3f32` hit.
pub fn filter_by_score(documents: Vec<ScoredDocument>, min_score: f64) -> Vec<ScoredDocument> {
    documents
        .into_iter()
        .filter(|d| f64::from(d.score) > min_score)
        .collect()
}

pub fn truncate(mut documents: Vec<ScoredDocument>, limit: usize) -> Vec<ScoredDocument> {
    documents.truncate(limit);
    documents
}

/// One citation block per document:
/// `> {content}\nSource: {file_name}, page# {page_label};\n\n`
pub fn format_sources(documents: &[ScoredDocument]) -> Result<String> {
    let mut sources = String::new();
    for scored in documents {
        let doc = &scored.document;
        let file_name = metadata_text(&doc.metadata, "file_name")?;
        let page_label = metadata_text(&doc.metadata, "page_label")?;
        sources.push_str(&format!(
            "> {}\nSource: {}, page# {};\n\n",
            doc.page_content, file_name, page_label
        ));
    }
    Ok(sources)
}

fn metadata_text(metadata: &serde_json::Map<String, JsonValue>, key: &str) -> Result<String> {
    match metadata.get(key) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(Error::MissingMetadata(key.to_string())),
    }
}

/// Substitute `contexts` into a `{contexts}` template.
///
/// `{{` and `}}` are literal braces. The template must reference
/// `{contexts}` at least once and nothing else; stray single braces are
/// rejected.
pub fn render_prompt(template: &str, contexts: &str) -> Result<String> {
    let mut rendered = String::with_capacity(template.len() + contexts.len());
    let mut substitutions = 0usize;
    let mut last = 0usize;

    for caps in TEMPLATE_TOKEN.captures_iter(template) {
        let token = caps.get(0).map(|m| (m.start(), m.end(), m.as_str()));
        let Some((start, end, text)) = token else {
            continue;
        };
        push_literal(&mut rendered, &template[last..start])?;
        match text {
            "{{" => rendered.push('{'),
            "}}" => rendered.push('}'),
            _ => {
                let field = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                if field != CONTEXTS_PLACEHOLDER {
                    return Err(Error::Template(format!("unknown placeholder '{{{}}}'", field)));
                }
                rendered.push_str(contexts);
                substitutions += 1;
            }
        }
        last = end;
    }
    push_literal(&mut rendered, &template[last..])?;

    if substitutions == 0 {
        return Err(Error::Template(format!(
            "system prompt has no '{{{}}}' placeholder",
            CONTEXTS_PLACEHOLDER
        )));
    }
    Ok(rendered)
}

fn push_literal(out: &mut String, literal: &str) -> Result<()> {
    if literal.contains('{') || literal.contains('}') {
        return Err(Error::Template(format!("unbalanced brace in '{}'", literal)));
    }
    out.push_str(literal);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;

    fn scored(text: &str, score: f32) -> ScoredDocument {
        ScoredDocument::new(
            Document::new(text)
                .with_metadata("file_name", format!("{}.pdf", text))
                .with_metadata("page_label", "4"),
            score,
        )
    }

    #[test]
    fn test_filter_is_strict() {
        let docs = vec![scored("a", 0.9), scored("b", 0.5), scored("c", 0.3), scored("d", 0.51)];
        let kept: Vec<String> = filter_by_score(docs, 0.5)
            .into_iter()
            .map(|d| d.document.page_content)
            .collect();
        assert_eq!(kept, vec!["a", "d"]);
    }

    #[test]
    fn test_filter_compares_in_f64() {
        // 0.3f32 widens to 0.30000001192..., above the decimal threshold 0.3.
        let kept = filter_by_score(vec![scored("edge", 0.3)], 0.3);
        assert_eq!(kept.len(), 1);

        // 0.1f32 widens to 0.10000000149..., which is not above 0.11.
        assert!(filter_by_score(vec![scored("low", 0.1)], 0.11).is_empty());
    }

    #[test]
    fn test_truncate_keeps_prefix() {
        let docs = vec![scored("a", 0.1), scored("b", 0.9), scored("c", 0.5)];
        let kept: Vec<String> = truncate(docs.clone(), 2)
            .into_iter()
            .map(|d| d.document.page_content)
            .collect();
        assert_eq!(kept, vec!["a", "b"]);
        assert_eq!(truncate(docs.clone(), 10).len(), 3);
        assert!(truncate(docs, 0).is_empty());
    }

    #[test]
    fn test_format_produces_one_block_per_document() {
        let docs = vec![scored("alpha", 0.9), scored("beta", 0.8), scored("gamma", 0.7)];
        let sources = format_sources(&docs).unwrap();

        assert_eq!(sources.matches("Source: ").count(), 3);
        for name in ["alpha", "beta", "gamma"] {
            assert!(sources.contains(&format!("> {}\nSource: {}.pdf, page# 4;\n\n", name, name)));
        }
    }

    #[test]
    fn test_format_renders_numeric_page_labels() {
        let doc = ScoredDocument::new(
            Document::new("x")
                .with_metadata("file_name", "x.pdf")
                .with_metadata("page_label", 7),
            1.0,
        );
        assert_eq!(format_sources(&[doc]).unwrap(), "> x\nSource: x.pdf, page# 7;\n\n");
    }

    #[test]
    fn test_format_requires_citation_metadata() {
        let doc = ScoredDocument::new(Document::new("x").with_metadata("file_name", "x.pdf"), 1.0);
        match format_sources(&[doc]) {
            Err(Error::MissingMetadata(key)) => assert_eq!(key, "page_label"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_render_substitutes_contexts() {
        let out = render_prompt("Answer only from:\n{contexts}\nBe brief.", "> a\n").unwrap();
        assert_eq!(out, "Answer only from:\n> a\n\nBe brief.");
    }

    #[test]
    fn test_render_handles_escaped_braces() {
        let out = render_prompt("Reply as {{\"answer\": ...}} using {contexts}", "SRC").unwrap();
        assert_eq!(out, "Reply as {\"answer\": ...} using SRC");
    }

    #[test]
    fn test_render_does_not_reinterpret_contexts() {
        let out = render_prompt("{contexts}", "{user braces}").unwrap();
        assert_eq!(out, "{user braces}");
    }

    #[test]
    fn test_render_rejects_missing_placeholder() {
        assert!(matches!(render_prompt("", "x"), Err(Error::Template(_))));
        assert!(matches!(render_prompt("no slot here", "x"), Err(Error::Template(_))));
    }

    #[test]
    fn test_render_rejects_unknown_and_stray_braces() {
        assert!(render_prompt("{contexts} for {name}", "x").is_err());
        assert!(render_prompt("{contexts} }", "x").is_err());
        assert!(render_prompt("{contexts", "x").is_err());
    }
}

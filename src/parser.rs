//! Tolerant parser for tagged LLM extraction output.
//!
//! Never panics and never returns an error: malformed input degrades to
//! partial or empty results, per the spec's "total function" contract.

use std::collections::HashMap;

/// One parsed entity line (`name|type|summary...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntity {
    pub name: String,
    pub entity_type: String,
    pub summary: String,
}

/// One parsed relationship line (`source|relation|target|date?`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRelationship {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub date: Option<String>,
}

/// Result of parsing one LLM extraction response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub memory_text: String,
    pub entities: Vec<ParsedEntity>,
    pub relationships: Vec<ParsedRelationship>,
    /// Event date keyed by the 0-based line index within `memory_text`.
    pub event_dates: HashMap<usize, String>,
}

/// Parse a tagged LLM extraction response into memories, entities,
/// relationships, and per-line event dates. Total and panic-free.
#[must_use]
pub fn parse_extraction(text: &str) -> ExtractionResult {
    let entities_block = extract_tagged_section(text, "entities");
    let relationships_block = extract_tagged_section(text, "relationships");
    let memories_block = extract_tagged_section(text, "memories");

    let memory_text = match memories_block {
        Some((_, inner)) => inner.trim().to_string(),
        None => strip_tagged_sections(text, &["entities", "relationships"])
            .trim()
            .to_string(),
    };

    let entities = entities_block
        .map(|(_, inner)| parse_entity_lines(&inner))
        .unwrap_or_default();

    let relationships = relationships_block
        .map(|(_, inner)| parse_relationship_lines(&inner))
        .unwrap_or_default();

    let event_dates = extract_event_dates(&memory_text);

    ExtractionResult {
        memory_text,
        entities,
        relationships,
        event_dates,
    }
}

/// Find `<tag>...</tag>` and return `(full_match_span, inner_text)`. Returns
/// `None` if the tag is absent or unterminated.
fn extract_tagged_section(text: &str, tag: &str) -> Option<(std::ops::Range<usize>, String)> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let open_idx = text.find(&open)?;
    let after_open = open_idx + open.len();
    let close_idx = text[after_open..].find(&close)? + after_open;
    let inner = text[after_open..close_idx].to_string();
    Some((open_idx..(close_idx + close.len()), inner))
}

fn strip_tagged_sections(text: &str, tags: &[&str]) -> String {
    let mut result = text.to_string();
    for tag in tags {
        if let Some((span, _)) = extract_tagged_section(&result, tag) {
            result.replace_range(span, "");
        }
    }
    result
}

/// A line qualifies only if it contains `|` and yields >= 3 non-empty
/// leading fields.
fn leading_fields(line: &str, min_fields: usize) -> Option<Vec<String>> {
    let line = line.trim();
    if line.is_empty() || !line.contains('|') {
        return None;
    }
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < min_fields {
        return None;
    }
    for part in parts.iter().take(min_fields) {
        if part.trim().is_empty() {
            return None;
        }
    }
    Some(parts.into_iter().map(|p| p.trim().to_string()).collect())
}

fn parse_entity_lines(block: &str) -> Vec<ParsedEntity> {
    let mut out = Vec::new();
    for line in block.lines() {
        let Some(fields) = leading_fields(line, 3) else {
            continue;
        };
        // Summary keeps any additional pipes verbatim.
        let summary = fields[2..].join("|");
        out.push(ParsedEntity {
            name: fields[0].clone(),
            entity_type: fields[1].to_lowercase(),
            summary,
        });
    }
    out
}

fn parse_relationship_lines(block: &str) -> Vec<ParsedRelationship> {
    let mut out = Vec::new();
    for line in block.lines() {
        let Some(fields) = leading_fields(line, 3) else {
            continue;
        };
        let date = fields.get(3).filter(|d| !d.is_empty()).cloned();
        out.push(ParsedRelationship {
            source: fields[0].clone(),
            relation: fields[1].clone(),
            target: fields[2].clone(),
            date,
        });
    }
    out
}

/// For each non-empty memory-text line beginning with `[YYYY-MM-DD]`,
/// record the date against that line's 0-based index.
fn extract_event_dates(memory_text: &str) -> HashMap<usize, String> {
    let mut dates = HashMap::new();
    for (idx, line) in memory_text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(date) = leading_bracket_date(trimmed) {
            dates.insert(idx, date);
        }
    }
    dates
}

fn leading_bracket_date(line: &str) -> Option<String> {
    let rest = line.strip_prefix('[')?;
    let close = rest.find(']')?;
    let candidate = &rest[..close];
    if is_iso_date(candidate) {
        Some(candidate.to_string())
    } else {
        None
    }
}

fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes.iter().enumerate().all(|(i, b)| {
            if i == 4 || i == 7 {
                true
            } else {
                b.is_ascii_digit()
            }
        })
}

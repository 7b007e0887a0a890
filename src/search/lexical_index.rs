//! Inverted-index lexical scorer (tokenized term frequency, damped by
//! document-frequency) — "BM25-style" per the spec, deliberately simpler
//! than full Okapi BM25 (no document-length normalization term).

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct LexicalIndex {
    /// token -> (chunk id -> term frequency within that chunk)
    postings: HashMap<String, HashMap<String, u32>>,
    /// chunk id -> token multiset, kept so `remove`/`upsert` can clean postings.
    doc_tokens: HashMap<String, Vec<String>>,
}

impl LexicalIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, id: &str, content: &str) {
        self.remove(id);
        let tokens = tokenize(content);
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for t in &tokens {
            *freqs.entry(t.clone()).or_insert(0) += 1;
        }
        for (token, freq) in &freqs {
            self.postings
                .entry(token.clone())
                .or_default()
                .insert(id.to_string(), *freq);
        }
        self.doc_tokens.insert(id.to_string(), tokens);
    }

    pub fn remove(&mut self, id: &str) {
        if let Some(tokens) = self.doc_tokens.remove(id) {
            let unique: HashSet<&String> = tokens.iter().collect();
            for token in unique {
                if let Some(docs) = self.postings.get_mut(token) {
                    docs.remove(id);
                    if docs.is_empty() {
                        self.postings.remove(token);
                    }
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.doc_tokens.clear();
    }

    #[must_use]
    pub fn doc_count(&self) -> usize {
        self.doc_tokens.len()
    }

    /// Score every chunk id in `restrict_to` against `query`. IDs present in
    /// `restrict_to` but with no lexical overlap score 0.0.
    #[must_use]
    pub fn score(&self, query: &str, restrict_to: &[String]) -> HashMap<String, f32> {
        let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();

        let mut scores: HashMap<String, f32> =
            restrict_to.iter().map(|id| (id.clone(), 0.0)).collect();

        for token in &query_tokens {
            let Some(docs) = self.postings.get(token) else {
                continue;
            };
            let doc_freq = docs.len() as f32;
            let idf_damped = 1.0 / (1.0 + doc_freq.max(1.0).ln());
            for id in restrict_to {
                if let Some(tf) = docs.get(id) {
                    *scores.entry(id.clone()).or_insert(0.0) += (*tf as f32) * idf_damped;
                }
            }
        }

        scores
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_zero_for_docs_with_no_overlap() {
        let mut idx = LexicalIndex::new();
        idx.upsert("a", "Alice met Bob in Berlin");
        idx.upsert("b", "the weather is nice today");

        let scores = idx.score("Alice Berlin", &["a".to_string(), "b".to_string()]);
        assert!(scores["a"] > 0.0);
        assert_eq!(scores["b"], 0.0);
    }

    #[test]
    fn upsert_replaces_previous_content() {
        let mut idx = LexicalIndex::new();
        idx.upsert("a", "cats and dogs");
        idx.upsert("a", "only birds now");
        let scores = idx.score("cats", &["a".to_string()]);
        assert_eq!(scores["a"], 0.0);
    }

    #[test]
    fn remove_clears_postings() {
        let mut idx = LexicalIndex::new();
        idx.upsert("a", "unique token zzyx");
        idx.remove("a");
        let scores = idx.score("zzyx", &["a".to_string()]);
        assert_eq!(scores["a"], 0.0);
        assert_eq!(idx.doc_count(), 0);
    }

    #[test]
    fn tokenizer_lowercases_and_splits_on_punctuation() {
        let tokens = tokenize("Hello, World! It's 2024.");
        assert!(tokens.contains(&"hello".to_string()));
        assert!(tokens.contains(&"world".to_string()));
        assert!(tokens.contains(&"2024".to_string()));
    }
}

//! Entity graph: nodes keyed by canonical name, a substring/word name index,
//! bidirectional adjacency, and bounded multi-hop traversal.

use crate::types::{EntityNode, RelationshipEdge};
use std::collections::{HashMap, HashSet, VecDeque};

const SUMMARY_MAX_LEN: usize = 500;
const SUMMARY_DEDUP_PREFIX_LEN: usize = 40;
const NAME_INDEX_MIN_PART_LEN: usize = 2;

/// Bounded subgraph returned by [`EntityGraph::get_context`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphContext {
    pub entities: Vec<EntityNode>,
    pub relationships: Vec<RelationshipEdge>,
}

/// One container's entity graph.
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    nodes: HashMap<String, EntityNode>,
    /// Adjacency: canonical name -> keys of incident edges (both directions).
    adjacency: HashMap<String, Vec<String>>,
    /// Edge storage keyed by `source|relation|target`.
    edges: HashMap<String, RelationshipEdge>,
    /// lowercased token -> canonical names containing that token.
    name_index: HashMap<String, HashSet<String>>,
}

impl EntityGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or merge an entity. Trims `name`; a purely-whitespace name is
    /// rejected silently (the caller gets no node, no error — callers that
    /// care can check `node_count` before/after).
    pub fn add_entity(&mut self, name: &str, entity_type: &str, summary: &str, session_id: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let entity_type = entity_type.to_lowercase();

        if let Some(existing) = self.nodes.get_mut(name) {
            existing.session_ids.insert(session_id.to_string());
            let prefix: String = summary.chars().take(SUMMARY_DEDUP_PREFIX_LEN).collect();
            if !prefix.is_empty() && !existing.summary.contains(&prefix) {
                existing.summary.push(' ');
                existing.summary.push_str(summary);
                existing.summary.truncate(SUMMARY_MAX_LEN);
            }
        } else {
            let mut node_summary = summary.to_string();
            node_summary.truncate(SUMMARY_MAX_LEN);
            let mut session_ids = HashSet::new();
            session_ids.insert(session_id.to_string());
            self.nodes.insert(
                name.to_string(),
                EntityNode {
                    name: name.to_string(),
                    entity_type,
                    summary: node_summary,
                    session_ids,
                },
            );
        }

        self.index_name(name);
    }

    fn index_name(&mut self, name: &str) {
        let lower = name.to_lowercase();
        self.name_index
            .entry(lower.clone())
            .or_default()
            .insert(name.to_string());
        for part in lower.split_whitespace() {
            if part.chars().count() > NAME_INDEX_MIN_PART_LEN {
                self.name_index
                    .entry(part.to_string())
                    .or_default()
                    .insert(name.to_string());
            }
        }
    }

    /// Add a relationship; duplicates (by `source|relation|target`) are
    /// silently ignored. Appends to both endpoints' adjacency lists.
    pub fn add_relationship(&mut self, edge: RelationshipEdge) {
        let key = edge.key();
        if self.edges.contains_key(&key) {
            return;
        }
        self.adjacency
            .entry(edge.source.clone())
            .or_default()
            .push(key.clone());
        self.adjacency
            .entry(edge.target.clone())
            .or_default()
            .push(key.clone());
        self.edges.insert(key, edge);
    }

    /// Lowercase `query`; for every indexed token of length > 2, test a
    /// whole-word match and collect the union of mapped canonical names.
    #[must_use]
    pub fn find_entities_in_query(&self, query: &str) -> Vec<String> {
        let lower = query.to_lowercase();
        let mut found: HashSet<String> = HashSet::new();

        for (token, names) in &self.name_index {
            if token.chars().count() <= NAME_INDEX_MIN_PART_LEN {
                continue;
            }
            if whole_word_match(&lower, token) {
                found.extend(names.iter().cloned());
            }
        }

        found.into_iter().collect()
    }

    /// BFS from `seeds` up to `max_hops` (seeds are hop 0, not counted).
    /// Seed entities that exist as nodes are included in the returned
    /// `entities` (subject to `max_entities`) alongside everything reached
    /// by traversal. Caps apply to OUTPUT only; traversal keeps expanding
    /// the frontier past a cap so later hops are still explored, they just
    /// stop adding to `entities`/`relationships` once full.
    #[must_use]
    pub fn get_context(
        &self,
        seeds: &[String],
        max_hops: usize,
        max_entities: usize,
        max_relationships: usize,
    ) -> GraphContext {
        let mut visited: HashSet<String> = seeds.iter().cloned().collect();
        let mut frontier: Vec<String> = seeds.to_vec();
        let mut out_entities: Vec<EntityNode> = Vec::new();
        let mut out_entity_names: HashSet<String> = HashSet::new();
        let mut out_edges: Vec<RelationshipEdge> = Vec::new();
        let mut out_edge_keys: HashSet<String> = HashSet::new();

        for seed in seeds {
            if out_entity_names.len() >= max_entities {
                break;
            }
            if let Some(node) = self.nodes.get(seed) {
                if out_entity_names.insert(seed.clone()) {
                    out_entities.push(node.clone());
                }
            }
        }

        for _hop in 0..max_hops {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier: Vec<String> = Vec::new();

            for name in &frontier {
                let Some(edge_keys) = self.adjacency.get(name) else {
                    continue;
                };
                for ek in edge_keys {
                    let Some(edge) = self.edges.get(ek) else {
                        continue;
                    };
                    if out_edge_keys.len() < max_relationships && !out_edge_keys.contains(ek) {
                        out_edge_keys.insert(ek.clone());
                        out_edges.push(edge.clone());
                    }

                    let neighbor = if &edge.source == name {
                        &edge.target
                    } else {
                        &edge.source
                    };
                    if !visited.contains(neighbor) {
                        visited.insert(neighbor.clone());
                        next_frontier.push(neighbor.clone());
                        if out_entity_names.len() < max_entities {
                            if let Some(node) = self.nodes.get(neighbor) {
                                out_entity_names.insert(neighbor.clone());
                                out_entities.push(node.clone());
                            }
                        }
                    }
                }
            }

            frontier = next_frontier;
        }

        GraphContext {
            entities: out_entities,
            relationships: out_edges,
        }
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&EntityNode> {
        self.nodes.get(name)
    }

    #[must_use]
    pub fn all_entities(&self) -> Vec<EntityNode> {
        self.nodes.values().cloned().collect()
    }

    #[must_use]
    pub fn all_relationships(&self) -> Vec<RelationshipEdge> {
        self.edges.values().cloned().collect()
    }

    /// Rebuild a graph from its persisted node/edge lists (snapshot load).
    /// Inserts nodes directly rather than through `add_entity`'s merge
    /// logic, since a snapshot's nodes are already fully merged.
    pub fn load(&mut self, nodes: Vec<EntityNode>, edges: Vec<RelationshipEdge>) {
        for node in nodes {
            self.index_name(&node.name);
            self.nodes.insert(node.name.clone(), node);
        }
        for edge in edges {
            self.add_relationship(edge);
        }
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.edges.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.adjacency.clear();
        self.edges.clear();
        self.name_index.clear();
    }
}

fn whole_word_match(haystack: &str, needle: &str) -> bool {
    let is_boundary = |c: Option<char>| match c {
        None => true,
        Some(c) => !(c.is_alphanumeric() || c == '_'),
    };

    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs_pos = start + pos;
        let before = haystack[..abs_pos].chars().next_back();
        let after = haystack[abs_pos + needle.len()..].chars().next();
        if is_boundary(before) && is_boundary(after) {
            return true;
        }
        start = abs_pos + needle.len().max(1);
        if start >= haystack.len() {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, relation: &str, target: &str) -> RelationshipEdge {
        RelationshipEdge {
            source: source.to_string(),
            relation: relation.to_string(),
            target: target.to_string(),
            date: None,
            session_id: "s1".to_string(),
        }
    }

    #[test]
    fn add_entity_trims_and_rejects_empty() {
        let mut g = EntityGraph::new();
        g.add_entity("  Alice  ", "PERSON", "likes tea", "s1");
        assert_eq!(g.entity_count(), 1);
        assert_eq!(g.node("Alice").unwrap().entity_type, "person");

        g.add_entity("   ", "person", "whatever", "s1");
        assert_eq!(g.entity_count(), 1);
    }

    #[test]
    fn repeated_entity_merges_sessions_and_summary() {
        let mut g = EntityGraph::new();
        g.add_entity("Alice", "person", "likes tea", "s1");
        g.add_entity("Alice", "person", "works at Acme", "s2");
        let node = g.node("Alice").unwrap();
        assert!(node.session_ids.contains("s1"));
        assert!(node.session_ids.contains("s2"));
        assert!(node.summary.contains("likes tea"));
        assert!(node.summary.contains("works at Acme"));
    }

    #[test]
    fn summary_merge_skips_near_duplicate_prefix() {
        let mut g = EntityGraph::new();
        let long_summary = "x".repeat(60);
        g.add_entity("Alice", "person", &long_summary, "s1");
        // Same 40-char prefix already present -> should not duplicate.
        g.add_entity("Alice", "person", &long_summary, "s2");
        let node = g.node("Alice").unwrap();
        assert_eq!(node.summary, long_summary);
    }

    #[test]
    fn summary_is_capped_at_500_chars() {
        let mut g = EntityGraph::new();
        g.add_entity("Alice", "person", &"a".repeat(400), "s1");
        g.add_entity("Alice", "person", &"b".repeat(400), "s2");
        assert_eq!(g.node("Alice").unwrap().summary.len(), 500);
    }

    #[test]
    fn duplicate_relationship_triples_are_ignored() {
        let mut g = EntityGraph::new();
        g.add_relationship(edge("Alice", "married_to", "Bob"));
        g.add_relationship(edge("Alice", "married_to", "Bob"));
        assert_eq!(g.relationship_count(), 1);
    }

    #[test]
    fn find_entities_in_query_matches_whole_words() {
        let mut g = EntityGraph::new();
        g.add_entity("Alice Smith", "person", "", "s1");
        let hits = g.find_entities_in_query("tell me about Alice please");
        assert!(hits.contains(&"Alice Smith".to_string()));

        // "al" should not spuriously match inside "Alice" by substring rules
        // since matching is whole-word over indexed tokens, not substrings
        // of the query.
        let no_hits = g.find_entities_in_query("al");
        assert!(no_hits.is_empty());
    }

    #[test]
    fn get_context_respects_caps() {
        let mut g = EntityGraph::new();
        for i in 0..30 {
            g.add_entity(&format!("Person{i}"), "person", "", "s1");
            g.add_relationship(edge("Seed", "knows", &format!("Person{i}")));
        }
        g.add_entity("Seed", "person", "", "s1");

        let ctx = g.get_context(&["Seed".to_string()], 2, 10, 20);
        assert!(ctx.entities.len() <= 10);
        assert!(ctx.relationships.len() <= 20);
    }

    #[test]
    fn get_context_seed_layer_is_not_a_hop() {
        let mut g = EntityGraph::new();
        g.add_entity("Alice", "person", "", "s1");
        g.add_entity("Bob", "person", "", "s1");
        g.add_entity("Acme", "organization", "", "s1");
        g.add_relationship(edge("Alice", "married_to", "Bob"));
        g.add_relationship(edge("Alice", "works_at", "Acme"));

        let ctx = g.get_context(&["Alice".to_string()], 2, 10, 20);
        let names: HashSet<_> = ctx.entities.iter().map(|e| e.name.clone()).collect();
        assert!(names.contains("Bob"));
        assert!(names.contains("Acme"));
        assert_eq!(ctx.relationships.len(), 2);
    }

    #[test]
    fn bfs_terminates_on_cycles() {
        let mut g = EntityGraph::new();
        g.add_entity("A", "x", "", "s1");
        g.add_entity("B", "x", "", "s1");
        g.add_relationship(edge("A", "knows", "B"));
        g.add_relationship(edge("B", "knows", "A"));

        let ctx = g.get_context(&["A".to_string()], 5, 10, 20);
        // Seed "A" plus neighbor "B" — the cycle must not revisit either and
        // loop forever or duplicate entries.
        assert_eq!(ctx.entities.len(), 2);
    }
}

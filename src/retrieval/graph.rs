//! Entity co-occurrence graph built over the loaded documents.

use std::collections::{HashMap, HashSet};

/// Named entity found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    /// Original surface form
    pub name: String,
    /// Lowercased form used for matching
    pub normalized: String,
    /// Document the entity was found in
    pub document: String,
}

/// Co-occurrence between neighbouring entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub weight: f32,
}

/// Heuristic extractor: capitalized words, handles, hashtags and tokens with digits.
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    stopwords: HashSet<&'static str>,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor {
    pub fn new() -> Self {
        let stopwords = [
            "and", "or", "but", "the", "a", "an", "of", "in", "on", "for", "to", "with", "this",
            "that", "what", "when", "where", "which", "how", "why",
        ]
        .into_iter()
        .collect();
        Self { stopwords }
    }

    pub fn extract(&self, document: &str, text: &str) -> (Vec<Entity>, Vec<Relation>) {
        let mut entities = Vec::new();
        let mut seen = HashSet::new();

        for raw_token in text.split_whitespace() {
            let token =
                raw_token.trim_matches(|c: char| !c.is_alphanumeric() && c != '@' && c != '#');
            if token.chars().count() < 3 {
                continue;
            }
            let normalized = token.to_lowercase();
            if self.stopwords.contains(normalized.as_str()) {
                continue;
            }

            let is_candidate = token.chars().next().is_some_and(char::is_uppercase)
                || token.contains('@')
                || token.contains('#')
                || token.chars().any(char::is_numeric);

            if is_candidate && seen.insert(normalized.clone()) {
                entities.push(Entity {
                    name: token.to_string(),
                    normalized,
                    document: document.to_string(),
                });
            }
        }

        let relations = entities
            .windows(2)
            .map(|pair| Relation {
                from: pair[0].normalized.clone(),
                to: pair[1].normalized.clone(),
                weight: 1.0,
            })
            .collect();

        (entities, relations)
    }

    /// Normalized entity names in free text (used for queries).
    pub fn keywords(&self, text: &str) -> HashSet<String> {
        self.extract("query", text)
            .0
            .into_iter()
            .map(|e| e.normalized)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub occurrences: usize,
    pub documents: HashSet<String>,
}

#[derive(Debug, Default, Clone)]
pub struct KnowledgeGraph {
    nodes: HashMap<String, Node>,
    edges: HashMap<(String, String), f32>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract entities from every document and link co-occurring ones.
    pub fn build(extractor: &EntityExtractor, documents: &[(String, String)]) -> Self {
        let mut graph = Self::new();
        for (id, text) in documents {
            let (entities, relations) = extractor.extract(id, text);
            graph.add_entities(&entities);
            graph.add_relations(&relations);
        }
        graph
    }

    pub fn add_entities(&mut self, entities: &[Entity]) {
        for entity in entities {
            let node = self
                .nodes
                .entry(entity.normalized.clone())
                .or_insert_with(|| Node {
                    name: entity.name.clone(),
                    occurrences: 0,
                    documents: HashSet::new(),
                });
            node.occurrences += 1;
            node.documents.insert(entity.document.clone());
        }
    }

    pub fn add_relations(&mut self, relations: &[Relation]) {
        for rel in relations {
            *self
                .edges
                .entry(ordered(&rel.from, &rel.to))
                .or_insert(0.0) += rel.weight;
        }
    }

    pub fn node(&self, normalized: &str) -> Option<&Node> {
        self.nodes.get(normalized)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

fn ordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_entities_and_relations() {
        let extractor = EntityExtractor::new();
        let (entities, relations) =
            extractor.extract("doc", "Alice met Bob in Paris with @carol in 2024");

        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Paris", "@carol", "2024"]);
        assert_eq!(relations.len(), 4);
        assert!(entities.iter().all(|e| e.document == "doc"));
    }

    #[test]
    fn skips_stopwords_and_short_tokens() {
        let extractor = EntityExtractor::new();
        let (entities, _) = extractor.extract("doc", "The An Of Hi");
        assert!(entities.is_empty());
    }

    #[test]
    fn build_links_entities_across_documents() {
        let extractor = EntityExtractor::new();
        let docs = vec![
            ("d1".to_string(), "Alice works with Bob".to_string()),
            ("d2".to_string(), "Bob visits Alice".to_string()),
        ];
        let graph = KnowledgeGraph::build(&extractor, &docs);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let alice = graph.node("alice").unwrap();
        assert_eq!(alice.occurrences, 2);
        assert_eq!(alice.documents.len(), 2);
    }

    #[test]
    fn query_keywords_are_normalized() {
        let extractor = EntityExtractor::new();
        let keywords = extractor.keywords("What did Alice say about Rust?");
        assert!(keywords.contains("alice"));
        assert!(keywords.contains("rust"));
        assert!(!keywords.contains("what"));
    }
}

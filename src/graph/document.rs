use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::{GraphStore, Node, NodeId};

/// On-disk shape of the graph: `{ "nodes": [...], "links": [...] }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "deserialize_birth_year",
        skip_serializing_if = "Option::is_none"
    )]
    pub birth_year: Option<String>,
    #[serde(default, deserialize_with = "deserialize_images")]
    pub images: Vec<String>,
    #[serde(default, alias = "sfsfss_has_read", skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
    #[serde(default, alias = "story_links", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id1: NodeId,
    pub id2: NodeId,
    #[serde(default)]
    pub label: String,
}

fn deserialize_birth_year<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(year) if !year.trim().is_empty() => Some(year),
        Value::Number(year) => Some(year.to_string()),
        _ => None,
    })
}

fn deserialize_images<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(uri) => Some(uri),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

impl GraphDocument {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("invalid graph JSON")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize graph")
    }
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            name: node.name.clone(),
            birth_year: node.birth_year.clone().filter(|year| !year.is_empty()),
            images: node.images.clone(),
            flagged: node.flagged,
            tags: node.tags.clone(),
            extra: node.extra.clone(),
        }
    }
}

impl From<NodeRecord> for Node {
    fn from(record: NodeRecord) -> Self {
        let mut node = Node::new(record.id, record.name);
        node.birth_year = record.birth_year;
        node.images = record.images;
        node.flagged = record.flagged;
        node.tags = record.tags;
        node.extra = record.extra;
        node
    }
}

impl GraphStore {
    /// Builds a store from a loaded document. Edges are kept even when an endpoint is
    /// missing; traversal and visibility treat such edges as absent.
    pub fn from_document(document: GraphDocument) -> Self {
        let mut store = Self::new();
        for record in document.nodes {
            let id = record.id;
            if !store.insert_node(Node::from(record)) {
                warn!(id, "skipping node with duplicate id");
            }
        }
        for link in document.links {
            store.push_edge(link.id1, link.id2, link.label);
        }
        store
    }

    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.iter().map(NodeRecord::from).collect(),
            links: self
                .edges
                .iter()
                .map(|edge| LinkRecord {
                    id1: edge.id1,
                    id2: edge.id2,
                    label: edge.label.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"{
        "nodes": [
            { "id": 1, "name": "Poe", "birth_year": "1809", "images": ["images/1.png"] },
            { "id": 2, "name": "Verne", "birth_year": 1828, "sfsfss_has_read": true,
              "story_links": ["https://example.org/a"] },
            { "id": 5, "name": "Anon", "birth_year": "", "images": null, "note": "kept" }
        ],
        "links": [
            { "id1": 1, "id2": 2, "label": "influenced" },
            { "id1": 2, "id2": 9 }
        ]
    }"#;

    #[test]
    fn load_normalizes_optional_fields() {
        let store = GraphStore::from_document(GraphDocument::from_json(SAMPLE).unwrap());

        assert_eq!(store.node_count(), 3);
        assert_eq!(store.edge_count(), 2);
        assert_eq!(store.next_node_id(), 6);

        let verne = store.node(2).unwrap();
        assert_eq!(verne.birth_year.as_deref(), Some("1828"));
        assert!(verne.is_flagged());
        assert_eq!(verne.tags, Some(vec!["https://example.org/a".to_owned()]));

        let anon = store.node(5).unwrap();
        assert_eq!(anon.birth_year, None);
        assert!(anon.images.is_empty());
        assert_eq!(anon.extra.get("note"), Some(&Value::from("kept")));
        assert_eq!(store.edges()[1].label, "");
    }

    #[test]
    fn export_reload_export_is_value_equal() {
        let store = GraphStore::from_document(GraphDocument::from_json(SAMPLE).unwrap());
        let first = serde_json::to_value(store.to_document()).unwrap();

        let text = store.to_document().to_json().unwrap();
        let reloaded = GraphStore::from_document(GraphDocument::from_json(&text).unwrap());
        let second = serde_json::to_value(reloaded.to_document()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn export_omits_absent_year_and_keeps_images_list() {
        let mut store = GraphStore::new();
        store.insert_node(Node::new(1, "Poe"));
        let value = serde_json::to_value(store.to_document()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "nodes": [{ "id": 1, "name": "Poe", "images": [] }],
                "links": []
            })
        );
    }

    #[test]
    fn duplicate_node_ids_keep_the_first_record() {
        let raw = r#"{ "nodes": [ { "id": 1, "name": "A" }, { "id": 1, "name": "B" } ] }"#;
        let store = GraphStore::from_document(GraphDocument::from_json(raw).unwrap());
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.node(1).unwrap().name, "A");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(GraphDocument::from_json("{ nodes: ").is_err());
    }
}

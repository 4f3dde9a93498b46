//! Cause tree - 5-Whys mind map built from a nested JSON reply
//!
//! The mind map of an A3 case is a flat list of positioned nodes. Each node
//! points at its parent; the single root holds the problem statement. Layout
//! uses one column per depth and a fixed row pitch so that no two nodes in
//! the same column share a y-coordinate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::core::text::strip_code_fences;

/// Origin anchor of the root node
pub const ROOT_X: f64 = 50.0;
pub const ROOT_Y: f64 = 50.0;

/// Horizontal distance between depth columns
pub const COLUMN_WIDTH: f64 = 300.0;

/// Vertical distance between nodes in one column
pub const ROW_PITCH: f64 = 120.0;

/// Default width of the root card
pub const ROOT_WIDTH: f64 = 260.0;

/// Node role in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Root,
    Child,
}

/// A positioned mind-map node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CauseNode {
    pub id: String,

    pub text: String,

    pub x: f64,

    pub y: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    /// `None` only for the root
    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(rename = "type")]
    pub node_type: NodeType,
}

/// Errors from building or editing a cause tree
#[derive(Debug, Error, PartialEq)]
pub enum CauseTreeError {
    #[error("AI did not return a valid tree")]
    InvalidTree,

    #[error("Mind map has no root node")]
    NoRoot,

    #[error("Mind map has {0} root nodes, expected exactly one")]
    MultipleRoots(usize),

    #[error("Duplicate node id: {0}")]
    DuplicateId(String),

    #[error("Node {id} points at missing parent {parent}")]
    MissingParent { id: String, parent: String },

    #[error("Node {0} is part of a parent cycle")]
    Cycle(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("The root node cannot be removed")]
    CannotRemoveRoot,
}

/// Pull the `whyTree` array out of a chat reply
///
/// Accepts a bare array or an object with a `whyTree` field, with or without
/// Markdown code fences. Anything unparseable becomes an empty array so the
/// caller lands on the invalid-tree path instead of failing.
pub fn extract_why_tree(reply: &str) -> Value {
    let cleaned = strip_code_fences(reply);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Array(items)) => Value::Array(items),
        Ok(Value::Object(mut map)) => match map.remove("whyTree") {
            Some(Value::Array(items)) => Value::Array(items),
            _ => Value::Array(Vec::new()),
        },
        Ok(_) => Value::Array(Vec::new()),
        Err(e) => {
            tracing::warn!("Malformed whyTree reply: {}", e);
            Value::Array(Vec::new())
        }
    }
}

struct TreeBuilder {
    next_id: usize,
    /// Next free y per depth column
    column_next_y: Vec<f64>,
    nodes: Vec<CauseNode>,
}

impl TreeBuilder {
    fn visit(&mut self, items: &Value, parent_id: &str, parent_y: f64, depth: usize) {
        let Some(items) = items.as_array() else {
            return;
        };

        if self.column_next_y.len() <= depth {
            self.column_next_y.resize(depth + 1, ROOT_Y);
        }

        for item in items {
            let cause = match item.get("cause").and_then(Value::as_str) {
                Some(c) if !c.trim().is_empty() => c.trim().to_string(),
                _ => continue,
            };

            let id = format!("cause-{}", self.next_id);
            self.next_id += 1;

            let y = self.column_next_y[depth].max(parent_y);
            self.column_next_y[depth] = y + ROW_PITCH;

            self.nodes.push(CauseNode {
                id: id.clone(),
                text: cause,
                x: ROOT_X + COLUMN_WIDTH * depth as f64,
                y,
                width: None,
                height: None,
                parent_id: Some(parent_id.to_string()),
                node_type: NodeType::Child,
            });

            if let Some(children) = item.get("children") {
                self.visit(children, &id, y, depth + 1);
            }
        }
    }
}

/// The root card of a mind map, holding the problem statement
pub fn root_node(text: &str) -> CauseNode {
    CauseNode {
        id: "root".to_string(),
        text: text.to_string(),
        x: ROOT_X,
        y: ROOT_Y,
        width: Some(ROOT_WIDTH),
        height: None,
        parent_id: None,
        node_type: NodeType::Root,
    }
}

/// Build a positioned node list from a nested `[{cause, children}]` tree
///
/// Entries whose `cause` is missing, empty or not a string are dropped along
/// with their subtree. A tree that yields no cause nodes is
/// [`CauseTreeError::InvalidTree`].
pub fn build_cause_tree(root_text: &str, why_tree: &Value) -> Result<Vec<CauseNode>, CauseTreeError> {
    match why_tree.as_array() {
        Some(items) if !items.is_empty() => {}
        _ => return Err(CauseTreeError::InvalidTree),
    }

    let mut builder = TreeBuilder {
        next_id: 1,
        column_next_y: Vec::new(),
        nodes: vec![root_node(root_text)],
    };
    builder.visit(why_tree, "root", ROOT_Y, 1);

    if builder.nodes.len() == 1 {
        return Err(CauseTreeError::InvalidTree);
    }
    Ok(builder.nodes)
}

/// Check the mind-map invariants: one root, known parents, unique ids, no cycles
pub fn validate_mind_map(nodes: &[CauseNode]) -> Result<(), CauseTreeError> {
    let mut ids = HashSet::new();
    for node in nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(CauseTreeError::DuplicateId(node.id.clone()));
        }
    }

    let roots = nodes.iter().filter(|n| n.parent_id.is_none()).count();
    match roots {
        0 => return Err(CauseTreeError::NoRoot),
        1 => {}
        n => return Err(CauseTreeError::MultipleRoots(n)),
    }

    let parents: HashMap<&str, Option<&str>> = nodes
        .iter()
        .map(|n| (n.id.as_str(), n.parent_id.as_deref()))
        .collect();

    for node in nodes {
        if let Some(parent) = node.parent_id.as_deref() {
            if !parents.contains_key(parent) {
                return Err(CauseTreeError::MissingParent {
                    id: node.id.clone(),
                    parent: parent.to_string(),
                });
            }
        }

        // Walking up must reach the root within nodes.len() steps
        let mut current = node.id.as_str();
        let mut steps = 0;
        while let Some(&Some(parent)) = parents.get(current) {
            current = parent;
            steps += 1;
            if steps > nodes.len() {
                return Err(CauseTreeError::Cycle(node.id.clone()));
            }
        }
    }

    Ok(())
}

/// Append a child under `parent_id`, placed at the bottom of its column
pub fn add_child(
    nodes: &mut Vec<CauseNode>,
    parent_id: &str,
    text: &str,
) -> Result<String, CauseTreeError> {
    let parent = nodes
        .iter()
        .find(|n| n.id == parent_id)
        .ok_or_else(|| CauseTreeError::NodeNotFound(parent_id.to_string()))?;

    let x = parent.x + COLUMN_WIDTH;
    let parent_y = parent.y;
    let y = nodes
        .iter()
        .filter(|n| (n.x - x).abs() < f64::EPSILON)
        .map(|n| n.y + ROW_PITCH)
        .fold(parent_y, f64::max);

    let next = nodes
        .iter()
        .filter_map(|n| n.id.strip_prefix("cause-"))
        .filter_map(|s| s.parse::<usize>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    let id = format!("cause-{}", next);

    nodes.push(CauseNode {
        id: id.clone(),
        text: text.to_string(),
        x,
        y,
        width: None,
        height: None,
        parent_id: Some(parent_id.to_string()),
        node_type: NodeType::Child,
    });
    Ok(id)
}

/// Remove a node and everything below it, returning how many nodes went
pub fn remove_subtree(nodes: &mut Vec<CauseNode>, id: &str) -> Result<usize, CauseTreeError> {
    let target = nodes
        .iter()
        .find(|n| n.id == id)
        .ok_or_else(|| CauseTreeError::NodeNotFound(id.to_string()))?;
    if target.parent_id.is_none() {
        return Err(CauseTreeError::CannotRemoveRoot);
    }

    let mut doomed: HashSet<String> = HashSet::from([id.to_string()]);
    loop {
        let before = doomed.len();
        for node in nodes.iter() {
            if let Some(parent) = &node.parent_id {
                if doomed.contains(parent) {
                    doomed.insert(node.id.clone());
                }
            }
        }
        if doomed.len() == before {
            break;
        }
    }

    let count = nodes.len();
    nodes.retain(|n| !doomed.contains(&n.id));
    Ok(count - nodes.len())
}

/// Children of a node in insertion order
pub fn children_of<'a>(nodes: &'a [CauseNode], id: &str) -> Vec<&'a CauseNode> {
    nodes
        .iter()
        .filter(|n| n.parent_id.as_deref() == Some(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn depth_of(nodes: &[CauseNode], node: &CauseNode) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(parent) = &current.parent_id {
            current = nodes.iter().find(|n| &n.id == parent).unwrap();
            depth += 1;
        }
        depth
    }

    #[test]
    fn test_empty_tree_is_invalid() {
        let err = build_cause_tree("Problem", &json!([])).unwrap_err();
        assert_eq!(err, CauseTreeError::InvalidTree);
        assert_eq!(err.to_string(), "AI did not return a valid tree");
    }

    #[test]
    fn test_non_array_is_invalid() {
        assert_eq!(
            build_cause_tree("Problem", &json!({"cause": "x"})),
            Err(CauseTreeError::InvalidTree)
        );
    }

    #[test]
    fn test_root_and_one_child_with_grandchild() {
        let tree = json!([
            {"cause": "Machine stops", "children": [{"cause": "Sensor fault"}]}
        ]);
        let nodes = build_cause_tree("Line down", &tree).unwrap();
        assert_eq!(nodes.len(), 3);

        let root = &nodes[0];
        assert_eq!(root.node_type, NodeType::Root);
        assert_eq!(root.parent_id, None);
        assert_eq!(root.text, "Line down");
        assert_eq!((root.x, root.y), (ROOT_X, ROOT_Y));

        let ids: HashSet<_> = nodes.iter().map(|n| n.id.clone()).collect();
        for node in &nodes[1..] {
            assert_eq!(node.node_type, NodeType::Child);
            assert!(ids.contains(node.parent_id.as_ref().unwrap()));
        }
        assert_eq!(nodes[2].parent_id.as_deref(), Some(nodes[1].id.as_str()));
        assert!(nodes[2].x > nodes[1].x);
        validate_mind_map(&nodes).unwrap();
    }

    #[test]
    fn test_siblings_never_share_y_within_a_depth() {
        let tree = json!([
            {"cause": "A", "children": [{"cause": "A1"}, {"cause": "A2"}]},
            {"cause": "B", "children": [{"cause": "B1"}, {"cause": "B2", "children": [{"cause": "B2a"}]}]},
            {"cause": "C"}
        ]);
        let nodes = build_cause_tree("Root", &tree).unwrap();
        assert_eq!(nodes.len(), 1 + 3 + 4 + 1);

        let mut seen: HashSet<(usize, i64)> = HashSet::new();
        for node in &nodes {
            let depth = depth_of(&nodes, node);
            assert_eq!(node.x, ROOT_X + COLUMN_WIDTH * depth as f64);
            assert!(seen.insert((depth, node.y as i64)), "duplicate y at depth {}", depth);
        }
    }

    #[test]
    fn test_invalid_causes_dropped_with_children() {
        let tree = json!([
            {"cause": "", "children": [{"cause": "orphan"}]},
            {"cause": 42},
            {"children": [{"cause": "also orphan"}]},
            {"cause": "kept"}
        ]);
        let nodes = build_cause_tree("Root", &tree).unwrap();
        let texts: Vec<_> = nodes.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["Root", "kept"]);
    }

    #[test]
    fn test_all_causes_invalid_is_invalid_tree() {
        let tree = json!([{"cause": ""}, {"cause": null}]);
        assert_eq!(build_cause_tree("Root", &tree), Err(CauseTreeError::InvalidTree));
    }

    #[test]
    fn test_extract_why_tree_variants() {
        let fenced = "```json\n{\"whyTree\": [{\"cause\": \"a\"}]}\n```";
        assert_eq!(extract_why_tree(fenced), json!([{"cause": "a"}]));
        assert_eq!(extract_why_tree("[{\"cause\": \"b\"}]"), json!([{"cause": "b"}]));
        assert_eq!(extract_why_tree("not json at all"), json!([]));
        assert_eq!(extract_why_tree("{\"other\": 1}"), json!([]));
    }

    #[test]
    fn test_validate_rejects_broken_maps() {
        let mut nodes = build_cause_tree("Root", &json!([{"cause": "a"}])).unwrap();

        let mut two_roots = nodes.clone();
        two_roots[1].parent_id = None;
        assert_eq!(validate_mind_map(&two_roots), Err(CauseTreeError::MultipleRoots(2)));

        let mut missing = nodes.clone();
        missing[1].parent_id = Some("ghost".to_string());
        assert!(matches!(
            validate_mind_map(&missing),
            Err(CauseTreeError::MissingParent { .. })
        ));

        add_child(&mut nodes, "cause-1", "b").unwrap();
        let mut cycle = nodes.clone();
        cycle[1].parent_id = Some("cause-2".to_string());
        assert!(matches!(validate_mind_map(&cycle), Err(CauseTreeError::Cycle(_))));

        let mut dup = nodes.clone();
        dup[2].id = "cause-1".to_string();
        assert!(matches!(validate_mind_map(&dup), Err(CauseTreeError::DuplicateId(_))));
    }

    #[test]
    fn test_add_child_places_below_column() {
        let mut nodes =
            build_cause_tree("Root", &json!([{"cause": "a"}, {"cause": "b"}])).unwrap();
        let id = add_child(&mut nodes, "root", "c").unwrap();
        assert_eq!(id, "cause-3");
        let added = nodes.iter().find(|n| n.id == id).unwrap();
        assert_eq!(added.x, ROOT_X + COLUMN_WIDTH);
        assert_eq!(added.y, ROOT_Y + 2.0 * ROW_PITCH);
        validate_mind_map(&nodes).unwrap();

        assert_eq!(
            add_child(&mut nodes, "nope", "d"),
            Err(CauseTreeError::NodeNotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_remove_subtree() {
        let tree = json!([
            {"cause": "a", "children": [{"cause": "a1", "children": [{"cause": "a1x"}]}]},
            {"cause": "b"}
        ]);
        let mut nodes = build_cause_tree("Root", &tree).unwrap();
        let removed = remove_subtree(&mut nodes, "cause-1").unwrap();
        assert_eq!(removed, 3);
        assert_eq!(nodes.len(), 2);
        validate_mind_map(&nodes).unwrap();

        assert_eq!(remove_subtree(&mut nodes, "root"), Err(CauseTreeError::CannotRemoveRoot));
    }

    #[test]
    fn test_node_serializes_camel_case_with_type() {
        let nodes = build_cause_tree("Root", &json!([{"cause": "a"}])).unwrap();
        let json = serde_json::to_value(&nodes[1]).unwrap();
        assert_eq!(json["parentId"], "root");
        assert_eq!(json["type"], "child");
        assert!(json.get("width").is_none());
    }
}

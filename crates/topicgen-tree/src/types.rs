//! Topic data types.

use serde::{Deserialize, Serialize};

/// Index of a node inside a [`crate::TopicTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Raw arena index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A topic in the hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicNode {
    /// Depth; 0 for the root sentinel, 1 for top-level topics
    pub level: u32,
    /// Short label as first observed
    pub name: String,
    /// Free-text description as first observed
    pub description: String,
    /// Number of times the topic was observed (0 for unconfirmed seeds)
    pub count: u32,
    /// Children in insertion order
    pub children: Vec<NodeId>,
    /// Parent node; `None` only for the root
    pub parent: Option<NodeId>,
}

impl TopicNode {
    pub(crate) fn new(
        level: u32,
        name: String,
        description: String,
        count: u32,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            level,
            name,
            description,
            count,
            children: Vec::new(),
            parent,
        }
    }

    /// Whether this node is the root sentinel.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether `name` refers to this topic under the normalized-name rule.
    pub fn matches_name(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }
}

/// A topic extracted from one model response, before it is merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTopic {
    pub level: u32,
    pub name: String,
    pub description: String,
}

impl CandidateTopic {
    pub fn new(level: u32, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            name: name.into(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for CandidateTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.name, self.description)
    }
}

/// Normalize a topic name for duplicate comparison.
///
/// Trims, collapses internal whitespace runs to one space and lower-cases.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

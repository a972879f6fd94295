//! The topic hierarchy.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::TreeError;
use crate::types::{normalize_name, NodeId, TopicNode};

const ROOT: NodeId = NodeId(0);

/// Result of recording an observed level-1 topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// No duplicate existed; a node was appended under the root
    Added(NodeId),
    /// The first duplicate had its count incremented
    Merged { id: NodeId, count: u32 },
}

impl Observation {
    pub fn is_new(&self) -> bool {
        matches!(self, Observation::Added(_))
    }
}

/// Append-only topic hierarchy.
///
/// Nodes are stored in an arena; `children` and `parent` are indices into
/// it. The root sentinel (level 0) owns all level-1 topics.
#[derive(Debug, Clone)]
pub struct TopicTree {
    nodes: Vec<TopicNode>,
}

impl Default for TopicTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicTree {
    /// Create an empty tree holding only the root sentinel.
    pub fn new() -> Self {
        Self {
            nodes: vec![TopicNode::new(
                0,
                "Topics".to_string(),
                String::new(),
                0,
                None,
            )],
        }
    }

    /// The root sentinel.
    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Option<&TopicNode> {
        self.nodes.get(id.0)
    }

    /// Children of a node, in insertion order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Number of topics, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth-first, insertion-order walk over every topic (root excluded).
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TopicNode)> + '_ {
        let mut stack: Vec<NodeId> = self.children(ROOT).iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let node = &self.nodes[id.0];
            stack.extend(node.children.iter().rev().copied());
            Some((id, node))
        })
    }

    /// Append a seed topic with a count of 0.
    ///
    /// Level-1 seeds attach to the root. Deeper seeds attach to the most
    /// recently inserted node one level up.
    pub fn insert_seed(
        &mut self,
        level: u32,
        name: &str,
        description: &str,
    ) -> Result<NodeId, TreeError> {
        let parent = if level == 1 {
            ROOT
        } else {
            self.nodes
                .iter()
                .enumerate()
                .rev()
                .find(|(_, n)| level > 0 && n.level == level - 1)
                .map(|(i, _)| NodeId(i))
                .ok_or(TreeError::InvalidLevel {
                    level,
                    parent_level: level.saturating_sub(1),
                })?
        };
        self.add_node(level, name, 0, description, parent)
    }

    /// Find existing topics at `level` whose normalized name equals `name`'s.
    ///
    /// Results are in tree order; callers merge into the first.
    pub fn find_duplicates(&self, name: &str, level: u32) -> Vec<NodeId> {
        let needle = normalize_name(name);
        self.iter()
            .filter(|(_, n)| n.level == level && normalize_name(&n.name) == needle)
            .map(|(id, _)| id)
            .collect()
    }

    /// First topic at `level` matching `name`.
    pub fn get_by_name(&self, name: &str, level: u32) -> Option<&TopicNode> {
        self.find_duplicates(name, level)
            .first()
            .and_then(|id| self.node(*id))
    }

    /// Append a child under `parent`.
    ///
    /// `level` must be exactly one below the parent's level.
    pub fn add_node(
        &mut self,
        level: u32,
        name: &str,
        count: u32,
        description: &str,
        parent: NodeId,
    ) -> Result<NodeId, TreeError> {
        let parent_level = self
            .nodes
            .get(parent.0)
            .map(|n| n.level)
            .ok_or(TreeError::UnknownNode(parent.0))?;
        if level != parent_level + 1 {
            return Err(TreeError::InvalidLevel {
                level,
                parent_level,
            });
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(TopicNode::new(
            level,
            name.trim().to_string(),
            description.trim().to_string(),
            count,
            Some(parent),
        ));
        self.nodes[parent.0].children.push(id);
        debug!(%id, level, name, "Added topic node");
        Ok(id)
    }

    /// Increment a topic's count, returning the new value.
    pub fn increment_count(&mut self, id: NodeId) -> Result<u32, TreeError> {
        if id == ROOT {
            return Err(TreeError::UnknownNode(id.0));
        }
        let node = self
            .nodes
            .get_mut(id.0)
            .ok_or(TreeError::UnknownNode(id.0))?;
        node.count = node.count.saturating_add(1);
        Ok(node.count)
    }

    /// Record one observation of a level-1 topic.
    ///
    /// Increments the first duplicate, or appends a new node with count 1.
    pub fn observe(&mut self, name: &str, description: &str) -> Result<Observation, TreeError> {
        match self.find_duplicates(name, 1).first() {
            Some(&id) => {
                let count = self.increment_count(id)?;
                Ok(Observation::Merged { id, count })
            }
            None => {
                let id = self.add_node(1, name, 1, description, ROOT)?;
                Ok(Observation::Added(id))
            }
        }
    }

    /// Flatten to `[level] name (Count: N): description` lines.
    ///
    /// Depth-first in insertion order; output depends only on structure and
    /// current counts.
    pub fn to_topic_list(&self, include_description: bool, include_count: bool) -> Vec<String> {
        self.iter()
            .map(|(_, node)| {
                let mut line = format!("[{}] {}", node.level, node.name);
                if include_count {
                    line.push_str(&format!(" (Count: {})", node.count));
                }
                if include_description {
                    line.push_str(&format!(": {}", node.description));
                }
                line
            })
            .collect()
    }

    /// Write every topic, with description and count, one per line.
    #[instrument(skip(self), fields(topics = self.len()))]
    pub fn to_file(&self, path: &Path) -> Result<(), TreeError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = fs::File::create(path)?;
        for line in self.to_topic_list(true, true) {
            writeln!(file, "{}", line)?;
        }
        file.flush()?;
        info!(path = ?path, "Wrote topic file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> TopicTree {
        let mut tree = TopicTree::new();
        tree.insert_seed(1, "Trade", "Mentions the exchange of capital, goods, and services")
            .unwrap();
        tree.insert_seed(1, "Health", "Physical wellbeing").unwrap();
        tree
    }

    #[test]
    fn test_new_tree_is_empty() {
        let tree = TopicTree::new();
        assert!(tree.is_empty());
        assert!(tree.node(tree.root()).unwrap().is_root());
        assert!(tree.to_topic_list(true, true).is_empty());
    }

    #[test]
    fn test_seed_count_zero_and_order() {
        let tree = seeded();
        assert_eq!(tree.len(), 2);
        let names: Vec<_> = tree.iter().map(|(_, n)| n.name.clone()).collect();
        assert_eq!(names, vec!["Trade", "Health"]);
        assert!(tree.iter().all(|(_, n)| n.count == 0));
    }

    #[test]
    fn test_dedup_increments_single_node() {
        let mut tree = TopicTree::new();
        let first = tree.observe("Health", "physical wellbeing").unwrap();
        let second = tree.observe(" HEALTH ", "something else").unwrap();

        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(tree.len(), 1);
        let node = tree.get_by_name("health", 1).unwrap();
        assert_eq!(node.count, 2);
        assert_eq!(node.description, "physical wellbeing");
    }

    #[test]
    fn test_find_duplicates_respects_level() {
        let mut tree = seeded();
        let trade = tree.find_duplicates("trade", 1)[0];
        tree.add_node(2, "Health", 1, "trade in medicine", trade).unwrap();

        assert_eq!(tree.find_duplicates("health", 1).len(), 1);
        assert_eq!(tree.find_duplicates("health", 2).len(), 1);
        assert!(tree.find_duplicates("health", 3).is_empty());
    }

    #[test]
    fn test_add_node_invalid_level() {
        let mut tree = TopicTree::new();
        let root = tree.root();
        let err = tree.add_node(2, "Orphan", 1, "no parent", root).unwrap_err();
        assert!(matches!(
            err,
            TreeError::InvalidLevel {
                level: 2,
                parent_level: 0
            }
        ));
    }

    #[test]
    fn test_add_node_unknown_parent() {
        let mut tree = TopicTree::new();
        let err = tree.add_node(1, "X", 1, "y", NodeId(42)).unwrap_err();
        assert!(matches!(err, TreeError::UnknownNode(42)));
    }

    #[test]
    fn test_increment_root_rejected() {
        let mut tree = TopicTree::new();
        let root = tree.root();
        assert!(tree.increment_count(root).is_err());
    }

    #[test]
    fn test_insert_seed_hierarchy() {
        let mut tree = TopicTree::new();
        tree.insert_seed(1, "Economy", "money").unwrap();
        tree.insert_seed(2, "Inflation", "prices").unwrap();
        tree.insert_seed(1, "Sports", "games").unwrap();
        tree.insert_seed(2, "Football", "soccer").unwrap();

        let list = tree.to_topic_list(false, false);
        assert_eq!(
            list,
            vec!["[1] Economy", "[2] Inflation", "[1] Sports", "[2] Football"]
        );
        let sports = tree.find_duplicates("sports", 1)[0];
        assert_eq!(tree.children(sports).len(), 1);
    }

    #[test]
    fn test_insert_seed_orphan_deep_level() {
        let mut tree = TopicTree::new();
        assert!(tree.insert_seed(3, "Deep", "no parent").is_err());
    }

    #[test]
    fn test_topic_list_formats() {
        let mut tree = seeded();
        tree.observe("Health", "ignored").unwrap();

        assert_eq!(
            tree.to_topic_list(true, true)[1],
            "[1] Health (Count: 1): Physical wellbeing"
        );
        assert_eq!(tree.to_topic_list(true, false)[1], "[1] Health: Physical wellbeing");
        assert_eq!(tree.to_topic_list(false, true)[1], "[1] Health (Count: 1)");
        assert_eq!(tree.to_topic_list(false, false)[1], "[1] Health");
    }

    #[test]
    fn test_topic_list_idempotent() {
        let mut tree = seeded();
        tree.observe("Sports", "games").unwrap();
        tree.observe("Trade", "again").unwrap();

        let first = tree.to_topic_list(true, true);
        let second = tree.to_topic_list(true, true);
        assert_eq!(first, second);
    }

    #[test]
    fn test_count_changes_do_not_reorder() {
        let mut tree = seeded();
        let before = tree.to_topic_list(false, false);
        for _ in 0..5 {
            tree.observe("Health", "x").unwrap();
        }
        assert_eq!(before, tree.to_topic_list(false, false));
    }

    #[test]
    fn test_to_file_writes_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("topics.md");
        let tree = seeded();
        tree.to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "[1] Health (Count: 0): Physical wellbeing");
    }
}

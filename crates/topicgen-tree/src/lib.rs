//! # topicgen-tree
//!
//! Append-only topic hierarchy built during topic generation.
//!
//! Topics live in an arena owned by [`TopicTree`] and are addressed by
//! [`NodeId`]. Nodes are never removed or renamed; the observation count is
//! the only field that changes after insertion.
//!
//! ## Features
//! - Duplicate detection on whitespace/case-normalized names
//! - Flattening to `[level] name (Count: N): description` lines
//! - Loading seed topics from the same line format

pub mod error;
pub mod seed;
pub mod tree;
pub mod types;

pub use error::TreeError;
pub use seed::parse_seed_line;
pub use tree::{Observation, TopicTree};
pub use types::{normalize_name, CandidateTopic, NodeId, TopicNode};

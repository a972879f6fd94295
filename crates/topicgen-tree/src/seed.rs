//! Seed file loading.
//!
//! A seed file holds one topic per line: `[level] name: description`.
//! Bullets (`-`, `*`) and a `(Count: N)` segment are tolerated so that a
//! topic file written by [`TopicTree::to_file`] loads back as a seed.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, instrument, warn};

use crate::error::TreeError;
use crate::tree::TopicTree;
use crate::types::CandidateTopic;

fn seed_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:[-*•]\s*)?\[(\d+)\]\s*([^:\[\]]+?)\s*(?:\(count:\s*\d+\))?\s*:\s*(.*)$",
        )
        .expect("seed line pattern is valid")
    })
}

/// Parse one seed line. Returns `None` when the line does not match.
pub fn parse_seed_line(line: &str) -> Option<CandidateTopic> {
    let caps = seed_line_re().captures(line.trim())?;
    let level: u32 = caps[1].parse().ok()?;
    let name = caps[2].trim();
    if name.is_empty() {
        return None;
    }
    Some(CandidateTopic::new(level, name, caps[3].trim()))
}

impl TopicTree {
    /// Build a tree from seed text.
    ///
    /// Lines that do not parse, or that cannot be placed in the hierarchy,
    /// are logged and skipped. Fails when no topic could be loaded.
    pub fn from_seed_str(text: &str) -> Result<Self, TreeError> {
        let mut tree = TopicTree::new();
        let mut skipped = 0usize;

        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some(seed) = parse_seed_line(line) else {
                warn!(line = lineno + 1, content = line, "Unparseable seed line, skipping");
                skipped += 1;
                continue;
            };
            if let Err(e) = tree.insert_seed(seed.level, &seed.name, &seed.description) {
                warn!(line = lineno + 1, error = %e, "Seed topic has no parent, skipping");
                skipped += 1;
            }
        }

        if tree.is_empty() {
            return Err(TreeError::SeedParse(format!(
                "no topics parsed ({} lines skipped)",
                skipped
            )));
        }
        info!(topics = tree.len(), skipped, "Loaded seed topics");
        Ok(tree)
    }

    /// Build a tree from a seed file.
    #[instrument]
    pub fn from_seed_file(path: &Path) -> Result<Self, TreeError> {
        let text = fs::read_to_string(path)?;
        Self::from_seed_str(&text)
    }
}

//! Topic extraction from free-form model output.
//!
//! The model is asked to answer with lines like `[1] Trade: Mentions ...`.
//! Real answers add bullets, drop spaces, wrap the list in prose, or hold
//! nothing usable at all. Zero matches is a valid result.

use std::sync::OnceLock;

use regex::Regex;
use topicgen_tree::CandidateTopic;

fn topic_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?mx)
            ^\s*                   # leading spaces
            (?:[-*•]\s*)?          # optional list bullet
            \[(\d+)\]\s*           # [level]
            ([^:\n\[\]]+?)\s*      # name: no colon, bracket or newline
            :[\t\x20]*             # separator
            ([^\n]+?)\s*           # description: rest of the line
            $",
        )
        .expect("topic line pattern is valid")
    })
}

/// Extract `(level, name, description)` candidates in response order.
pub fn parse_topics(response: &str) -> Vec<CandidateTopic> {
    topic_line_re()
        .captures_iter(response)
        .filter_map(|caps| {
            let level: u32 = caps[1].parse().ok()?;
            let name = caps[2].trim();
            let description = caps[3].trim();
            if name.is_empty() || description.is_empty() {
                return None;
            }
            Some(CandidateTopic::new(level, name, description))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullets_and_missing_spaces() {
        let parsed =
            parse_topics("- [1] Sports: games and competitions\n[1]Politics:governance and policy");
        assert_eq!(
            parsed,
            vec![
                CandidateTopic::new(1, "Sports", "games and competitions"),
                CandidateTopic::new(1, "Politics", "governance and policy"),
            ]
        );
    }

    #[test]
    fn test_preserves_case_and_inner_colons() {
        let parsed = parse_topics("[1] Public Health: Covers COVID-19: vaccines and masks");
        assert_eq!(parsed[0].name, "Public Health");
        assert_eq!(parsed[0].description, "Covers COVID-19: vaccines and masks");
    }

    #[test]
    fn test_surrounding_prose_and_crlf() {
        let response = "Here are the topics:\r\n\r\n  * [1] Trade: Exchange of goods\r\n\
                        [2] Tariffs: Taxes on imports\r\nLet me know if you need more.";
        let parsed = parse_topics(response);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], CandidateTopic::new(1, "Trade", "Exchange of goods"));
        assert_eq!(parsed[1].level, 2);
        assert_eq!(parsed[1].description, "Taxes on imports");
    }

    #[test]
    fn test_no_matches_is_empty() {
        assert!(parse_topics("").is_empty());
        assert!(parse_topics("None of the topics apply.").is_empty());
        assert!(parse_topics("Trade: no level marker").is_empty());
    }

    #[test]
    fn test_rejects_empty_description_and_bad_level() {
        assert!(parse_topics("[1] Trade:").is_empty());
        assert!(parse_topics("[1] Trade:   ").is_empty());
        assert!(parse_topics("[99999999999] Trade: overflowing level").is_empty());
    }

    #[test]
    fn test_description_does_not_span_lines() {
        let parsed = parse_topics("[1] Trade:\nGoods moving across borders");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_name_cannot_contain_brackets() {
        let parsed = parse_topics("[1] [Trade]: goods");
        assert!(parsed.is_empty());
    }
}

//! Parsing of task-specific model output.
//!
//! Sentiment replies become a [`Sentiment`] label and entity replies become
//! ordered [`EntityGroup`] lists. Models are told the expected shape but do
//! not always follow it, so parsing is lenient about decoration and strict
//! about content.

use std::fmt;

use serde::Serialize;

use crate::error::{AssistantError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    /// Parse a one-word label, ignoring case, surrounding whitespace and
    /// punctuation, and a leading `Sentiment:` echo.
    pub fn parse_label(raw: &str) -> Result<Self> {
        let mut label = raw.trim();
        if let Some((head, tail)) = label.split_once(':') {
            if head.trim().eq_ignore_ascii_case("sentiment") {
                label = tail;
            }
        }
        let label = label
            .trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .to_ascii_lowercase();
        match label.as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            _ => Err(AssistantError::InvalidOutput(format!(
                "expected positive, negative, or neutral; got '{}'",
                raw.trim()
            ))),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entities of one type, in the order the model listed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityGroup {
    pub label: String,
    pub entities: Vec<String>,
}

/// Parse `Label: "a", "b"` lines into groups, preserving order.
///
/// Lines without a colon or without any entity are skipped. Markdown list
/// and emphasis markers around labels are dropped. When a line has no
/// quoted entities, its value is split on commas instead.
pub fn parse_entity_groups(raw: &str) -> Vec<EntityGroup> {
    let mut groups: Vec<EntityGroup> = Vec::new();

    for line in raw.lines() {
        let Some((label, values)) = line.split_once(':') else {
            continue;
        };
        let label = label
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
            .to_string();
        if label.is_empty() {
            continue;
        }

        let mut entities = quoted_values(values);
        if entities.is_empty() {
            entities = values
                .split(',')
                .map(|v| v.trim_matches(|c: char| c == '*' || c == '.' || c.is_whitespace()))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
        }
        if entities.is_empty() {
            continue;
        }

        match groups.iter_mut().find(|g| g.label == label) {
            Some(existing) => existing.entities.extend(entities),
            None => groups.push(EntityGroup { label, entities }),
        }
    }

    groups
}

fn quoted_values(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find('"') {
        let after = &rest[open + 1..];
        match after.find('"') {
            Some(close) => {
                let value = after[..close].trim();
                if !value.is_empty() {
                    out.push(value.to_string());
                }
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_label_is_normalized() {
        assert_eq!(Sentiment::parse_label("positive").unwrap(), Sentiment::Positive);
        assert_eq!(Sentiment::parse_label("  Positive.\n").unwrap(), Sentiment::Positive);
        assert_eq!(Sentiment::parse_label("**Negative**").unwrap(), Sentiment::Negative);
        assert_eq!(Sentiment::parse_label("Sentiment: neutral").unwrap(), Sentiment::Neutral);
    }

    #[test]
    fn test_sentiment_rejects_anything_else() {
        let err = Sentiment::parse_label("mostly positive, I think").unwrap_err();
        assert!(matches!(err, AssistantError::InvalidOutput(_)));
        assert!(Sentiment::parse_label("").is_err());
    }

    #[test]
    fn test_results_serialize_for_json_output() {
        let groups = parse_entity_groups("Persons: \"Ada\"");
        let json = serde_json::to_value(&groups).unwrap();
        assert_eq!(json[0]["label"], "Persons");
        assert_eq!(json[0]["entities"][0], "Ada");
        assert_eq!(serde_json::to_value(Sentiment::Neutral).unwrap(), "neutral");
    }

    #[test]
    fn test_entity_groups_keep_order_and_quotes() {
        let raw = "Persons: \"Ada Lovelace\", \"Charles Babbage\"\n\
                   Dates: \"1843\"\n\
                   Locations: \"London\"";
        let groups = parse_entity_groups(raw);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].label, "Persons");
        assert_eq!(groups[0].entities, vec!["Ada Lovelace", "Charles Babbage"]);
        assert_eq!(groups[1].label, "Dates");
        assert_eq!(groups[2].entities, vec!["London"]);
    }

    #[test]
    fn test_entity_groups_tolerate_markdown_and_bare_values() {
        let raw = "Here are the entities:\n- **Organizations:** Acme Corp, Globex\n\n* Persons: \"Jane\"";
        let groups = parse_entity_groups(raw);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "Organizations");
        assert_eq!(groups[0].entities, vec!["Acme Corp", "Globex"]);
        assert_eq!(groups[1].label, "Persons");
    }

    #[test]
    fn test_repeated_labels_are_merged() {
        let groups = parse_entity_groups("Dates: \"Monday\"\nDates: \"Friday\"");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].entities, vec!["Monday", "Friday"]);
    }

    #[test]
    fn test_lines_without_entities_are_skipped() {
        assert!(parse_entity_groups("No entities found.").is_empty());
        assert!(parse_entity_groups("Persons:").is_empty());
    }
}

//! Strict parsers for oracle replies.
//!
//! Each query kind has exactly one accepted shape. A reply either yields a
//! fully validated value or a [`ProtocolError`]; nothing is guessed from
//! malformed text. The one deliberate default is the split query, where
//! anything other than two distinct names means "keep the leaf".

use crate::types::{
    AdditionReply, OracleReply, QueryKind, RouteReply, SplitDecision, SplitReply, TemplateReply,
};
use anomtree_core::store::validate_category_name;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use thiserror::Error;

/// Terminal sentinel that ends an addition path.
pub const END_SENTINEL: &str = "<END>";

static ROUTE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Route:\s*\((.*?)\)").expect("valid route regex"));

static FOUND_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Found:\s*(YES|NO|TRUE|FALSE)\b").expect("valid found regex")
});

static PAREN_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((.*?)\)").expect("valid path regex"));

static BRACKET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^<>\n]*)>").expect("valid name regex"));

static EXPLANATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)Explanation:\s*(.*?)\s*(?:\n\s*(?:Route|Found|Addition|Determination|List 1)\s*:|\z)",
    )
    .expect("valid explanation regex")
});

/// Ways an oracle reply can break its contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("reply has no '{0}' marker")]
    MissingMarker(&'static str),

    #[error("no parenthesized route in reply: {0}")]
    MissingRoute(String),

    #[error("no parenthesized path after 'Addition' in reply: {0}")]
    MissingPath(String),

    #[error("addition path names no category")]
    EmptyPath,

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("JSON reply is missing '{0}'")]
    MissingField(&'static str),

    #[error("unusable category name {0:?}")]
    InvalidCategory(String),

    #[error("expected a {expected} reply, got {got}")]
    UnexpectedReply { expected: QueryKind, got: QueryKind },
}

fn excerpt(text: &str) -> String {
    const MAX: usize = 200;
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

fn explanation(text: &str) -> Option<String> {
    EXPLANATION
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

fn split_segments(list: &str) -> Vec<String> {
    list.split("->")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a reply of the given kind.
pub fn parse_reply(kind: QueryKind, text: &str) -> Result<OracleReply, ProtocolError> {
    Ok(match kind {
        QueryKind::Template => OracleReply::Template(parse_template(text)?),
        QueryKind::Route => OracleReply::Route(parse_route(text)?),
        QueryKind::Addition => OracleReply::Addition(parse_addition(text)?),
        QueryKind::Split => OracleReply::Split(parse_split(text)?),
    })
}

/// `{"template": "..."}` somewhere in the reply, first `{` to last `}`.
pub fn parse_template(text: &str) -> Result<TemplateReply, ProtocolError> {
    #[derive(Deserialize)]
    struct RawTemplate {
        #[serde(default)]
        template: Option<String>,
    }

    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => return Err(ProtocolError::MalformedJson(excerpt(text))),
    };
    let raw: RawTemplate = serde_json::from_str(&text[start..=end])
        .map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;

    let template = raw
        .template
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ProtocolError::MissingField("template"))?;
    Ok(TemplateReply { template })
}

/// `Route: (a -> b)` is required; `Found: YES|NO` is optional.
pub fn parse_route(text: &str) -> Result<RouteReply, ProtocolError> {
    let caps = ROUTE_LINE
        .captures(text)
        .ok_or_else(|| ProtocolError::MissingRoute(excerpt(text)))?;
    let segments = split_segments(&caps[1]);

    let claimed_found = FOUND_LINE.captures(text).map(|c| {
        let token = c[1].to_ascii_lowercase();
        token == "yes" || token == "true"
    });

    Ok(RouteReply {
        explanation: explanation(text),
        segments,
        claimed_found,
    })
}

/// `Addition: (a -> b -> <END>)`; the sentinel is dropped.
pub fn parse_addition(text: &str) -> Result<AdditionReply, ProtocolError> {
    if !text.contains("Addition") {
        return Err(ProtocolError::MissingMarker("Addition"));
    }
    let tail = text.rsplit("Addition:").next().unwrap_or(text);
    let caps = PAREN_LIST
        .captures(tail)
        .ok_or_else(|| ProtocolError::MissingPath(excerpt(text)))?;

    let segments: Vec<String> = split_segments(&caps[1])
        .into_iter()
        .filter(|s| s != END_SENTINEL)
        .collect();
    if segments.is_empty() {
        return Err(ProtocolError::EmptyPath);
    }
    for segment in &segments {
        validate_category_name(segment)
            .map_err(|_| ProtocolError::InvalidCategory(segment.clone()))?;
    }

    Ok(AdditionReply {
        explanation: explanation(text),
        segments,
    })
}

/// Two `<Name>` tokens decide a split; anything else keeps the leaf.
pub fn parse_split(text: &str) -> Result<SplitReply, ProtocolError> {
    let names: Vec<String> = BRACKET_NAME
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .collect();

    let decision = match names.as_slice() {
        [first, second] if first != second => {
            for name in [first, second] {
                validate_category_name(name)
                    .map_err(|_| ProtocolError::InvalidCategory(name.clone()))?;
            }
            SplitDecision::Split {
                first: first.clone(),
                second: second.clone(),
            }
        }
        _ => SplitDecision::Keep,
    };

    Ok(SplitReply {
        explanation: explanation(text),
        decision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_from_noisy_reply() {
        let reply = "Sure!\n```json\n{\"template\": \"Temp1 jumps sharply.\"}\n```";
        assert_eq!(parse_template(reply).unwrap().template, "Temp1 jumps sharply.");
    }

    #[test]
    fn test_template_errors() {
        assert!(matches!(
            parse_template("no json here"),
            Err(ProtocolError::MalformedJson(_))
        ));
        assert!(matches!(
            parse_template("{\"other\": 1}"),
            Err(ProtocolError::MissingField("template"))
        ));
        assert!(matches!(
            parse_template("{\"template\": \"  \"}"),
            Err(ProtocolError::MissingField("template"))
        ));
        assert!(matches!(
            parse_template("{\"template\": }"),
            Err(ProtocolError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_route_with_found() {
        let reply = "Explanation: single slow sensor.\nRoute: (Temp-related -> SingleSensorDrift)\nFound: Yes";
        let route = parse_route(reply).unwrap();
        assert_eq!(route.segments, vec!["Temp-related", "SingleSensorDrift"]);
        assert_eq!(route.claimed_found, Some(true));
        assert_eq!(route.explanation.as_deref(), Some("single slow sensor."));
    }

    #[test]
    fn test_route_found_tokens() {
        let no = parse_route("Route: (Volt-related)\nFound: NO").unwrap();
        assert_eq!(no.claimed_found, Some(false));
        let truthy = parse_route("Route: (A)\nfound: true").unwrap();
        assert_eq!(truthy.claimed_found, Some(true));
    }

    #[test]
    fn test_route_without_found_is_unknown() {
        let route = parse_route("Route: (Volt-related)").unwrap();
        assert_eq!(route.claimed_found, None);
    }

    #[test]
    fn test_route_spanning_lines() {
        let route = parse_route("Route: (Temp-related ->\n SlowDrift)").unwrap();
        assert_eq!(route.segments, vec!["Temp-related", "SlowDrift"]);
    }

    #[test]
    fn test_route_missing_is_error() {
        assert!(matches!(
            parse_route("Explanation: no idea\nFound: NO"),
            Err(ProtocolError::MissingRoute(_))
        ));
    }

    #[test]
    fn test_empty_route_means_new_top_level() {
        let route = parse_route("Route: ()\nFound: NO").unwrap();
        assert!(route.segments.is_empty());
    }

    #[test]
    fn test_addition_drops_sentinel() {
        let reply = "Addition: (Temp-related -> PartialGroupDrift -> <END>)\nExplanation: Internal node.";
        let addition = parse_addition(reply).unwrap();
        assert_eq!(addition.segments, vec!["Temp-related", "PartialGroupDrift"]);
        assert_eq!(addition.explanation.as_deref(), Some("Internal node."));
    }

    #[test]
    fn test_addition_uses_last_marker() {
        let reply = "The Addition: (Wrong) was considered.\nAddition: (Volt-related -> <END>)";
        let addition = parse_addition(reply).unwrap();
        assert_eq!(addition.segments, vec!["Volt-related"]);
    }

    #[test]
    fn test_addition_errors() {
        assert_eq!(
            parse_addition("Route: (A)").unwrap_err(),
            ProtocolError::MissingMarker("Addition")
        );
        assert!(matches!(
            parse_addition("Addition: none"),
            Err(ProtocolError::MissingPath(_))
        ));
        assert_eq!(
            parse_addition("Addition: (<END>)").unwrap_err(),
            ProtocolError::EmptyPath
        );
        assert_eq!(
            parse_addition("Addition: (../etc -> <END>)").unwrap_err(),
            ProtocolError::InvalidCategory("../etc".into())
        );
    }

    #[test]
    fn test_split_distinct_names() {
        let reply = "Explanation: spike vs slow.\nDetermination:\nList 1: <SuddenDrift>\nList 2: <SlowDrift>";
        let split = parse_split(reply).unwrap();
        assert_eq!(
            split.decision,
            SplitDecision::Split {
                first: "SuddenDrift".into(),
                second: "SlowDrift".into()
            }
        );
    }

    #[test]
    fn test_split_defaults_to_keep() {
        let same = parse_split("List 1: <PartialGroupDrift>\nList 2: <PartialGroupDrift>").unwrap();
        assert_eq!(same.decision, SplitDecision::Keep);

        let one = parse_split("List 1: <OnlyOne>").unwrap();
        assert_eq!(one.decision, SplitDecision::Keep);

        let three = parse_split("<A> <B> <C>").unwrap();
        assert_eq!(three.decision, SplitDecision::Keep);
    }

    #[test]
    fn test_parse_reply_dispatch() {
        let reply = parse_reply(QueryKind::Route, "Route: (A)").unwrap();
        assert_eq!(reply.kind(), QueryKind::Route);
    }
}

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagLocation {
    Node,
    Line,
    Option,
}

/// A validated hashtag with its parameters rendered as C++ ints or strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub location: TagLocation,
    pub name: String,
    pub params: Vec<String>,
}

impl Tag {
    /// Parse `#name`, `#name:p1,p2` or `name` (leading `#` optional).
    ///
    /// The name is one or more letters followed by one letter or digit.
    /// Parameters render as integers, `(int)Enum::Case` when they contain a
    /// colon, or quoted strings otherwise.
    pub fn parse(location: TagLocation, text: &str) -> Result<Self, CoreError> {
        let malformed = || CoreError::MalformedTag {
            text: text.to_string(),
        };
        let body = text.strip_prefix('#').unwrap_or(text);
        let bytes = body.as_bytes();

        let mut pos = 0;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        // The final name character may be a digit.
        let name_end = if pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos + 1
        } else {
            pos
        };
        if pos == 0 || name_end < 2 {
            return Err(malformed());
        }
        let name = &body[..name_end];
        let rest = &body[name_end..];

        let params = if let Some(list) = rest.strip_prefix(':') {
            let list = list.trim_end();
            let valid = list
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b','));
            if !valid {
                return Err(malformed());
            }
            list.split(',')
                .filter(|p| !p.trim().is_empty())
                .map(render_param)
                .collect()
        } else if rest.trim().is_empty() {
            Vec::new()
        } else {
            return Err(malformed());
        };

        Ok(Self {
            location,
            name: name.to_string(),
            params,
        })
    }
}

fn render_param(p: &str) -> String {
    if p.contains(':') {
        format!("(int){p}")
    } else if p.parse::<i64>().is_ok() {
        p.to_string()
    } else {
        format!("\"{p}\"")
    }
}

/// `#line:<id>` hashtags carry the line ID and are not tags.
pub fn line_id(hashtags: &[String]) -> Option<&str> {
    hashtags
        .iter()
        .find_map(|t| t.strip_prefix('#').unwrap_or(t).strip_prefix("line:"))
}

pub fn is_line_id(hashtag: &str) -> bool {
    hashtag.strip_prefix('#').unwrap_or(hashtag).starts_with("line:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Tag, CoreError> {
        Tag::parse(TagLocation::Line, text)
    }

    #[test]
    fn plain_tag() {
        let tag = parse("#angry").unwrap();
        assert_eq!(tag.name, "angry");
        assert!(tag.params.is_empty());
    }

    #[test]
    fn trailing_digit_allowed() {
        assert_eq!(parse("scene2").unwrap().name, "scene2");
        assert!(parse("scene22").is_err());
    }

    #[test]
    fn params_rendered_by_kind() {
        let tag = parse("#pose:3,Mood::Happy,left").unwrap();
        assert_eq!(tag.name, "pose");
        assert_eq!(tag.params, vec!["3", "(int)Mood::Happy", "\"left\""]);
    }

    #[test]
    fn rejects_bad_text() {
        assert!(parse("#a").is_err());
        assert!(parse("#9lives").is_err());
        assert!(parse("#pose:a-b").is_err());
        assert!(parse("#pose extra").is_err());
    }

    #[test]
    fn line_ids_found() {
        let tags = vec!["#mood".to_string(), "#line:a1b2".to_string()];
        assert_eq!(line_id(&tags), Some("a1b2"));
        assert!(is_line_id("line:x"));
        assert!(!is_line_id("#mood"));
    }
}

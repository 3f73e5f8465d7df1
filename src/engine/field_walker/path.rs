//! Dot-notation field paths.

use std::fmt;

use crate::errors::{DbError, codes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    /// All-digit segment: either an array index or a digit-named field.
    Digits(String, usize),
    /// `$`
    Positional,
    /// `$[]`
    AllElements,
    /// `$[identifier]`
    Filtered(String),
}

impl Segment {
    fn classify(raw: &str, operators: bool) -> Segment {
        if operators {
            if raw == "$" {
                return Segment::Positional;
            }
            if raw == "$[]" {
                return Segment::AllElements;
            }
            if let Some(id) = raw.strip_prefix("$[").and_then(|r| r.strip_suffix(']')) {
                return Segment::Filtered(id.to_string());
            }
        }
        let digits = !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit());
        if digits && (raw.len() == 1 || !raw.starts_with('0')) {
            if let Ok(i) = raw.parse::<usize>() {
                return Segment::Digits(raw.to_string(), i);
            }
        }
        Segment::Field(raw.to_string())
    }

    /// The key this segment names when looked up in a document.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Segment::Field(s) | Segment::Digits(s, _) => s.clone(),
            Segment::Positional => "$".to_string(),
            Segment::AllElements => "$[]".to_string(),
            Segment::Filtered(id) => format!("$[{id}]"),
        }
    }

    #[must_use]
    pub fn is_array_operator(&self) -> bool {
        matches!(self, Segment::Positional | Segment::AllElements | Segment::Filtered(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

/// Split on `.` outside of `[...]`.
fn split(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let (mut depth, mut start) = (0usize, 0usize);
    for (i, c) in raw.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

impl FieldPath {
    /// Query-side path: `$`-tokens are plain field names here.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let segments = split(raw).into_iter().map(|s| Segment::classify(s, false)).collect();
        Self { raw: raw.to_string(), segments }
    }

    /// Update-side path: recognises `$`, `$[]` and `$[id]`, and rejects empty or `$`-prefixed parts.
    ///
    /// # Errors
    /// Code 56 for an empty path or segment, code 52 for other `$`-prefixed segments.
    pub fn parse_update(raw: &str) -> Result<Self, DbError> {
        if raw.is_empty() {
            return Err(DbError::failure(
                codes::EMPTY_FIELD_NAME,
                "An empty update path is not valid.",
            ));
        }
        let mut segments = Vec::new();
        for part in split(raw) {
            if part.is_empty() {
                return Err(DbError::failure(
                    codes::EMPTY_FIELD_NAME,
                    format!("The update path '{raw}' contains an empty field name, which is not allowed."),
                ));
            }
            let seg = Segment::classify(part, true);
            if let Segment::Field(name) = &seg {
                if name.starts_with('$') {
                    let msg = if segments.is_empty() {
                        format!("The dollar ($) prefixed field '{name}' in '{raw}' is not allowed in the context of an update's replacement document. Consider using an aggregation pipeline with $replaceWith.")
                    } else {
                        format!("The dollar ($) prefixed field '{name}' in '{raw}' is not valid for storage.")
                    };
                    return Err(DbError::failure(codes::DOLLAR_PREFIXED_FIELD_NAME, msg));
                }
            }
            if segments.is_empty() && seg.is_array_operator() {
                return Err(DbError::bad_value(format!(
                    "Cannot have array filter identifier (i.e. '$[<id>]') element in the first position in path '{raw}'"
                )));
            }
            segments.push(seg);
        }
        Ok(Self { raw: raw.to_string(), segments })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First segment's key; matched-index bookkeeping is keyed by it.
    #[must_use]
    pub fn top(&self) -> String {
        self.segments.first().map(Segment::key).unwrap_or_default()
    }

    /// Raw text of the first `n` segments.
    #[must_use]
    pub fn prefix_str(&self, n: usize) -> String {
        self.segments.iter().take(n).map(Segment::key).collect::<Vec<_>>().join(".")
    }

    /// Segment-wise prefix test; a path is a prefix of itself.
    #[must_use]
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a.key() == b.key())
    }

    #[must_use]
    pub fn identifiers(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Filtered(id) => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn has_array_operator(&self) -> bool {
        self.segments.iter().any(Segment::is_array_operator)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_are_atomic() {
        let p = FieldPath::parse_update("a.$[x.y].b").unwrap();
        assert_eq!(p.segments()[1], Segment::Filtered("x.y".into()));
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn digit_rules() {
        let p = FieldPath::parse("a.0.01.10");
        assert_eq!(p.segments()[1], Segment::Digits("0".into(), 0));
        assert_eq!(p.segments()[2], Segment::Field("01".into()));
        assert_eq!(p.segments()[3], Segment::Digits("10".into(), 10));
    }

    #[test]
    fn query_paths_keep_dollar_literal() {
        let p = FieldPath::parse("a.$");
        assert_eq!(p.segments()[1], Segment::Field("$".into()));
    }

    #[test]
    fn update_paths_validate() {
        assert_eq!(FieldPath::parse_update("").unwrap_err().code(), Some(56));
        assert_eq!(FieldPath::parse_update("a..b").unwrap_err().code(), Some(56));
        assert_eq!(FieldPath::parse_update("a.$bad").unwrap_err().code(), Some(52));
        let p = FieldPath::parse_update("a.$").unwrap();
        assert_eq!(p.segments()[1], Segment::Positional);
        assert_eq!(FieldPath::parse_update("$[]").unwrap_err().code(), Some(2));
    }

    #[test]
    fn prefixes() {
        let a = FieldPath::parse("a.b");
        assert!(a.is_prefix_of(&FieldPath::parse("a.b.c")));
        assert!(a.is_prefix_of(&FieldPath::parse("a.b")));
        assert!(!a.is_prefix_of(&FieldPath::parse("a.bc")));
        assert_eq!(FieldPath::parse("x.y.z").prefix_str(2), "x.y");
    }
}

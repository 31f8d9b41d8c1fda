//! Route descriptors and REST path patterns.
//!
//! A [`RouteDescriptor`] names one registered handler: a REST method plus a
//! path template, a GraphQL parent type plus field, or an opaque direct key.
//! Path templates use `{name}` segments as wildcards bound at match time.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// RouteKind
// ---------------------------------------------------------------------------

/// Transport family of a route or inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Rest,
    Graphql,
    Direct,
}

impl RouteKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Graphql => "graphql",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PathPattern
// ---------------------------------------------------------------------------

/// Errors from parsing a REST path template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("path pattern must start with '/': {pattern}")]
    MissingLeadingSlash { pattern: String },
    #[error("empty wildcard name in path pattern: {pattern}")]
    EmptyWildcard { pattern: String },
    #[error("unbalanced braces in path pattern segment '{segment}'")]
    UnbalancedBraces { segment: String },
    #[error("wildcard '{name}' appears more than once in {pattern}")]
    DuplicateWildcard { name: String, pattern: String },
}

/// One segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Must equal the request segment exactly (case-sensitive).
    Literal(String),
    /// Matches any single non-empty segment and binds it to the name.
    Wildcard(String),
}

/// A parsed REST path template such as `/students/{studentId}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parses a path template.
    ///
    /// The template is normalized the same way request paths are (duplicate
    /// and trailing slashes removed) so `/students/` and `/students` are the
    /// same pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the template does not start with `/`,
    /// contains an empty or unbalanced `{}` segment, or binds the same
    /// wildcard name twice.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash {
                pattern: raw.to_string(),
            });
        }

        let normalized = normalize_path(raw);
        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        for part in split_path(&normalized) {
            let opens = part.starts_with('{');
            let closes = part.ends_with('}');
            match (opens, closes) {
                (true, true) => {
                    let name = &part[1..part.len() - 1];
                    if name.is_empty() {
                        return Err(PatternError::EmptyWildcard {
                            pattern: raw.to_string(),
                        });
                    }
                    if name.contains(['{', '}']) {
                        return Err(PatternError::UnbalancedBraces {
                            segment: part.to_string(),
                        });
                    }
                    if names.contains(&name) {
                        return Err(PatternError::DuplicateWildcard {
                            name: name.to_string(),
                            pattern: raw.to_string(),
                        });
                    }
                    names.push(name);
                    segments.push(Segment::Wildcard(name.to_string()));
                }
                (false, false) if !part.contains(['{', '}']) => {
                    segments.push(Segment::Literal(part.to_string()));
                }
                _ => {
                    return Err(PatternError::UnbalancedBraces {
                        segment: part.to_string(),
                    })
                }
            }
        }

        Ok(Self {
            raw: normalized,
            segments,
        })
    }

    /// The normalized template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of the wildcard segments, left to right.
    pub fn wildcard_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Wildcard(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Matches already-split request segments against this template.
    ///
    /// Segment counts must be equal. Returns the wildcard bindings in
    /// template order, or `None` when any literal differs.
    #[must_use]
    pub fn match_segments(&self, path: &[&str]) -> Option<Vec<(String, String)>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut bindings = Vec::new();
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(expected) if expected == actual => {}
                Segment::Literal(_) => return None,
                Segment::Wildcard(name) => bindings.push((name.clone(), (*actual).to_string())),
            }
        }
        Some(bindings)
    }

    /// Convenience wrapper: normalizes and splits `path`, then matches.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let normalized = normalize_path(path);
        self.match_segments(&split_path(&normalized))
    }

    /// Orders two patterns that match the same request.
    ///
    /// Segments are compared left to right; the first position where one
    /// pattern has a literal and the other a wildcard decides, and the
    /// literal side is `Greater` (more specific).
    #[must_use]
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match (a, b) {
                (Segment::Literal(_), Segment::Wildcard(_)) => return Ordering::Greater,
                (Segment::Wildcard(_), Segment::Literal(_)) => return Ordering::Less,
                _ => {}
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Normalizes a request path or template.
///
/// Drops any `?query` suffix, collapses repeated slashes, and removes a
/// trailing slash. The root path stays `/`; an empty path becomes `/`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    let mut out = String::with_capacity(path.len() + 1);
    for part in path.split('/').filter(|p| !p.is_empty()) {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Splits a normalized path into its non-empty segments.
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|p| !p.is_empty()).collect()
}

// ---------------------------------------------------------------------------
// RouteDescriptor
// ---------------------------------------------------------------------------

/// Identifies one registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteDescriptor {
    Rest { method: String, pattern: PathPattern },
    Graphql { parent_type: String, field_name: String },
    Direct { route_key: String },
}

impl RouteDescriptor {
    /// Builds a REST descriptor. The method is upper-cased.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if `path_pattern` is not a valid template.
    pub fn rest(method: &str, path_pattern: &str) -> Result<Self, PatternError> {
        Ok(Self::Rest {
            method: method.to_ascii_uppercase(),
            pattern: PathPattern::parse(path_pattern)?,
        })
    }

    #[must_use]
    pub fn graphql(parent_type: &str, field_name: &str) -> Self {
        Self::Graphql {
            parent_type: parent_type.to_string(),
            field_name: field_name.to_string(),
        }
    }

    #[must_use]
    pub fn direct(route_key: &str) -> Self {
        Self::Direct {
            route_key: route_key.to_string(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> RouteKind {
        match self {
            Self::Rest { .. } => RouteKind::Rest,
            Self::Graphql { .. } => RouteKind::Graphql,
            Self::Direct { .. } => RouteKind::Direct,
        }
    }
}

impl fmt::Display for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest { method, pattern } => write!(f, "{method} {pattern}"),
            Self::Graphql {
                parent_type,
                field_name,
            } => write!(f, "{parent_type}.{field_name}"),
            Self::Direct { route_key } => write!(f, "direct:{route_key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parses_literal_and_wildcard_segments() {
        let pattern = PathPattern::parse("/students/{studentId}").unwrap();
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("students".to_string()),
                Segment::Wildcard("studentId".to_string()),
            ]
        );
        assert_eq!(pattern.wildcard_names().collect::<Vec<_>>(), vec!["studentId"]);
    }

    #[test]
    fn rejects_malformed_templates() {
        assert!(matches!(
            PathPattern::parse("students"),
            Err(PatternError::MissingLeadingSlash { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/students/{}"),
            Err(PatternError::EmptyWildcard { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/students/{id"),
            Err(PatternError::UnbalancedBraces { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a/{id}/b/{id}"),
            Err(PatternError::DuplicateWildcard { .. })
        ));
    }

    #[test]
    fn binds_wildcards_on_match() {
        let pattern = PathPattern::parse("/students/{studentId}").unwrap();
        assert_eq!(
            pattern.matches("/students/1"),
            Some(vec![("studentId".to_string(), "1".to_string())])
        );
    }

    #[test]
    fn requires_equal_segment_count() {
        let pattern = PathPattern::parse("/students/{studentId}").unwrap();
        assert!(pattern.matches("/students").is_none());
        assert!(pattern.matches("/students/1/classes").is_none());
    }

    #[test]
    fn literals_are_case_sensitive() {
        let pattern = PathPattern::parse("/students").unwrap();
        assert!(pattern.matches("/Students").is_none());
    }

    #[test]
    fn normalize_strips_query_and_extra_slashes() {
        assert_eq!(normalize_path("//students///1/?x=1"), "/students/1");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn root_pattern_matches_root_path() {
        let pattern = PathPattern::parse("/").unwrap();
        assert_eq!(pattern.matches("/"), Some(vec![]));
        assert!(pattern.matches("/students").is_none());
    }

    #[test]
    fn literal_segment_is_more_specific_than_wildcard() {
        let literal = PathPattern::parse("/students/count").unwrap();
        let wildcard = PathPattern::parse("/students/{id}").unwrap();
        assert_eq!(literal.specificity_cmp(&wildcard), Ordering::Greater);
        assert_eq!(wildcard.specificity_cmp(&literal), Ordering::Less);
        assert_eq!(wildcard.specificity_cmp(&wildcard), Ordering::Equal);
    }

    #[test]
    fn leftmost_difference_decides_specificity() {
        let a = PathPattern::parse("/students/{id}/classes").unwrap();
        let b = PathPattern::parse("/{kind}/1/classes").unwrap();
        assert_eq!(a.specificity_cmp(&b), Ordering::Greater);
    }

    #[test]
    fn descriptor_display_and_kind() {
        let rest = RouteDescriptor::rest("get", "/students/{studentId}").unwrap();
        assert_eq!(rest.to_string(), "GET /students/{studentId}");
        assert_eq!(rest.kind(), RouteKind::Rest);

        let gql = RouteDescriptor::graphql("Query", "listStudents");
        assert_eq!(gql.to_string(), "Query.listStudents");
        assert_eq!(gql.kind(), RouteKind::Graphql);

        let direct = RouteDescriptor::direct("list_students");
        assert_eq!(direct.to_string(), "direct:list_students");
        assert_eq!(direct.kind(), RouteKind::Direct);
    }

    fn segment_strategy() -> impl Strategy<Value = (bool, String)> {
        (any::<bool>(), "[a-z][a-zA-Z0-9]{0,7}")
    }

    proptest! {
        #[test]
        fn substituted_template_matches_its_pattern(
            segments in prop::collection::vec(segment_strategy(), 0..6),
            value in "[A-Za-z0-9_-]{1,12}",
        ) {
            let mut template = String::new();
            let mut request = String::new();
            for (i, (wild, name)) in segments.iter().enumerate() {
                if *wild {
                    template.push_str(&format!("/{{{name}{i}}}"));
                    request.push('/');
                    request.push_str(&value);
                } else {
                    template.push('/');
                    template.push_str(name);
                    request.push('/');
                    request.push_str(name);
                }
            }
            if template.is_empty() {
                template.push('/');
                request.push('/');
            }

            let pattern = PathPattern::parse(&template).unwrap();
            let bindings = pattern.matches(&request).unwrap();
            prop_assert_eq!(bindings.len(), pattern.wildcard_names().count());
            for (_, bound) in bindings {
                prop_assert_eq!(bound, value.clone());
            }
        }
    }
}

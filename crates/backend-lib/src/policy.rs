// ============================
// crates/backend-lib/src/policy.rs
// ============================
//! Route classification and the access decision.
//!
//! Rules are evaluated in order and the first match wins. A path no rule
//! matches requires authentication.
use crate::error::AppError;
use crate::identity::Principal;
use crate::validation;
use axum::http::Method;
use recipe_common::{Classification, RouteRule};
use std::collections::BTreeSet;
use std::fmt;

/// Substrings that mark a path as an attempt to smuggle separators or dots
const SUSPICIOUS_SEQUENCES: [&str; 4] = ["%2e", "%2f", "%5c", "%00"];

/// Outcome of an access decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RequireLogin,
    Deny,
}

/// A request path after dot-segment resolution and slash collapsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    path: String,
    suspicious: bool,
}

impl NormalizedPath {
    pub fn new(raw: &str) -> Self {
        let lowered = raw.to_ascii_lowercase();
        // The router dispatches on the raw path, so anything this resolves away is suspect
        let suspicious = raw.contains('\\')
            || SUSPICIOUS_SEQUENCES.iter().any(|seq| lowered.contains(seq))
            || has_unresolved_segments(raw);

        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {},
                ".." => {
                    segments.pop();
                },
                other => segments.push(other),
            }
        }

        let mut path = format!("/{}", segments.join("/"));
        if raw.ends_with('/') && !segments.is_empty() {
            path.push('/');
        }

        Self { path, suspicious }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Whether the raw path carried encoded separators, dots or backslashes
    pub fn is_suspicious(&self) -> bool {
        self.suspicious
    }

    /// Segments after the leading slash. A trailing slash yields a final empty segment.
    fn segments(&self) -> Vec<&str> {
        if self.path == "/" {
            Vec::new()
        } else {
            self.path[1..].split('/').collect()
        }
    }
}

/// Dot segments anywhere, or empty segments other than the leading and trailing ones
fn has_unresolved_segments(raw: &str) -> bool {
    let segments: Vec<&str> = raw.split('/').collect();
    let last = segments.len().saturating_sub(1);
    segments.iter().enumerate().any(|(i, segment)| match *segment {
        "." | ".." => true,
        "" => i != 0 && i != last,
        _ => false,
    })
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one non-empty segment
    Any,
}

/// A path pattern: literal segments, `*` for one segment, optional trailing `**`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    /// Ends in `**`: matches the prefix itself and anything below it
    deep: bool,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = |reason: &str| AppError::Configuration(format!("invalid route pattern '{raw}': {reason}"));

        let Some(rest) = raw.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };
        if raw.contains(['?', '#', '%', '\\']) {
            return Err(invalid("must be a plain path"));
        }

        let mut segments = Vec::new();
        let mut deep = false;
        if !rest.is_empty() {
            let parts: Vec<&str> = rest.split('/').collect();
            let last = parts.len() - 1;
            for (i, part) in parts.into_iter().enumerate() {
                match part {
                    "**" if i == last => deep = true,
                    "**" => return Err(invalid("'**' is only allowed as the last segment")),
                    "*" => segments.push(Segment::Any),
                    "" => return Err(invalid("empty segment")),
                    "." | ".." => return Err(invalid("dot segments are not allowed")),
                    p if p.contains('*') => return Err(invalid("'*' must be a whole segment")),
                    p => segments.push(Segment::Literal(p.to_string())),
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            deep,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &NormalizedPath) -> bool {
        let path_segments = path.segments();
        if self.deep {
            if path_segments.len() < self.segments.len() {
                return false;
            }
        } else if path_segments.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(&path_segments)
            .all(|(pattern, actual)| match pattern {
                Segment::Literal(literal) => literal == actual,
                Segment::Any => !actual.is_empty(),
            })
    }
}

/// A set of patterns where any match counts, used for path lists such as cache-sensitive paths
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<PathPattern>,
}

impl PatternSet {
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, AppError> {
        let patterns = raw
            .iter()
            .map(|p| PathPattern::parse(p.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, path: &str) -> bool {
        let normalized = NormalizedPath::new(path);
        self.patterns.iter().any(|p| p.matches(&normalized))
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    pattern: PathPattern,
    access: Classification,
    /// Empty means every method
    methods: BTreeSet<String>,
    /// Non-empty restricts an authenticated rule to holders of any listed role
    roles: BTreeSet<String>,
}

impl CompiledRule {
    fn applies_to(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method.as_str())
    }

    fn overlaps(&self, other: &CompiledRule) -> bool {
        self.pattern.as_str() == other.pattern.as_str()
            && (self.methods.is_empty()
                || other.methods.is_empty()
                || !self.methods.is_disjoint(&other.methods))
    }
}

/// Ordered route classification table
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    rules: Vec<CompiledRule>,
}

impl RoutePolicy {
    /// Compile a rule list. Malformed, duplicate and conflicting rules are configuration errors.
    pub fn from_rules(rules: &[RouteRule]) -> Result<Self, AppError> {
        let mut compiled: Vec<CompiledRule> = Vec::with_capacity(rules.len());

        for rule in rules {
            let pattern = PathPattern::parse(&rule.pattern)?;

            let mut methods = BTreeSet::new();
            for method in &rule.methods {
                let upper = method.to_ascii_uppercase();
                Method::from_bytes(upper.as_bytes()).map_err(|_| {
                    AppError::Configuration(format!(
                        "route '{}' names invalid method '{method}'",
                        rule.pattern
                    ))
                })?;
                methods.insert(upper);
            }

            let mut roles = BTreeSet::new();
            for role in &rule.roles {
                validation::validate_role(role).map_err(|e| {
                    AppError::Configuration(format!("route '{}': {e}", rule.pattern))
                })?;
                roles.insert(role.clone());
            }
            if rule.access == Classification::Public && !roles.is_empty() {
                return Err(AppError::Configuration(format!(
                    "public route '{}' cannot require roles",
                    rule.pattern
                )));
            }

            let candidate = CompiledRule {
                pattern,
                access: rule.access,
                methods,
                roles,
            };
            if let Some(existing) = compiled.iter().find(|r| r.overlaps(&candidate)) {
                let kind = if existing.access == candidate.access && existing.roles == candidate.roles {
                    "duplicate"
                } else {
                    "conflicting"
                };
                return Err(AppError::Configuration(format!(
                    "{kind} rules for route pattern '{}'",
                    rule.pattern
                )));
            }
            compiled.push(candidate);
        }

        Ok(Self { rules: compiled })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify a request path. Suspicious paths never match a public rule.
    pub fn classify(&self, path: &str, method: &Method) -> (Classification, Option<&BTreeSet<String>>) {
        let normalized = NormalizedPath::new(path);

        let matched = self.rules.iter().find(|rule| {
            rule.applies_to(method)
                && !(rule.access == Classification::Public && normalized.is_suspicious())
                && rule.pattern.matches(&normalized)
        });

        match matched {
            Some(rule) => (rule.access, Some(&rule.roles).filter(|r| !r.is_empty())),
            None => (Classification::RequiresAuth, None),
        }
    }

    /// Decide whether a request may proceed
    pub fn decide(&self, path: &str, method: &Method, principal: Option<&Principal>) -> Decision {
        match self.classify(path, method) {
            (Classification::Public, _) => Decision::Allow,
            (Classification::RequiresAuth, roles) => match (principal, roles) {
                (None, _) => Decision::RequireLogin,
                (Some(principal), Some(roles)) if !principal.has_any_role(roles) => Decision::Deny,
                (Some(_), _) => Decision::Allow,
            },
        }
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Parameter search and node filtering.
//!
//! A [`ParameterPattern`] is a dotted parameter path where any segment may
//! be a glob. A bare `*` segment matches exactly one key, never a whole
//! subtree, so `app.*.port` finds `app.web.port` but not `app.port` or
//! `app.web.tls.port`.

use crate::{
    resolve::ResolvedNode,
    value::{Mapping, Value},
};

use glob::{Pattern, PatternError};
use serde::Serialize;
use std::str::FromStr;

/// Dotted parameter path with glob segments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterPattern {
    segments: Vec<Segment>,
}

impl ParameterPattern {
    /// Find every concrete path matching the pattern.
    ///
    /// Matches come back in key order.
    pub fn matches_in<'a>(&self, parameters: &'a Mapping) -> Vec<(String, &'a Value)> {
        let Some((last, inner)) = self.segments.split_last() else {
            return Vec::new();
        };

        let mut frontier: Vec<(Vec<&'a str>, &'a Mapping)> = vec![(Vec::new(), parameters)];
        for segment in inner {
            frontier = frontier
                .into_iter()
                .flat_map(|(path, mapping)| {
                    mapping
                        .iter()
                        .filter(move |(key, _)| segment.matches(key))
                        .filter_map(move |(key, value)| {
                            let mut path = path.clone();
                            path.push(key.as_str());
                            value.as_mapping().map(|mapping| (path, mapping))
                        })
                })
                .collect();
        }

        let mut matches = Vec::new();
        for (path, mapping) in frontier {
            for (key, value) in mapping.iter().filter(|(key, _)| last.matches(key)) {
                let mut path = path.clone();
                path.push(key.as_str());
                matches.push((path.join("."), value));
            }
        }

        matches
    }

    /// First match in key order.
    pub fn first_in<'a>(&self, parameters: &'a Mapping) -> Option<&'a Value> {
        self.matches_in(parameters)
            .into_iter()
            .next()
            .map(|(_, value)| value)
    }
}

impl FromStr for ParameterPattern {
    type Err = SearchError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let segments = data
            .split('.')
            .map(|segment| Segment::parse(segment, data))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Any,
    Glob(Pattern),
}

impl Segment {
    fn parse(segment: &str, pattern: &str) -> Result<Self, SearchError> {
        if segment.is_empty() {
            return Err(SearchError::EmptySegment {
                pattern: pattern.to_owned(),
            });
        }

        match segment {
            "*" => Ok(Self::Any),
            glob if glob.contains(['*', '?', '[']) => Pattern::new(glob)
                .map(Self::Glob)
                .map_err(|source| SearchError::Glob {
                    source,
                    pattern: pattern.to_owned(),
                }),
            literal => Ok(Self::Literal(literal.to_owned())),
        }
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == key,
            Self::Any => true,
            Self::Glob(glob) => glob.matches(key),
        }
    }
}

/// Parameter found by search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterMatch {
    /// Node the parameter belongs to.
    pub node: String,

    /// Concrete dotted path of the parameter.
    pub path: String,

    /// Merged value.
    pub value: Value,
}

/// Select resolved nodes by name, class, or project.
///
/// Every configured criterion must hold for a node to match.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeFilter {
    node: Option<Pattern>,
    class: Option<String>,
    project: Option<String>,
}

impl NodeFilter {
    /// Construct filter matching every node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require node name to match glob pattern.
    ///
    /// # Errors
    ///
    /// - Return [`SearchError::Glob`] if pattern is not a valid glob.
    pub fn with_node_pattern(mut self, pattern: &str) -> Result<Self, SearchError> {
        let glob = Pattern::new(pattern).map_err(|source| SearchError::Glob {
            source,
            pattern: pattern.to_owned(),
        })?;
        self.node = Some(glob);
        Ok(self)
    }

    /// Require node to carry class.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Require top-level `project` parameter to equal value.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Check if resolved node passes the filter.
    pub fn matches(&self, node: &ResolvedNode) -> bool {
        let by_name = self.node.as_ref().is_none_or(|glob| glob.matches(&node.name));
        let by_class = self.class.as_deref().is_none_or(|class| node.has_class(class));
        let by_project = self.project.as_deref().is_none_or(|project| {
            node.parameters
                .get("project")
                .and_then(Value::as_str)
                .is_some_and(|value| value == project)
        });

        by_name && by_class && by_project
    }
}

/// Search error types.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("parameter pattern {pattern:?} contains an empty segment")]
    EmptySegment { pattern: String },

    #[error("invalid glob in pattern {pattern:?}")]
    Glob {
        #[source]
        source: PatternError,
        pattern: String,
    },
}

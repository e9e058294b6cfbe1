// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Node resolution.
//!
//! Resolving a node means two things: [`linearize`] its class ancestry, then
//! [`merge`] the parameters of every class in that ancestry, followed by the
//! node's own parameters. The result is a [`ResolvedNode`].
//!
//! Resolution is a pure function of the store contents. Resolving the same
//! node twice against the same store yields identical ancestry, and
//! byte-identical parameters.

pub mod linearize;
pub mod merge;

use crate::{
    config::MergeSettings,
    resolve::{
        linearize::{linearize_class, linearize_node},
        merge::{MergeWarning, Merger, PrefixMarker},
    },
    store::{DefinitionKind, NotFound, Store},
    value::{Mapping, Value},
};

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Fully merged view of a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNode {
    /// Name of the node.
    pub name: String,

    /// Contributing classes in merge order, ending with the node itself.
    pub ancestry: Vec<String>,

    /// Application tags collected along the ancestry.
    pub applications: Vec<String>,

    /// Environment of the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Merged parameters.
    pub parameters: Mapping,

    /// Type mismatches encountered while merging.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<MergeWarning>,
}

impl ResolvedNode {
    /// Classes of the node, without the node itself.
    pub fn classes(&self) -> &[String] {
        self.ancestry
            .split_last()
            .map(|(_, classes)| classes)
            .unwrap_or_default()
    }

    /// Check if class contributed to the node.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|name| name == class)
    }

    /// Look up merged parameter by dotted path.
    pub fn parameter(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = self.parameters.get(segments.next()?)?;
        first.pointer(segments)
    }
}

/// Resolves nodes against a store.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    merger: Merger,
}

impl Resolver {
    /// Construct new resolver.
    pub fn new(merger: Merger) -> Self {
        Self { merger }
    }

    /// Construct resolver following merge settings.
    pub fn from_settings(settings: &MergeSettings) -> Self {
        Self::new(Merger::new(PrefixMarker::new(settings.append_marker.as_str())))
    }

    /// Resolve a node.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::NotFound`] if node does not exist.
    /// - Return [`ResolveError::UnresolvedReference`] if a class in the
    ///   ancestry references a class that does not exist.
    /// - Return [`ResolveError::Cycle`] if the ancestry contains a cycle.
    /// - Return [`ResolveError::NameClash`] if the node inherits a class of
    ///   its own name.
    #[instrument(skip(self, store), level = "debug")]
    pub fn resolve_node(&self, store: &Store, name: &str) -> Result<ResolvedNode> {
        let node = store.get_node(name)?;
        let ancestry = linearize_node(store, name)?;
        let mut resolved = self.fold_classes(store, ancestry)?;

        self.merger.merge(
            &mut resolved.parameters,
            &node.parameters,
            &node.name,
            &mut resolved.warnings,
        );
        extend_unique(&mut resolved.applications, &node.applications);
        resolved.name = node.name.clone();
        resolved.environment = node.environment.clone();
        debug!(
            "resolved node {name:?} with {} warnings",
            resolved.warnings.len()
        );

        Ok(resolved)
    }

    /// Resolve a class as if it were a node.
    ///
    /// Useful to inspect what a class contributes on its own.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::NotFound`] if class does not exist.
    /// - Return [`ResolveError::UnresolvedReference`] if a class in the
    ///   ancestry references a class that does not exist.
    /// - Return [`ResolveError::Cycle`] if the ancestry contains a cycle.
    #[instrument(skip(self, store), level = "debug")]
    pub fn resolve_class(&self, store: &Store, name: &str) -> Result<ResolvedNode> {
        let class = store.get_class(name)?;
        let ancestry = linearize_class(store, name)?;
        let mut resolved = self.fold_classes(store, ancestry)?;

        self.merger.merge(
            &mut resolved.parameters,
            &class.parameters,
            &class.name,
            &mut resolved.warnings,
        );
        extend_unique(&mut resolved.applications, &class.applications);
        resolved.name = class.name.clone();

        Ok(resolved)
    }

    /// Merge every class of the ancestry except the root itself.
    fn fold_classes(&self, store: &Store, ancestry: Vec<String>) -> Result<ResolvedNode> {
        let mut parameters = Mapping::new();
        let mut applications = Vec::new();
        let mut warnings = Vec::new();

        if let Some((_, classes)) = ancestry.split_last() {
            for name in classes {
                let class = store.get_class(name)?;
                self.merger
                    .merge(&mut parameters, &class.parameters, &class.name, &mut warnings);
                extend_unique(&mut applications, &class.applications);
            }
        }

        Ok(ResolvedNode {
            name: String::new(),
            ancestry,
            applications,
            environment: None,
            parameters,
            warnings,
        })
    }
}

fn extend_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

/// Resolution error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Requested node or class does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFound),

    /// Parent reference points to a class that does not exist.
    #[error("{kind} {referrer:?} in {:?} references unknown class {missing:?}", file.display())]
    UnresolvedReference {
        kind: DefinitionKind,
        referrer: String,
        missing: String,
        file: PathBuf,
    },

    /// Inheritance loops back on itself.
    #[error("inheritance cycle {}", cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    /// Node inherits a class carrying the node's own name.
    #[error("node {name:?} in {:?} inherits class of the same name", file.display())]
    NameClash { name: String, file: PathBuf },
}

/// Friendly result alias :3
type Result<T, E = ResolveError> = std::result::Result<T, E>;

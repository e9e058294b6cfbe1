// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Parameter merging.
//!
//! Folds the parameter trees of a node's ancestry into one mapping. Sources
//! are merged in ancestry order, so later sources take priority:
//!
//! - Scalars are overwritten.
//! - Mappings are merged key by key, recursively.
//! - Sequences are replaced wholesale, unless the later sequence carries an
//!   __append marker__, in which case its items are appended instead.
//! - A value of a different kind replaces the earlier value, and a
//!   [`MergeWarning`] is recorded. Null on either side is exempt, since
//!   overriding with null is how a value is explicitly cleared.
//!
//! # Append Markers
//!
//! How a sequence gets marked for appending is a matter of convention, so it
//! is modeled by the [`SequenceMarker`] trait. The default [`PrefixMarker`]
//! treats any string item starting with a prefix (`+` unless configured
//! otherwise) as marked:
//!
//! ```yaml
//! packages: [+vim]  # appended to inherited packages
//! ```
//!
//! A sequence with at least one marked item is in append mode, and then all
//! of its items are appended in order. Markers never survive into merged
//! output.

use crate::value::{Mapping, Value, ValueKind};

use serde::Serialize;
use std::{
    collections::btree_map::Entry,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    sync::Arc,
};
use tracing::debug;

/// Detect append markers on sequence items.
pub trait SequenceMarker: Debug + Send + Sync + 'static {
    /// Strip marker from sequence item.
    ///
    /// Returns the bare item if it was marked, `None` otherwise.
    fn strip(&self, item: &Value) -> Option<Value>;
}

/// Marks string items by a leading prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMarker {
    prefix: String,
}

impl PrefixMarker {
    /// Construct new prefix marker.
    ///
    /// An empty prefix never marks anything.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for PrefixMarker {
    fn default() -> Self {
        Self::new("+")
    }
}

impl SequenceMarker for PrefixMarker {
    fn strip(&self, item: &Value) -> Option<Value> {
        if self.prefix.is_empty() {
            return None;
        }

        item.as_str()
            .and_then(|string| string.strip_prefix(self.prefix.as_str()))
            .map(Value::from)
    }
}

/// Type mismatch encountered while merging.
///
/// Non-fatal: the incoming value still wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeWarning {
    /// Dotted parameter path of the conflict.
    pub path: String,

    /// Class or node whose parameters caused the override.
    pub source: String,

    /// Kind of the value being replaced.
    pub previous: ValueKind,

    /// Kind of the replacing value.
    pub incoming: ValueKind,
}

impl Display for MergeWarning {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "{} replaces {} with {} at {:?}",
            self.source, self.previous, self.incoming, self.path
        )
    }
}

/// Parameter tree merger.
#[derive(Debug, Clone)]
pub struct Merger {
    marker: Arc<dyn SequenceMarker>,
}

impl Merger {
    /// Construct new merger using target append marker convention.
    pub fn new(marker: impl SequenceMarker) -> Self {
        Self {
            marker: Arc::new(marker),
        }
    }

    /// Fold overlay parameters of a source into base parameters.
    ///
    /// Type mismatches are pushed onto `warnings`.
    pub fn merge(
        &self,
        base: &mut Mapping,
        overlay: &Mapping,
        source: &str,
        warnings: &mut Vec<MergeWarning>,
    ) {
        let mut context = MergeContext {
            source,
            path: Vec::new(),
            warnings,
        };
        self.merge_mapping(base, overlay, &mut context);
    }

    fn merge_mapping(&self, base: &mut Mapping, overlay: &Mapping, context: &mut MergeContext<'_>) {
        for (key, incoming) in overlay {
            context.path.push(key.clone());
            match base.entry(key.clone()) {
                Entry::Occupied(mut entry) => self.merge_value(entry.get_mut(), incoming, context),
                Entry::Vacant(entry) => {
                    entry.insert(self.normalize(incoming));
                }
            }
            context.path.pop();
        }
    }

    fn merge_value(&self, existing: &mut Value, incoming: &Value, context: &mut MergeContext<'_>) {
        match (existing, incoming) {
            (Value::Mapping(base), Value::Mapping(overlay)) => {
                self.merge_mapping(base, overlay, context)
            }
            (Value::Sequence(base), Value::Sequence(items)) => {
                let (append, items) = self.sequence_items(items);
                if append {
                    base.extend(items);
                } else {
                    *base = items;
                }
            }
            (existing, incoming) => {
                let previous = existing.kind();
                let next = incoming.kind();
                let is_clearing = previous == ValueKind::Null || next == ValueKind::Null;
                if previous != next && !is_clearing {
                    let warning = MergeWarning {
                        path: context.path.join("."),
                        source: context.source.to_owned(),
                        previous,
                        incoming: next,
                    };
                    debug!("{warning}");
                    context.warnings.push(warning);
                }
                *existing = self.normalize(incoming);
            }
        }
    }

    /// Strip markers of sequence items, reporting whether any were marked.
    fn sequence_items(&self, items: &[Value]) -> (bool, Vec<Value>) {
        let mut append = false;
        let items = items
            .iter()
            .map(|item| match self.marker.strip(item) {
                Some(bare) => {
                    append = true;
                    bare
                }
                None => self.normalize(item),
            })
            .collect();

        (append, items)
    }

    /// Copy value with every append marker stripped.
    fn normalize(&self, value: &Value) -> Value {
        match value {
            Value::Sequence(items) => Value::Sequence(self.sequence_items(items).1),
            Value::Mapping(mapping) => Value::Mapping(
                mapping
                    .iter()
                    .map(|(key, value)| (key.clone(), self.normalize(value)))
                    .collect(),
            ),
            scalar => scalar.clone(),
        }
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(PrefixMarker::default())
    }
}

struct MergeContext<'a> {
    source: &'a str,
    path: Vec<String>,
    warnings: &'a mut Vec<MergeWarning>,
}

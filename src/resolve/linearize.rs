// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Ancestry linearization.
//!
//! Computes the order in which the classes of a node (or class) get merged.
//! The class graph is walked depth-first in declared parent order, placing
//! every class after its own ancestors. A class reachable through several
//! paths keeps the position of its first occurrence. The root comes last,
//! since its own parameters take priority over everything it inherits.
//!
//! The walk uses an explicit frame stack instead of recursion, so deep
//! hierarchies cannot overflow the call stack. The frames on that stack are
//! exactly the current inheritance path, which makes cycle detection a
//! matter of checking whether a parent is already on it.

use crate::{
    resolve::ResolveError,
    store::{DefinitionKind, Store},
};

use std::{collections::HashSet, path::Path};
use tracing::{debug, instrument};

/// Linearize ancestry of a node.
///
/// # Errors
///
/// - Return [`ResolveError::NotFound`] if node does not exist.
/// - Return [`ResolveError::UnresolvedReference`] if a parent does not exist.
/// - Return [`ResolveError::Cycle`] if inheritance loops back on itself.
/// - Return [`ResolveError::NameClash`] if the node inherits a class of its
///   own name.
#[instrument(skip(store), level = "debug")]
pub fn linearize_node(store: &Store, name: &str) -> Result<Vec<String>> {
    let node = store.get_node(name)?;
    let ancestry = linearize(
        store,
        Frame::new(DefinitionKind::Node, &node.name, &node.parents, &node.source),
    )?;

    // INVARIANT: Ancestry never names anything twice.
    if ancestry.iter().filter(|entry| *entry == name).count() > 1 {
        return Err(ResolveError::NameClash {
            name: name.to_owned(),
            file: node.source.clone(),
        });
    }

    Ok(ancestry)
}

/// Linearize ancestry of a class.
///
/// # Errors
///
/// - Return [`ResolveError::NotFound`] if class does not exist.
/// - Return [`ResolveError::UnresolvedReference`] if a parent does not exist.
/// - Return [`ResolveError::Cycle`] if inheritance loops back on itself.
#[instrument(skip(store), level = "debug")]
pub fn linearize_class(store: &Store, name: &str) -> Result<Vec<String>> {
    let class = store.get_class(name)?;
    linearize(
        store,
        Frame::new(DefinitionKind::Class, &class.name, &class.parents, &class.source),
    )
}

struct Frame<'a> {
    kind: DefinitionKind,
    name: &'a str,
    parents: &'a [String],
    source: &'a Path,
    next: usize,
}

impl<'a> Frame<'a> {
    fn new(kind: DefinitionKind, name: &'a str, parents: &'a [String], source: &'a Path) -> Self {
        Self {
            kind,
            name,
            parents,
            source,
            next: 0,
        }
    }
}

fn linearize<'a>(store: &'a Store, root: Frame<'a>) -> Result<Vec<String>> {
    let mut ancestry = Vec::new();
    let mut seen: HashSet<&'a str> = HashSet::new();
    let mut stack = vec![root];

    while let Some(frame) = stack.last_mut() {
        let parents: &'a [String] = frame.parents;
        let Some(parent) = parents.get(frame.next) else {
            // INVARIANT: All ancestors placed, so place the frame itself.
            let name = frame.name;
            stack.pop();
            seen.insert(name);
            ancestry.push(name.to_owned());
            continue;
        };
        frame.next += 1;
        let (kind, referrer, source) = (frame.kind, frame.name, frame.source);

        // INVARIANT: Parent already on the inheritance path means a cycle.
        let on_path = stack
            .iter()
            .position(|frame| frame.kind == DefinitionKind::Class && frame.name == parent);
        if let Some(start) = on_path {
            let mut cycle = stack[start..]
                .iter()
                .map(|frame| frame.name.to_owned())
                .collect::<Vec<_>>();
            cycle.push(parent.clone());
            return Err(ResolveError::Cycle { cycle });
        }

        // INVARIANT: First occurrence wins.
        if seen.contains(parent.as_str()) {
            debug!("skip {parent:?} already placed, reached again from {referrer:?}");
            continue;
        }

        let class = store
            .get_class(parent)
            .map_err(|_| ResolveError::UnresolvedReference {
                kind,
                referrer: referrer.to_owned(),
                missing: parent.clone(),
                file: source.to_path_buf(),
            })?;
        stack.push(Frame::new(
            DefinitionKind::Class,
            &class.name,
            &class.parents,
            &class.source,
        ));
    }

    Ok(ancestry)
}

/// Friendly result alias :3
type Result<T, E = ResolveError> = std::result::Result<T, E>;

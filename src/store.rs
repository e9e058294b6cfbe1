// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Class store loading and lookup.
//!
//! Maestro keeps every class and node definition of an inventory in one
//! place called the __class store__. The store is loaded wholesale from disk,
//! and never mutated afterwards. Resolution only ever reads from it, so a
//! loaded store can be shared between any number of concurrent resolutions.
//!
//! # Inventory Layout
//!
//! An inventory is a directory with two sub-directories: one for classes and
//! one for nodes (`classes` and `nodes` by default). Class names follow the
//! location of their file below the classes directory, e.g.,
//! `classes/service/postgresql/primary.yml` defines the class
//! `service.postgresql.primary`, while `classes/service/postgresql/init.yml`
//! defines `service.postgresql`. Node names are just the file stem of the
//! node file, so nodes can be freely grouped in sub-directories.
//!
//! # Failure Semantics
//!
//! Loading is all-or-nothing. A single unreadable or malformed file aborts
//! the load, and no store is returned. Mixing valid and invalid definitions
//! in one run would silently change merge results.

pub mod definition;

pub use definition::{ClassDefinition, DefinitionFile, DefinitionKind, NodeDefinition};

use crate::config::InventorySettings;
use definition::{class_name_from_path, node_name_from_path};

use ignore::WalkBuilder;
use std::{
    collections::BTreeMap,
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Immutable set of class and node definitions.
#[derive(Default, Debug, Clone)]
pub struct Store {
    root: PathBuf,
    classes: BTreeMap<String, ClassDefinition>,
    nodes: BTreeMap<String, NodeDefinition>,
}

impl Store {
    /// Load inventory from disk.
    ///
    /// Walks the classes and nodes directories of the inventory, parsing
    /// every file whose extension is listed in the settings. Hidden files and
    /// directories are skipped.
    ///
    /// # Errors
    ///
    /// - Return [`LoadError::MissingDirectory`] if the classes or nodes
    ///   directory does not exist.
    /// - Return [`LoadError::Walk`] if directory traversal fails.
    /// - Return [`LoadError::Read`] if a definition file cannot be read.
    /// - Return [`LoadError::Parse`] if a definition file is malformed.
    /// - Return [`LoadError::InvalidName`] if no name can be derived from the
    ///   location of a definition file.
    /// - Return [`LoadError::Duplicate`] if two files define the same name.
    #[instrument(skip(settings), fields(root = %settings.path.display()), level = "debug")]
    pub fn load(settings: &InventorySettings) -> Result<Self> {
        let classes_path = settings.classes_path();
        let nodes_path = settings.nodes_path();
        for dir in [&classes_path, &nodes_path] {
            if !dir.is_dir() {
                return Err(LoadError::MissingDirectory { path: dir.clone() });
            }
        }

        let mut store = Self {
            root: settings.path.clone(),
            ..Default::default()
        };

        for path in definition_files(settings, &classes_path)? {
            let (name, namespace) = class_name_from_path(&classes_path, &path)
                .ok_or_else(|| LoadError::InvalidName { path: path.clone() })?;
            let file = parse_definition(&path)?;
            debug!("load class {name:?} from {:?}", path.display());
            store.insert_class(ClassDefinition::from_file(name, &namespace, file, path))?;
        }

        for path in definition_files(settings, &nodes_path)? {
            let name = node_name_from_path(&path)
                .ok_or_else(|| LoadError::InvalidName { path: path.clone() })?;
            let file = parse_definition(&path)?;
            debug!("load node {name:?} from {:?}", path.display());
            store.insert_node(NodeDefinition::from_file(name, file, path))?;
        }

        if store.nodes.is_empty() {
            warn!("no nodes found in inventory {:?}", store.root.display());
        }

        info!(
            "loaded {} classes and {} nodes from {:?}",
            store.classes.len(),
            store.nodes.len(),
            store.root.display()
        );

        Ok(store)
    }

    /// Construct store from in-memory definitions.
    ///
    /// # Errors
    ///
    /// - Return [`LoadError::Duplicate`] if two definitions share a name.
    pub fn from_definitions(
        classes: impl IntoIterator<Item = ClassDefinition>,
        nodes: impl IntoIterator<Item = NodeDefinition>,
    ) -> Result<Self> {
        let mut store = Self::default();
        for class in classes {
            store.insert_class(class)?;
        }

        for node in nodes {
            store.insert_node(node)?;
        }

        Ok(store)
    }

    /// Root directory the store was loaded from.
    ///
    /// Empty for stores built from in-memory definitions.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Look up class by exact name.
    ///
    /// # Errors
    ///
    /// - Return [`NotFound`] if no class has that name.
    pub fn get_class(&self, name: &str) -> Result<&ClassDefinition, NotFound> {
        self.classes.get(name).ok_or_else(|| NotFound {
            kind: DefinitionKind::Class,
            name: name.to_owned(),
        })
    }

    /// Look up node by exact name.
    ///
    /// # Errors
    ///
    /// - Return [`NotFound`] if no node has that name.
    pub fn get_node(&self, name: &str) -> Result<&NodeDefinition, NotFound> {
        self.nodes.get(name).ok_or_else(|| NotFound {
            kind: DefinitionKind::Node,
            name: name.to_owned(),
        })
    }

    /// Class names in sorted order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Node names in sorted order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    fn insert_class(&mut self, class: ClassDefinition) -> Result<()> {
        if let Some(existing) = self.classes.get(&class.name) {
            return Err(LoadError::Duplicate {
                kind: DefinitionKind::Class,
                name: class.name,
                first: existing.source.clone(),
                second: class.source,
            });
        }

        self.classes.insert(class.name.clone(), class);
        Ok(())
    }

    fn insert_node(&mut self, node: NodeDefinition) -> Result<()> {
        if let Some(existing) = self.nodes.get(&node.name) {
            return Err(LoadError::Duplicate {
                kind: DefinitionKind::Node,
                name: node.name,
                first: existing.source.clone(),
                second: node.source,
            });
        }

        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }
}

fn definition_files(settings: &InventorySettings, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(dir)
        .hidden(true)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .follow_links(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = entry.map_err(|err| LoadError::Walk {
            source: err,
            path: dir.to_path_buf(),
        })?;

        // INVARIANT: Only regular files with known extensions are definitions.
        let is_file = entry.file_type().is_some_and(|kind| kind.is_file());
        if is_file && settings.is_definition(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

fn parse_definition(path: &Path) -> Result<DefinitionFile> {
    let content = read_to_string(path).map_err(|err| LoadError::Read {
        source: err,
        path: path.to_path_buf(),
    })?;

    content.parse().map_err(|err| LoadError::Parse {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Requested definition does not exist in the store.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind} {name:?} not found")]
pub struct NotFound {
    pub kind: DefinitionKind,
    pub name: String,
}

/// Inventory loading error types.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Required inventory directory is missing.
    #[error("inventory directory {:?} does not exist", path.display())]
    MissingDirectory { path: PathBuf },

    /// Directory traversal fails.
    #[error("failed to walk inventory directory {:?}", path.display())]
    Walk {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },

    /// Definition file cannot be read.
    #[error("failed to read definition file {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Definition file is malformed.
    #[error("malformed definition file {:?}", path.display())]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },

    /// Definition name cannot be derived from file location.
    #[error("cannot derive definition name from {:?}", path.display())]
    InvalidName { path: PathBuf },

    /// Two definition files define the same name.
    #[error("{kind} {name:?} defined twice: {:?} and {:?}", first.display(), second.display())]
    Duplicate {
        kind: DefinitionKind,
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = LoadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::{create_dir_all, write};
    use tempfile::TempDir;

    fn inventory(files: &[(&str, &str)]) -> anyhow::Result<(TempDir, InventorySettings)> {
        let dir = tempfile::tempdir()?;
        create_dir_all(dir.path().join("classes"))?;
        create_dir_all(dir.path().join("nodes"))?;
        for (path, content) in files {
            let path = dir.path().join(path);
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            write(path, content)?;
        }

        let settings = InventorySettings {
            path: dir.path().to_path_buf(),
            ..Default::default()
        };

        Ok((dir, settings))
    }

    #[test]
    fn load_classes_and_nodes() -> anyhow::Result<()> {
        let (_dir, settings) = inventory(&[
            ("classes/base.yml", "parameters: {ntp: pool.ntp.org}"),
            ("classes/service/redis/init.yml", "classes: [base, .server]"),
            ("classes/service/redis/server.yml", "parameters: {redis: {port: 6379}}"),
            ("classes/.hidden.yml", "parameters: {x: 1}"),
            ("classes/README.md", "not a definition"),
            ("nodes/prod/cache01.yml", "classes: [service.redis]"),
        ])?;

        let store = Store::load(&settings)?;

        assert_eq!(store.root(), settings.path.as_path());
        assert_eq!(
            store.class_names().collect::<Vec<_>>(),
            vec!["base", "service.redis", "service.redis.server"]
        );
        assert_eq!(store.node_names().collect::<Vec<_>>(), vec!["cache01"]);
        assert_eq!(
            store.get_class("service.redis")?.parents,
            vec!["base".to_string(), "service.redis.server".to_string()]
        );
        assert_eq!(
            store.get_node("cache01")?.parents,
            vec!["service.redis".to_string()]
        );

        Ok(())
    }

    #[test]
    fn get_unknown_definition() -> anyhow::Result<()> {
        let store = Store::default();
        let result = store.get_class("ghost");
        assert_eq!(
            result,
            Err(NotFound {
                kind: DefinitionKind::Class,
                name: "ghost".into()
            })
        );
        assert!(store.get_node("ghost").is_err());

        Ok(())
    }

    #[test]
    fn malformed_file_aborts_load() -> anyhow::Result<()> {
        let (_dir, settings) = inventory(&[
            ("classes/good.yml", "parameters: {x: 1}"),
            ("classes/bad.yml", "parameters: [x, 1"),
            ("nodes/n1.yml", "classes: [good]"),
        ])?;

        let result = Store::load(&settings);
        assert!(matches!(result, Err(LoadError::Parse { path, .. }) if path.ends_with("bad.yml")));

        Ok(())
    }

    #[test]
    fn colliding_keys_abort_load() -> anyhow::Result<()> {
        let (_dir, settings) = inventory(&[
            ("classes/ports.yml", "parameters: {ports: {80: http, \"80\": www}}"),
            ("nodes/n1.yml", "classes: [ports]"),
        ])?;

        let result = Store::load(&settings);
        assert!(matches!(result, Err(LoadError::Parse { path, .. }) if path.ends_with("ports.yml")));

        Ok(())
    }

    #[test]
    fn duplicate_class_aborts_load() -> anyhow::Result<()> {
        let (_dir, settings) = inventory(&[
            ("classes/app.yml", ""),
            ("classes/app/init.yml", ""),
        ])?;

        let result = Store::load(&settings);
        assert!(matches!(
            result,
            Err(LoadError::Duplicate { kind: DefinitionKind::Class, name, .. }) if name == "app"
        ));

        Ok(())
    }

    #[test]
    fn duplicate_node_aborts_load() -> anyhow::Result<()> {
        let (_dir, settings) = inventory(&[
            ("nodes/dc1/web01.yml", ""),
            ("nodes/dc2/web01.yml", ""),
        ])?;

        let result = Store::load(&settings);
        assert!(matches!(
            result,
            Err(LoadError::Duplicate { kind: DefinitionKind::Node, name, .. }) if name == "web01"
        ));

        Ok(())
    }

    #[test]
    fn missing_directory_aborts_load() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        create_dir_all(dir.path().join("classes"))?;
        let settings = InventorySettings {
            path: dir.path().to_path_buf(),
            ..Default::default()
        };

        let result = Store::load(&settings);
        assert!(matches!(result, Err(LoadError::MissingDirectory { path }) if path.ends_with("nodes")));

        Ok(())
    }
}

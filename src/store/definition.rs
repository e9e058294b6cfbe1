// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Class and node definition layout.
//!
//! Every file in an inventory is a small YAML document following the reclass
//! convention:
//!
//! ```yaml
//! classes:
//!   - os.debian
//!   - .common
//! applications:
//!   - postgresql
//! parameters:
//!   postgresql:
//!     version: 16
//! ```
//!
//! All sections are optional, and an empty file is an empty definition. The
//! `classes` list may also be spelled `parents`.

use crate::value::{Mapping, Value};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Raw layout of a definition file.
#[derive(Default, Debug, PartialEq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefinitionFile {
    /// Parent classes in override priority order.
    #[serde(alias = "parents", deserialize_with = "null_as_default")]
    pub classes: Vec<String>,

    /// Informational application tags.
    #[serde(deserialize_with = "null_as_default")]
    pub applications: Vec<String>,

    /// Environment the definition belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Parameter tree.
    #[serde(deserialize_with = "parameter_mapping")]
    pub parameters: Mapping,
}

impl FromStr for DefinitionFile {
    type Err = serde_yaml::Error;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        // INVARIANT: An empty document is an empty definition.
        let is_blank = data.lines().map(str::trim).all(|line| {
            line.is_empty() || line.starts_with('#') || line == "---"
        });
        if is_blank {
            return Ok(Self::default());
        }

        match serde_yaml::from_str::<serde_yaml::Value>(data)? {
            serde_yaml::Value::Null => Ok(Self::default()),
            document => serde_yaml::from_value(document),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn parameter_mapping<'de, D>(deserializer: D) -> Result<Mapping, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Mapping::new()),
        Some(Value::Mapping(mapping)) => Ok(mapping),
        Some(other) => Err(D::Error::custom(format!(
            "parameters must be a mapping, found {}",
            other.kind()
        ))),
    }
}

/// Named, reusable bag of parameters and parent references.
#[derive(Default, Debug, PartialEq, Clone, Serialize)]
pub struct ClassDefinition {
    /// Dotted class name.
    pub name: String,

    /// Parent classes in override priority order.
    pub parents: Vec<String>,

    /// Parameter tree.
    pub parameters: Mapping,

    /// Informational application tags.
    pub applications: Vec<String>,

    /// File the class was loaded from.
    pub source: PathBuf,
}

impl ClassDefinition {
    /// Construct class from definition file contents.
    ///
    /// Relative parent references (leading `.`) are resolved against
    /// `namespace`.
    pub fn from_file(
        name: impl Into<String>,
        namespace: &str,
        file: DefinitionFile,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            parents: absolute_parents(namespace, file.classes),
            parameters: file.parameters,
            applications: file.applications,
            source: source.into(),
        }
    }
}

/// Single managed host.
#[derive(Default, Debug, PartialEq, Clone, Serialize)]
pub struct NodeDefinition {
    /// Node name, typically a hostname.
    pub name: String,

    /// Classes the node directly includes.
    pub parents: Vec<String>,

    /// Node-local parameter overrides.
    pub parameters: Mapping,

    /// Informational application tags.
    pub applications: Vec<String>,

    /// Environment of the node.
    pub environment: Option<String>,

    /// File the node was loaded from.
    pub source: PathBuf,
}

impl NodeDefinition {
    /// Construct node from definition file contents.
    ///
    /// Relative parent references resolve against the top-level namespace.
    pub fn from_file(name: impl Into<String>, file: DefinitionFile, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            parents: absolute_parents("", file.classes),
            parameters: file.parameters,
            applications: file.applications,
            environment: file.environment,
            source: source.into(),
        }
    }
}

fn absolute_parents(namespace: &str, parents: Vec<String>) -> Vec<String> {
    parents
        .into_iter()
        .map(|parent| match parent.strip_prefix('.') {
            Some(relative) if namespace.is_empty() => relative.to_owned(),
            Some(relative) => format!("{namespace}.{relative}"),
            None => parent,
        })
        .collect()
}

/// Kind of definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Class,
    Node,
}

impl Display for DefinitionKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Class => "class",
            Self::Node => "node",
        })
    }
}

/// Determine class name and namespace from file location.
///
/// The class name is the path relative to the classes directory with
/// separators replaced by dots and the extension removed. A file named
/// `init` stands for its directory. The namespace is the dotted directory
/// the file lives in, which is what relative parent references resolve
/// against.
///
/// Returns `None` if no name can be derived, e.g., a top-level `init.yml`.
pub fn class_name_from_path(classes_root: &Path, path: &Path) -> Option<(String, String)> {
    let relative = path.strip_prefix(classes_root).ok()?;
    let stem = relative.file_stem()?.to_str()?;
    let mut segments = relative
        .parent()
        .map(|dir| {
            dir.components()
                .map(|component| component.as_os_str().to_str().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
        })
        .unwrap_or(Some(Vec::new()))?;
    let namespace = segments.join(".");

    if stem != "init" {
        segments.push(stem.to_owned());
    }

    if segments.is_empty() {
        return None;
    }

    Some((segments.join("."), namespace))
}

/// Determine node name from file location.
///
/// Nodes may be grouped in sub-directories, but only the file stem names
/// the node.
pub fn node_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()?
        .to_str()
        .filter(|stem| !stem.is_empty())
        .map(str::to_owned)
}

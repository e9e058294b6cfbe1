// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Parameter value representation.
//!
//! Parameters in a class or node definition form a tree of loosely typed
//! data. Maestro represents that tree as a __tagged value__, i.e., every node
//! of the tree is exactly one of null, boolean, integer, float, string,
//! sequence, or mapping. Merge rules can then be written as an exhaustive
//! case analysis over variants.
//!
//! # Ordering
//!
//! Mappings are kept in a [`BTreeMap`], so iteration and serialization
//! always follow key order. Two resolutions over the same input therefore
//! produce byte-identical output.

use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Mapping from parameter key to value.
pub type Mapping = BTreeMap<String, Value>;

/// Single node of a parameter tree.
#[derive(Default, Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
#[serde(untagged, try_from = "serde_yaml::Value")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// Kind of value without its contents.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_)
            | Self::Integer(_)
            | Self::Unsigned(_)
            | Self::Float(_)
            | Self::String(_) => ValueKind::Scalar,
            Self::Sequence(_) => ValueKind::Sequence,
            Self::Mapping(_) => ValueKind::Mapping,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(string) => Some(string.as_str()),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    /// Walk down a path of mapping keys.
    ///
    /// Returns `None` as soon as a segment is missing, or the value at the
    /// current segment is not a mapping.
    pub fn pointer<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Option<&Value> {
        let mut current = self;
        for segment in segments {
            current = current.as_mapping()?.get(segment)?;
        }

        Some(current)
    }
}

impl From<&str> for Value {
    fn from(string: &str) -> Self {
        Self::String(string.to_owned())
    }
}

impl From<String> for Value {
    fn from(string: String) -> Self {
        Self::String(string)
    }
}

impl From<i64> for Value {
    fn from(integer: i64) -> Self {
        Self::Integer(integer)
    }
}

impl From<bool> for Value {
    fn from(boolean: bool) -> Self {
        Self::Bool(boolean)
    }
}

impl From<Mapping> for Value {
    fn from(mapping: Mapping) -> Self {
        Self::Mapping(mapping)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<serde_yaml::Value> for Value {
    type Error = ValueError;

    fn try_from(value: serde_yaml::Value) -> Result<Self> {
        use serde_yaml::Value as Yaml;

        Ok(match value {
            Yaml::Null => Self::Null,
            Yaml::Bool(boolean) => Self::Bool(boolean),
            Yaml::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    Self::Integer(integer)
                } else if let Some(unsigned) = number.as_u64() {
                    // INVARIANT: Only integers beyond i64::MAX land here.
                    Self::Unsigned(unsigned)
                } else {
                    Self::Float(number.as_f64().ok_or(ValueError::Number)?)
                }
            }
            Yaml::String(string) => Self::String(string),
            Yaml::Sequence(items) => Self::Sequence(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Yaml::Mapping(entries) => {
                let mut mapping = Mapping::new();
                for (key, value) in entries {
                    let key = mapping_key(key)?;
                    // INVARIANT: Keys must stay distinct once stringified, e.g., `1` and "1".
                    if mapping.contains_key(&key) {
                        return Err(ValueError::DuplicateKey(key));
                    }
                    mapping.insert(key, Self::try_from(value)?);
                }
                Self::Mapping(mapping)
            }
            Yaml::Tagged(tagged) => Self::try_from(tagged.value)?,
        })
    }
}

fn mapping_key(key: serde_yaml::Value) -> Result<String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(string) => Ok(string),
        Yaml::Number(number) => Ok(number.to_string()),
        Yaml::Bool(boolean) => Ok(boolean.to_string()),
        Yaml::Null => Ok("null".into()),
        Yaml::Tagged(tagged) => mapping_key(tagged.value),
        Yaml::Sequence(_) | Yaml::Mapping(_) => Err(ValueError::ComplexKey),
    }
}

/// Broad classification of a value used to detect merge conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Scalar,
    Sequence,
    Mapping,
}

impl Display for ValueKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Null => "null",
            Self::Scalar => "scalar",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
        })
    }
}

/// Parameter value conversion error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// Mapping key is a sequence or mapping.
    #[error("mapping keys must be scalars")]
    ComplexKey,

    /// Two scalar keys of one mapping turn into the same string key.
    #[error("mapping key {0:?} defined more than once")]
    DuplicateKey(String),

    /// Number cannot be represented.
    #[error("number cannot be represented as integer or float")]
    Number,
}

/// Friendly result alias :3
type Result<T, E = ValueError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserialize_nested_yaml() -> anyhow::Result<()> {
        let result: Value = serde_yaml::from_str(indoc! {r#"
            net:
              mtu: 1500
              dns: [1.1.1.1, 9.9.9.9]
            8080: open
            debug: ~
            ratio: 0.5
        "#})?;

        let mut net = Mapping::new();
        net.insert("mtu".into(), Value::Integer(1500));
        net.insert("dns".into(), vec!["1.1.1.1", "9.9.9.9"].into());
        let mut expect = Mapping::new();
        expect.insert("net".into(), Value::Mapping(net));
        expect.insert("8080".into(), "open".into());
        expect.insert("debug".into(), Value::Null);
        expect.insert("ratio".into(), Value::Float(0.5));

        assert_eq!(result, Value::Mapping(expect));

        Ok(())
    }

    #[test]
    fn reject_complex_mapping_key() {
        let result = serde_yaml::from_str::<Value>("? [a, b]\n: c\n");
        assert!(result.is_err());
    }

    #[test]
    fn reject_colliding_mapping_keys() -> anyhow::Result<()> {
        let result = serde_yaml::from_str::<Value>("1: first\n\"1\": second\n");
        assert!(result.is_err());

        let yaml: serde_yaml::Value = serde_yaml::from_str("net: {true: on, \"true\": off}")?;
        assert_eq!(
            Value::try_from(yaml),
            Err(ValueError::DuplicateKey("true".into()))
        );

        Ok(())
    }

    #[test]
    fn keep_large_unsigned_integers() -> anyhow::Result<()> {
        let value: Value = serde_yaml::from_str("id: 18446744073709551615")?;
        assert_eq!(
            value.pointer(["id"]),
            Some(&Value::Unsigned(u64::MAX))
        );
        assert_eq!(serde_json::to_string(&value)?, r#"{"id":18446744073709551615}"#);

        Ok(())
    }

    #[test]
    fn pointer_walks_mappings_only() -> anyhow::Result<()> {
        let value: Value = serde_yaml::from_str("service: {redis: {version: 7}}")?;

        assert_eq!(
            value.pointer(["service", "redis", "version"]),
            Some(&Value::Integer(7))
        );
        assert_eq!(value.pointer(["service", "redis", "version", "x"]), None);
        assert_eq!(value.pointer(["service", "postgres"]), None);

        Ok(())
    }

    #[test]
    fn serialize_in_key_order() -> anyhow::Result<()> {
        let value: Value = serde_yaml::from_str("zeta: 1\nalpha: 2\nmid: [true]\n")?;
        let result = serde_json::to_string(&value)?;
        assert_eq!(result, r#"{"alpha":2,"mid":[true],"zeta":1}"#);

        Ok(())
    }
}

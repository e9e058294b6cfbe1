// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Ansible dynamic inventory export.
//!
//! Ansible can consume any executable that prints a JSON inventory when
//! called with `--list`, and the variables of one host when called with
//! `--host <name>`. Maestro produces both documents from a resolved
//! inventory:
//!
//! ```json
//! {
//!   "_meta": { "hostvars": { "web01": { "nginx": { "port": 80 } } } },
//!   "all": { "hosts": ["web01"] },
//!   "role_web": { "hosts": ["web01"] }
//! }
//! ```
//!
//! Every class becomes a group of the nodes carrying it. Ansible group names
//! cannot contain dots, so every character outside `[A-Za-z0-9_]` is
//! replaced with an underscore.
//!
//! # See Also
//!
//! - [Ansible - Developing dynamic inventory](https://docs.ansible.com/ansible/latest/dev_guide/developing_inventory.html)

use crate::{
    config::AnsibleSettings,
    inventory::InventoryReport,
    resolve::ResolvedNode,
    value::Mapping,
};

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

const RESERVED_GROUPS: [&str; 3] = ["all", "ungrouped", "_meta"];

/// Ansible `--list` document.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DynamicInventory {
    #[serde(rename = "_meta")]
    pub meta: Meta,

    #[serde(flatten)]
    pub groups: BTreeMap<String, Group>,
}

/// Per-host variables of a dynamic inventory.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Meta {
    pub hostvars: BTreeMap<String, Mapping>,
}

/// Ansible host group.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Group {
    pub hosts: BTreeSet<String>,
}

impl DynamicInventory {
    /// Build `--list` document from resolved inventory.
    pub fn from_report(report: &InventoryReport, settings: &AnsibleSettings) -> Self {
        let mut inventory = Self::default();
        for (name, node) in &report.nodes {
            inventory
                .meta
                .hostvars
                .insert(name.clone(), node.parameters.clone());
        }

        for (class, nodes) in report.groups() {
            let group = group_name(&settings.group_prefix, &class);
            if RESERVED_GROUPS.contains(&group.as_str()) {
                warn!("class {class:?} maps to reserved ansible group {group:?}, skipping");
                continue;
            }

            // INVARIANT: Classes mapping to the same group share it.
            inventory
                .groups
                .entry(group)
                .or_default()
                .hosts
                .extend(nodes);
        }

        let all = Group {
            hosts: report.nodes.keys().cloned().collect(),
        };
        inventory.groups.insert("all".into(), all);

        inventory
    }

    /// Serialize as pretty JSON.
    ///
    /// # Errors
    ///
    /// - Return [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Build `--host` document of a resolved node.
pub fn host_vars(node: &ResolvedNode) -> &Mapping {
    &node.parameters
}

/// Turn class name into valid Ansible group name.
pub fn group_name(prefix: &str, class: &str) -> String {
    prefix
        .chars()
        .chain(class.chars())
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

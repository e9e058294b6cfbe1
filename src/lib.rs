// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hierarchical inventory resolution.
//!
//! Maestro describes managed hosts (__nodes__) and reusable bags of settings
//! (__classes__) once, hierarchically, as YAML files on disk. Classes inherit
//! from other classes, and nodes include classes. Resolving a node
//! linearizes its class ancestry, and deep merges the parameters of every
//! ancestor in that order, so later ancestors and finally the node itself
//! override what they inherit.
//!
//! The pieces, leaves first:
//!
//! - [`value`]: parameter value model.
//! - [`store`]: loads class and node definitions into an immutable store.
//! - [`resolve`]: ancestry linearization and parameter merging.
//! - [`inventory`]: single-node queries, and concurrent whole-inventory
//!   resolution.
//! - [`search`]: wildcard parameter search and node filters.
//! - [`ansible`]: Ansible dynamic inventory export.
//! - [`config`]: settings layout.

pub mod ansible;
pub mod config;
pub mod inventory;
pub mod path;
pub mod resolve;
pub mod search;
pub mod store;
pub mod value;

pub use inventory::{Inventory, InventoryReport, ResolveBudget};
pub use resolve::{ResolveError, ResolvedNode, Resolver};
pub use store::{LoadError, Store};

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Inventory queries.
//!
//! An [`Inventory`] pairs a loaded class store with the resolver configured
//! by [`Settings`]. It answers single-node queries directly, and resolves
//! whole inventories concurrently into an [`InventoryReport`] that search,
//! grouping, and filtering operate on.
//!
//! # Snapshots
//!
//! The store is held behind an atomic pointer. Every resolution grabs the
//! current store once and works on that snapshot until it finishes, so a
//! [`Inventory::reload`] never changes results already in flight.

use crate::{
    config::{ResolveSettings, Settings},
    resolve::{merge::MergeWarning, ResolveError, ResolvedNode, Resolver},
    search::{NodeFilter, ParameterMatch, ParameterPattern},
    store::{LoadError, Store},
    value::Value,
};

use arc_swap::ArcSwap;
use futures::{stream, StreamExt};
use std::{collections::BTreeMap, panic::resume_unwind, sync::Arc, time::Duration};
use tokio::{task::spawn_blocking, time::Instant};
use tracing::{debug, info, instrument, warn};

/// Resolver bound to a swappable class store.
#[derive(Debug)]
pub struct Inventory {
    settings: Settings,
    resolver: Resolver,
    store: ArcSwap<Store>,
}

impl Inventory {
    /// Load inventory following settings.
    ///
    /// # Errors
    ///
    /// - Return [`LoadError`] if class store cannot be loaded.
    #[instrument(skip(settings), level = "debug")]
    pub fn load(settings: Settings) -> Result<Self, LoadError> {
        let store = Store::load(&settings.inventory)?;
        Ok(Self::from_store(store, settings))
    }

    /// Construct inventory from already loaded store.
    pub fn from_store(store: Store, settings: Settings) -> Self {
        Self {
            resolver: Resolver::from_settings(&settings.merge),
            store: ArcSwap::from_pointee(store),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current store snapshot.
    pub fn snapshot(&self) -> Arc<Store> {
        self.store.load_full()
    }

    /// Reload class store from disk, and swap it in.
    ///
    /// Resolutions already running keep the store they started with. The
    /// current store stays in place if loading fails.
    ///
    /// # Errors
    ///
    /// - Return [`LoadError`] if class store cannot be loaded.
    #[instrument(skip(self), level = "debug")]
    pub fn reload(&self) -> Result<(), LoadError> {
        let store = Store::load(&self.settings.inventory)?;
        self.store.store(Arc::new(store));
        info!("reloaded inventory {:?}", self.settings.inventory.path.display());

        Ok(())
    }

    /// Resolve a single node.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError`] if node is unknown, or its ancestry is
    ///   broken.
    pub fn resolve_node(&self, name: &str) -> Result<ResolvedNode, ResolveError> {
        self.resolver.resolve_node(&self.snapshot(), name)
    }

    /// Resolve a single class as if it were a node.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError`] if class is unknown, or its ancestry is
    ///   broken.
    pub fn resolve_class(&self, name: &str) -> Result<ResolvedNode, ResolveError> {
        self.resolver.resolve_class(&self.snapshot(), name)
    }

    /// Resolve every node within the configured budget.
    pub async fn resolve_all(&self) -> InventoryReport {
        self.resolve_all_with(ResolveBudget::from_settings(&self.settings.resolve))
            .await
    }

    /// Resolve every node within a budget.
    ///
    /// Nodes resolve in parallel on the blocking thread pool. A node that
    /// fails to resolve is recorded in [`InventoryReport::errors`] without
    /// affecting any other node. Once the budget runs out no more nodes get
    /// submitted, and the rest are listed in [`InventoryReport::skipped`].
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve_all_with(&self, budget: ResolveBudget) -> InventoryReport {
        let store = self.snapshot();
        let deadline = budget.timeout.map(|timeout| Instant::now() + timeout);
        let mut names = store.node_names().map(str::to_owned).collect::<Vec<_>>();
        let mut report = InventoryReport::default();

        if let Some(max_nodes) = budget.max_nodes {
            if max_nodes < names.len() {
                report.skipped = names.split_off(max_nodes);
            }
        }

        let expired = move || deadline.is_some_and(|deadline| Instant::now() >= deadline);
        self.resolve_until(store, names, budget.jobs, expired, &mut report)
            .await;

        report.skipped.sort();
        info!(
            "resolved {} nodes, {} failed, {} skipped",
            report.nodes.len(),
            report.errors.len(),
            report.skipped.len()
        );

        report
    }

    /// Resolve nodes on the blocking pool until `expired` says stop.
    ///
    /// The check runs right before each node would be submitted.
    async fn resolve_until(
        &self,
        store: Arc<Store>,
        names: Vec<String>,
        jobs: usize,
        expired: impl Fn() -> bool + Clone,
        report: &mut InventoryReport,
    ) {
        let mut outcomes = stream::iter(names)
            .map(|name| {
                let store = Arc::clone(&store);
                let resolver = self.resolver.clone();
                let expired = expired.clone();
                async move {
                    // INVARIANT: Nothing gets submitted once the budget is spent.
                    if expired() {
                        return (name, None);
                    }

                    let node = name.clone();
                    let result = spawn_blocking(move || resolver.resolve_node(&store, &node)).await;
                    (name, Some(result))
                }
            })
            .buffer_unordered(jobs.max(1));

        while let Some((name, outcome)) = outcomes.next().await {
            match outcome {
                Some(Ok(Ok(resolved))) => {
                    report.nodes.insert(name, resolved);
                }
                Some(Ok(Err(error))) => {
                    warn!("failed to resolve node {name:?}: {error}");
                    report.errors.insert(name, error);
                }
                Some(Err(error)) if error.is_panic() => resume_unwind(error.into_panic()),
                Some(Err(_)) | None => {
                    debug!("skip node {name:?}");
                    report.skipped.push(name);
                }
            }
        }
    }

    /// Resolve every node, and search their parameters.
    ///
    /// Nodes that fail to resolve are logged and left out.
    pub async fn search_parameter(&self, pattern: &ParameterPattern) -> BTreeMap<String, Value> {
        self.resolve_all().await.search_parameter(pattern)
    }
}

/// Limits on a whole-inventory resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveBudget {
    /// Maximum nodes resolving at once.
    pub jobs: usize,

    /// Resolve only the first nodes in name order.
    pub max_nodes: Option<usize>,

    /// Stop submitting nodes after this much time.
    pub timeout: Option<Duration>,
}

impl ResolveBudget {
    pub fn from_settings(settings: &ResolveSettings) -> Self {
        Self {
            jobs: settings.jobs,
            max_nodes: None,
            timeout: settings.timeout(),
        }
    }
}

impl Default for ResolveBudget {
    fn default() -> Self {
        Self::from_settings(&ResolveSettings::default())
    }
}

/// Outcome of resolving a whole inventory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InventoryReport {
    /// Successfully resolved nodes.
    pub nodes: BTreeMap<String, ResolvedNode>,

    /// Nodes that failed to resolve.
    pub errors: BTreeMap<String, ResolveError>,

    /// Nodes never resolved because the budget ran out.
    pub skipped: Vec<String>,
}

impl InventoryReport {
    /// Check if every node resolved.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.skipped.is_empty()
    }

    /// Value of parameter per node.
    ///
    /// Nodes without a matching parameter are left out. If a pattern matches
    /// more than one parameter of a node, the first match in key order is
    /// taken.
    pub fn search_parameter(&self, pattern: &ParameterPattern) -> BTreeMap<String, Value> {
        self.nodes
            .iter()
            .filter_map(|(name, node)| {
                pattern
                    .first_in(&node.parameters)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    /// Every parameter matching pattern in every node.
    pub fn search_matches(&self, pattern: &ParameterPattern) -> Vec<ParameterMatch> {
        self.nodes
            .iter()
            .flat_map(|(name, node)| {
                pattern
                    .matches_in(&node.parameters)
                    .into_iter()
                    .map(|(path, value)| ParameterMatch {
                        node: name.clone(),
                        path,
                        value: value.clone(),
                    })
            })
            .collect()
    }

    /// Nodes grouped by the classes they carry.
    pub fn groups(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, node) in &self.nodes {
            for class in node.classes() {
                groups.entry(class.clone()).or_default().push(name.clone());
            }
        }

        groups
    }

    /// Names of nodes carrying class.
    pub fn nodes_with_class(&self, class: &str) -> Vec<&str> {
        self.nodes
            .values()
            .filter(|node| node.has_class(class))
            .map(|node| node.name.as_str())
            .collect()
    }

    /// Resolved nodes passing filter.
    pub fn filter(&self, filter: &NodeFilter) -> Vec<&ResolvedNode> {
        self.nodes.values().filter(|node| filter.matches(node)).collect()
    }

    /// Every merge warning along with its node.
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &MergeWarning)> {
        self.nodes.iter().flat_map(|(name, node)| {
            node.warnings
                .iter()
                .map(move |warning| (name.as_str(), warning))
        })
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use maestro::{
    ansible::{host_vars, DynamicInventory},
    config::{ConfigError, Settings},
    path::{default_inventory_dir, default_settings_path},
    search::{NodeFilter, ParameterPattern},
    Inventory,
};

use anyhow::{bail, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "maestro [options] <maestro-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Path to inventory directory, overriding settings.
    #[arg(short, long, global = true, value_name = "path")]
    pub inventory: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Yaml)]
    pub format: Format,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = load_settings(self.config.as_deref(), self.inventory)?;
        let format = self.format;
        match self.command {
            Command::Node(opts) => run_node(settings, format, opts),
            Command::Class(opts) => run_class(settings, format, opts),
            Command::Inventory => run_inventory(settings, format).await,
            Command::Nodes(opts) => run_nodes(settings, opts).await,
            Command::Classes => run_classes(settings),
            Command::Search(opts) => run_search(settings, format, opts).await,
            Command::Ansible(opts) => run_ansible(settings, opts).await,
            Command::Lint => run_lint(settings).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show fully resolved node.
    #[command(override_usage = "maestro node [options] <node_name>")]
    Node(NodeOptions),

    /// Show class resolved on its own.
    #[command(override_usage = "maestro class [options] <class_name>")]
    Class(ClassOptions),

    /// Show every resolved node.
    Inventory,

    /// List nodes.
    #[command(override_usage = "maestro nodes [options]")]
    Nodes(NodesOptions),

    /// List classes.
    Classes,

    /// Search parameter across every node.
    #[command(override_usage = "maestro search [options] <pattern>")]
    Search(SearchOptions),

    /// Act as Ansible dynamic inventory script.
    #[command(override_usage = "maestro ansible (--list | --host <node_name>)")]
    Ansible(AnsibleOptions),

    /// Check that every node resolves cleanly.
    Lint,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NodeOptions {
    /// Name of node to resolve.
    #[arg(required = true, value_name = "node_name")]
    pub node_name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ClassOptions {
    /// Name of class to resolve.
    #[arg(required = true, value_name = "class_name")]
    pub class_name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NodesOptions {
    /// Only list nodes whose name matches glob pattern.
    #[arg(long, value_name = "pattern")]
    pub node_filter: Option<String>,

    /// Only list nodes carrying class.
    #[arg(long, value_name = "class_name")]
    pub class_filter: Option<String>,

    /// Only list nodes of project.
    #[arg(long, value_name = "project")]
    pub project_filter: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SearchOptions {
    /// Dotted parameter path, where `*` matches one segment.
    #[arg(required = true, value_name = "pattern")]
    pub pattern: String,

    /// Show every matching path instead of the first per node.
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about, group(ArgGroup::new("mode").required(true)))]
struct AnsibleOptions {
    /// Print whole dynamic inventory.
    #[arg(long, group = "mode")]
    pub list: bool,

    /// Print variables of one host.
    #[arg(long, group = "mode", value_name = "node_name")]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

/// Read settings, falling back to defaults if no settings file exists.
///
/// An explicitly requested settings file must exist.
fn load_settings(config: Option<&Path>, inventory: Option<PathBuf>) -> Result<Settings> {
    let (path, required) = match config {
        Some(path) => (path.to_path_buf(), true),
        None => (default_settings_path()?, false),
    };

    let mut settings = match read_to_string(&path) {
        Ok(data) => data.parse::<Settings>()?,
        Err(err) if err.kind() == ErrorKind::NotFound && !required => {
            let mut settings = Settings::default();
            if !settings.inventory.path.is_dir() {
                settings.inventory.path = default_inventory_dir()?;
            }
            settings
        }
        Err(err) => return Err(ConfigError::Read { source: err, path }.into()),
    };

    if let Some(inventory) = inventory {
        settings.inventory.path = inventory;
    }

    Ok(settings)
}

fn emit(format: Format, value: &impl Serialize) -> Result<()> {
    let output = match format {
        Format::Yaml => serde_yaml::to_string(value)?,
        Format::Json => serde_json::to_string_pretty(value)? + "\n",
    };
    print!("{output}");

    Ok(())
}

fn run_node(settings: Settings, format: Format, opts: NodeOptions) -> Result<()> {
    let inventory = Inventory::load(settings)?;
    let node = inventory.resolve_node(&opts.node_name)?;
    emit(format, &node)
}

fn run_class(settings: Settings, format: Format, opts: ClassOptions) -> Result<()> {
    let inventory = Inventory::load(settings)?;
    let class = inventory.resolve_class(&opts.class_name)?;
    emit(format, &class)
}

async fn run_inventory(settings: Settings, format: Format) -> Result<()> {
    let inventory = Inventory::load(settings)?;
    let report = inventory.resolve_all().await;
    emit(format, &report.nodes)?;

    if !report.is_complete() {
        bail!(
            "{} nodes failed to resolve, {} skipped",
            report.errors.len(),
            report.skipped.len()
        );
    }

    Ok(())
}

async fn run_nodes(settings: Settings, opts: NodesOptions) -> Result<()> {
    let inventory = Inventory::load(settings)?;
    let is_filtered =
        opts.node_filter.is_some() || opts.class_filter.is_some() || opts.project_filter.is_some();
    if !is_filtered {
        for name in inventory.snapshot().node_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let mut filter = NodeFilter::new();
    if let Some(pattern) = opts.node_filter {
        filter = filter.with_node_pattern(&pattern)?;
    }
    if let Some(class) = opts.class_filter {
        filter = filter.with_class(class);
    }
    if let Some(project) = opts.project_filter {
        filter = filter.with_project(project);
    }

    let report = inventory.resolve_all().await;
    for (name, error) in &report.errors {
        warn!("cannot filter node {name:?}: {error}");
    }
    for node in report.filter(&filter) {
        println!("{}", node.name);
    }

    Ok(())
}

fn run_classes(settings: Settings) -> Result<()> {
    let inventory = Inventory::load(settings)?;
    for name in inventory.snapshot().class_names() {
        println!("{name}");
    }

    Ok(())
}

async fn run_search(settings: Settings, format: Format, opts: SearchOptions) -> Result<()> {
    let pattern: ParameterPattern = opts.pattern.parse()?;
    let inventory = Inventory::load(settings)?;
    let report = inventory.resolve_all().await;
    for (name, error) in &report.errors {
        warn!("cannot search node {name:?}: {error}");
    }

    if opts.all {
        let mut found: BTreeMap<String, BTreeMap<String, _>> = BTreeMap::new();
        for matched in report.search_matches(&pattern) {
            found
                .entry(matched.node)
                .or_default()
                .insert(matched.path, matched.value);
        }
        emit(format, &found)
    } else {
        emit(format, &report.search_parameter(&pattern))
    }
}

async fn run_ansible(settings: Settings, opts: AnsibleOptions) -> Result<()> {
    let ansible = settings.ansible.clone();
    let inventory = Inventory::load(settings)?;

    if let Some(host) = opts.host {
        let node = inventory.resolve_node(&host)?;
        println!("{}", serde_json::to_string_pretty(host_vars(&node))?);
        return Ok(());
    }

    let report = inventory.resolve_all().await;
    for (name, error) in &report.errors {
        warn!("leave node {name:?} out of ansible inventory: {error}");
    }
    println!("{}", DynamicInventory::from_report(&report, &ansible).to_json()?);

    Ok(())
}

async fn run_lint(settings: Settings) -> Result<()> {
    let strict = settings.merge.strict;
    let inventory = Inventory::load(settings)?;
    if inventory.snapshot().node_names().next().is_none() {
        bail!(
            "no nodes in inventory {:?}",
            inventory.settings().inventory.nodes_path().display()
        );
    }

    let report = inventory.resolve_all().await;
    for (name, error) in &report.errors {
        error!("node {name:?}: {error}");
    }
    for name in &report.skipped {
        warn!("node {name:?} skipped");
    }

    let mut warnings = 0;
    for (name, warning) in report.warnings() {
        warn!("node {name:?}: {warning}");
        warnings += 1;
    }

    if !report.is_complete() {
        bail!(
            "{} nodes failed to resolve, {} skipped",
            report.errors.len(),
            report.skipped.len()
        );
    }

    if strict && warnings > 0 {
        bail!("{warnings} merge warnings in strict mode");
    }

    info!("inventory is clean");

    Ok(())
}

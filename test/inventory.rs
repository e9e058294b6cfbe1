// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::InventoryFixture;

use anyhow::Result;
use indoc::indoc;
use maestro::{
    ansible::DynamicInventory,
    config::AnsibleSettings,
    search::{NodeFilter, ParameterPattern},
    value::Value,
    Inventory, LoadError, ResolveBudget, ResolveError,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

fn web_inventory() -> Result<InventoryFixture> {
    InventoryFixture::new()?
        .with_class(
            "base",
            indoc! {"
                applications: [ntp]
                parameters:
                  motd: managed by maestro
                  packages: [curl, git]
                  net:
                    dns: [1.1.1.1]
                    mtu: 1500
            "},
        )?
        .with_class(
            "role.web",
            indoc! {"
                classes: [base]
                applications: [nginx]
                parameters:
                  packages: [+nginx]
                  app:
                    web:
                      port: 80
            "},
        )?
        .with_class(
            "role.db",
            indoc! {"
                classes: [base]
                parameters:
                  packages: [postgresql]
                  app:
                    db:
                      port: 5432
            "},
        )?
        .with_node(
            "web01",
            indoc! {"
                classes: [role.web]
                environment: production
                parameters:
                  project: shop
                  net:
                    mtu: 9000
            "},
        )?
        .with_node(
            "db01",
            indoc! {"
                classes: [role.db]
                parameters:
                  project: shop
            "},
        )
}

#[test]
fn resolve_node_from_disk() -> Result<()> {
    let fixture = web_inventory()?;
    let inventory = Inventory::load(fixture.settings())?;

    let node = inventory.resolve_node("web01")?;
    assert_eq!(node.ancestry, vec!["base", "role.web", "web01"]);
    assert_eq!(node.applications, vec!["ntp", "nginx"]);
    assert_eq!(node.environment.as_deref(), Some("production"));

    let expect = indoc! {"
        app:
          web:
            port: 80
        motd: managed by maestro
        net:
          dns:
          - 1.1.1.1
          mtu: 9000
        packages:
        - curl
        - git
        - nginx
        project: shop
    "};
    assert_eq!(serde_yaml::to_string(&node.parameters)?, expect);

    Ok(())
}

#[test]
fn sequence_without_marker_replaces() -> Result<()> {
    let fixture = web_inventory()?;
    let inventory = Inventory::load(fixture.settings())?;

    let node = inventory.resolve_node("db01")?;
    assert_eq!(
        node.parameter("packages"),
        Some(&Value::Sequence(vec!["postgresql".into()]))
    );

    Ok(())
}

#[test]
fn init_file_and_relative_parents() -> Result<()> {
    let fixture = InventoryFixture::new()?
        .with_class("service.redis.common", "parameters: {redis: {bind: 127.0.0.1}}")?
        .with_class(
            "service.redis.init",
            "classes: [.common]\nparameters: {redis: {port: 6379}}",
        )?
        .with_node("cache01", "classes: [service.redis]")?;
    let inventory = Inventory::load(fixture.settings())?;

    let node = inventory.resolve_node("cache01")?;
    assert_eq!(
        node.ancestry,
        vec!["service.redis.common", "service.redis", "cache01"]
    );
    assert_eq!(node.parameter("redis.port"), Some(&Value::Integer(6379)));
    assert_eq!(node.parameter("redis.bind"), Some(&Value::from("127.0.0.1")));

    Ok(())
}

#[test]
fn nodes_in_sub_directories() -> Result<()> {
    let fixture = web_inventory()?;
    fixture.write("nodes/eu/edge01.yaml", "classes: [role.web]")?;
    let inventory = Inventory::load(fixture.settings())?;

    assert_eq!(
        inventory.snapshot().node_names().collect::<Vec<_>>(),
        vec!["db01", "edge01", "web01"]
    );

    Ok(())
}

#[test]
fn hidden_and_foreign_files_ignored() -> Result<()> {
    let fixture = web_inventory()?;
    fixture.write("nodes/.draft.yml", "classes: [ghost]")?;
    fixture.write("nodes/README.md", "# not a node")?;
    let inventory = Inventory::load(fixture.settings())?;

    assert_eq!(inventory.snapshot().node_names().count(), 2);

    Ok(())
}

#[test]
fn malformed_file_fails_whole_load() -> Result<()> {
    let fixture = web_inventory()?;
    fixture.write("classes/broken.yml", "classes: [base\nparameters: {}")?;

    let result = Inventory::load(fixture.settings());
    assert!(matches!(
        result,
        Err(LoadError::Parse { path, .. }) if path.ends_with("broken.yml")
    ));

    Ok(())
}

#[test]
fn duplicate_class_fails_whole_load() -> Result<()> {
    let fixture = web_inventory()?;
    fixture.write("classes/role/web/init.yml", "parameters: {}")?;

    let result = Inventory::load(fixture.settings());
    assert!(matches!(
        result,
        Err(LoadError::Duplicate { name, .. }) if name == "role.web"
    ));

    Ok(())
}

#[tokio::test]
async fn broken_nodes_do_not_affect_others() -> Result<()> {
    let fixture = web_inventory()?
        .with_class("loop.x", "classes: [loop.y]")?
        .with_class("loop.y", "classes: [loop.x]")?
        .with_node("spin01", "classes: [loop.x]")?
        .with_node("lost01", "classes: [role.ghost]")?;
    let inventory = Inventory::load(fixture.settings())?;

    let report = inventory.resolve_all().await;
    assert_eq!(
        report.nodes.keys().collect::<Vec<_>>(),
        vec!["db01", "web01"]
    );
    assert_eq!(
        report.errors.get("spin01"),
        Some(&ResolveError::Cycle {
            cycle: vec!["loop.x".into(), "loop.y".into(), "loop.x".into()]
        })
    );
    assert!(matches!(
        report.errors.get("lost01"),
        Some(ResolveError::UnresolvedReference { referrer, missing, file, .. })
            if referrer == "lost01" && missing == "role.ghost" && file.ends_with("lost01.yml")
    ));

    Ok(())
}

#[tokio::test]
async fn search_parameter_with_wildcard() -> Result<()> {
    let fixture = InventoryFixture::new()?
        .with_class("app.a", "parameters: {app: {a: {port: 6}}}")?
        .with_class("app.b", "parameters: {app: {b: {port: 7}}}")?
        .with_node("n1", "classes: [app.a]")?
        .with_node("n2", "classes: [app.b]")?
        .with_node("n3", "parameters: {app: {port: 8}}")?;
    let inventory = Inventory::load(fixture.settings())?;

    let pattern: ParameterPattern = "app.*.port".parse()?;
    let expect = BTreeMap::from([
        ("n1".to_string(), Value::Integer(6)),
        ("n2".to_string(), Value::Integer(7)),
    ]);
    assert_eq!(inventory.search_parameter(&pattern).await, expect);

    Ok(())
}

#[tokio::test]
async fn filter_resolved_nodes() -> Result<()> {
    let fixture = web_inventory()?.with_node("blog01", "classes: [role.web]\nparameters: {project: blog}")?;
    let inventory = Inventory::load(fixture.settings())?;
    let report = inventory.resolve_all().await;

    let names = |filter: &NodeFilter| {
        report
            .filter(filter)
            .into_iter()
            .map(|node| node.name.clone())
            .collect::<Vec<_>>()
    };

    assert_eq!(names(&NodeFilter::new().with_class("role.web")), vec!["blog01", "web01"]);
    assert_eq!(names(&NodeFilter::new().with_project("shop")), vec!["db01", "web01"]);
    assert_eq!(
        names(&NodeFilter::new().with_node_pattern("*01")?.with_project("blog")),
        vec!["blog01"]
    );

    Ok(())
}

#[tokio::test]
async fn budget_limits_node_count() -> Result<()> {
    let fixture = web_inventory()?;
    let inventory = Inventory::load(fixture.settings())?;

    let budget = ResolveBudget {
        jobs: 4,
        max_nodes: Some(1),
        timeout: None,
    };
    let report = inventory.resolve_all_with(budget).await;
    assert_eq!(report.nodes.keys().collect::<Vec<_>>(), vec!["db01"]);
    assert_eq!(report.skipped, vec!["web01"]);

    Ok(())
}

#[tokio::test]
async fn reload_keeps_old_snapshot() -> Result<()> {
    let fixture = web_inventory()?;
    let inventory = Inventory::load(fixture.settings())?;
    let before = inventory.snapshot();

    fixture.remove("nodes/db01.yml")?;
    fixture.write("nodes/web02.yml", "classes: [role.web]")?;
    inventory.reload()?;

    assert_eq!(before.node_names().collect::<Vec<_>>(), vec!["db01", "web01"]);
    assert_eq!(
        inventory.snapshot().node_names().collect::<Vec<_>>(),
        vec!["web01", "web02"]
    );

    let report = inventory.resolve_all().await;
    assert_eq!(report.nodes.keys().collect::<Vec<_>>(), vec!["web01", "web02"]);

    Ok(())
}

#[test]
fn failed_reload_keeps_current_store() -> Result<()> {
    let fixture = web_inventory()?;
    let inventory = Inventory::load(fixture.settings())?;

    fixture.write("nodes/bad.yml", "parameters: [not, a, mapping]")?;
    assert!(inventory.reload().is_err());
    assert_eq!(inventory.snapshot().node_names().count(), 2);

    Ok(())
}

#[tokio::test]
async fn export_ansible_inventory() -> Result<()> {
    let fixture = web_inventory()?;
    let inventory = Inventory::load(fixture.settings())?;
    let report = inventory.resolve_all().await;

    let settings = AnsibleSettings {
        group_prefix: "mae_".into(),
    };
    let export = DynamicInventory::from_report(&report, &settings);

    assert_eq!(
        export.groups.keys().collect::<Vec<_>>(),
        vec!["all", "mae_base", "mae_role_db", "mae_role_web"]
    );
    assert_eq!(
        export.groups["mae_base"].hosts.iter().collect::<Vec<_>>(),
        vec!["db01", "web01"]
    );
    assert_eq!(
        export.meta.hostvars["web01"].get("project"),
        Some(&Value::from("shop"))
    );

    Ok(())
}

//! Service discovery against real directory trees.

use drift_mcp::resolver::{DiscoveryOptions, ResolveError, ServiceResolver};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &Path, body: &str) {
    let tusk = dir.join(".tusk");
    fs::create_dir_all(&tusk).unwrap();
    fs::write(tusk.join("config.yaml"), body).unwrap();
}

fn service_yaml(id: &str, name: &str) -> String {
    format!("service:\n  id: {id}\n  name: {name}\n")
}

async fn discover(root: &Path, options: DiscoveryOptions) -> ServiceResolver {
    let resolver = ServiceResolver::new(None, options);
    resolver.discover(&[root.to_path_buf()]).await;
    resolver
}

#[tokio::test]
async fn empty_tree_resolves_to_error() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("src/lib")).unwrap();

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    assert!(resolver.services().is_empty());
    assert!(matches!(resolver.resolve_service_id(None), Err(ResolveError::NoService)));
}

#[tokio::test]
async fn single_config_is_used() {
    let tmp = TempDir::new().unwrap();
    write_config(&tmp.path().join("api"), &service_yaml("svc1", "api"));

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    assert_eq!(resolver.resolve_service_id(None).unwrap(), "svc1");

    let services = resolver.services();
    assert_eq!(services[0].name, "api");
    assert!(services[0].config_path.ends_with(".tusk/config.yaml"));
}

#[tokio::test]
async fn name_defaults_to_directory() {
    let tmp = TempDir::new().unwrap();
    write_config(&tmp.path().join("billing"), "service:\n  id: svc-b\n");

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    assert_eq!(resolver.services()[0].name, "billing");
}

#[tokio::test]
async fn two_configs_are_ambiguous() {
    let tmp = TempDir::new().unwrap();
    write_config(&tmp.path().join("a"), &service_yaml("id-a", "alpha"));
    write_config(&tmp.path().join("b"), &service_yaml("id-b", "beta"));

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    let text = resolver.resolve_service_id(None).unwrap_err().to_string();
    assert!(text.contains("id-a"));
    assert!(text.contains("id-b"));

    assert_eq!(resolver.resolve_service_id(Some("explicit")).unwrap(), "explicit");
}

#[tokio::test]
async fn first_match_stops_descent() {
    let tmp = TempDir::new().unwrap();
    let outer = tmp.path().join("a");
    write_config(&outer, &service_yaml("outer", "outer"));
    write_config(&outer.join("b"), &service_yaml("inner", "inner"));

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    let ids: Vec<_> = resolver.services().iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, vec!["outer".to_string()]);

    let exhaustive = DiscoveryOptions {
        stop_at_match: false,
        ..DiscoveryOptions::default()
    };
    let resolver = discover(tmp.path(), exhaustive).await;
    assert_eq!(resolver.services().len(), 2);
}

#[tokio::test]
async fn hidden_and_dependency_dirs_are_skipped() {
    let tmp = TempDir::new().unwrap();
    write_config(&tmp.path().join("node_modules/pkg"), &service_yaml("dep", "dep"));
    write_config(&tmp.path().join(".cache/thing"), &service_yaml("hidden", "hidden"));
    write_config(&tmp.path().join("target/debug"), &service_yaml("build", "build"));
    write_config(&tmp.path().join("app"), &service_yaml("real", "app"));

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    assert_eq!(resolver.resolve_service_id(None).unwrap(), "real");
}

#[tokio::test]
async fn depth_limit_is_inclusive() {
    let tmp = TempDir::new().unwrap();
    write_config(&tmp.path().join("l1/l2/l3"), &service_yaml("depth3", "d3"));
    write_config(&tmp.path().join("m1/m2/m3/m4"), &service_yaml("depth4", "d4"));

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    let ids: Vec<_> = resolver.services().iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, vec!["depth3".to_string()]);

    let deeper = DiscoveryOptions {
        max_depth: 4,
        ..DiscoveryOptions::default()
    };
    assert_eq!(discover(tmp.path(), deeper).await.services().len(), 2);
}

#[tokio::test]
async fn config_at_root_counts() {
    let tmp = TempDir::new().unwrap();
    write_config(tmp.path(), &service_yaml("root-svc", "root"));
    write_config(&tmp.path().join("nested"), &service_yaml("nested", "nested"));

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    assert_eq!(resolver.resolve_service_id(None).unwrap(), "root-svc");
}

#[tokio::test]
async fn missing_root_does_not_abort_others() {
    let tmp = TempDir::new().unwrap();
    write_config(&tmp.path().join("svc"), &service_yaml("ok", "ok"));

    let resolver = ServiceResolver::new(None, DiscoveryOptions::default());
    let count = resolver
        .discover(&[PathBuf::from("/no/such/workspace"), tmp.path().to_path_buf()])
        .await;
    assert_eq!(count, 1);
}

#[tokio::test]
async fn overlapping_roots_do_not_duplicate() {
    let tmp = TempDir::new().unwrap();
    write_config(&tmp.path().join("svc"), &service_yaml("once", "once"));

    let resolver = ServiceResolver::new(None, DiscoveryOptions::default());
    resolver
        .discover(&[tmp.path().to_path_buf(), tmp.path().join("svc")])
        .await;
    assert_eq!(resolver.services().len(), 1);
}

#[tokio::test]
async fn rediscovery_replaces_list() {
    let tmp = TempDir::new().unwrap();
    write_config(&tmp.path().join("a"), &service_yaml("first", "a"));

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    assert_eq!(resolver.services().len(), 1);

    fs::remove_dir_all(tmp.path().join("a")).unwrap();
    resolver.discover(&[tmp.path().to_path_buf()]).await;
    assert!(resolver.services().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_loop_terminates() {
    let tmp = TempDir::new().unwrap();
    let inner = tmp.path().join("a");
    fs::create_dir_all(&inner).unwrap();
    std::os::unix::fs::symlink(tmp.path(), inner.join("loop")).unwrap();
    write_config(&tmp.path().join("svc"), &service_yaml("looped", "svc"));

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    assert_eq!(resolver.services().len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_at_depth_limit_does_not_hide_real_tree() {
    let tmp = TempDir::new().unwrap();
    let deep = tmp.path().join("a").join("b");
    fs::create_dir_all(&deep).unwrap();
    write_config(&tmp.path().join("svcs").join("x"), &service_yaml("behind-link", "x"));
    std::os::unix::fs::symlink(tmp.path().join("svcs"), deep.join("link")).unwrap();

    let resolver = discover(tmp.path(), DiscoveryOptions::default()).await;
    let services = resolver.services();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].id, "behind-link");
    assert!(services[0].root_path.ends_with("svcs/x"));
}

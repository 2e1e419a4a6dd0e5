//! Filesystem scan for `.tusk/config.yaml` files.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::extract::parse_service_config;
use super::DiscoveredService;

/// Directory names never descended into (besides hidden ones).
const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "target",
    "venv",
    "__pycache__",
    "dist",
    "build",
];

/// Relative location of the service config inside a directory.
pub const CONFIG_RELATIVE_PATH: &str = ".tusk/config.yaml";

/// Knobs for the discovery walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Deepest directory level inspected; a root is level 0.
    pub max_depth: usize,
    /// Do not look below a directory that holds a service config.
    pub stop_at_match: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            stop_at_match: true,
        }
    }
}

/// Directories already walked, keyed by canonical path, shared across roots.
#[derive(Debug, Default)]
struct Visited {
    /// Levels left below each directory when it was last walked.
    remaining: HashMap<PathBuf, usize>,
    /// Directories whose config has already been recorded.
    services: HashSet<PathBuf>,
}

impl Visited {
    /// Record a visit. False when an earlier visit already walked at least
    /// as far below this directory.
    fn enter(&mut self, dir: PathBuf, remaining: usize) -> bool {
        match self.remaining.get(&dir) {
            Some(&seen) if seen >= remaining => false,
            _ => {
                self.remaining.insert(dir, remaining);
                true
            }
        }
    }
}

fn is_skipped(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.iter().any(|d| *d == name)
}

/// Walk every root and collect service configs. Blocking; run it off the
/// async executor.
///
/// Unreadable roots, directories and files are skipped silently.
pub fn scan(roots: &[PathBuf], options: DiscoveryOptions) -> Vec<DiscoveredService> {
    let mut visited = Visited::default();
    let mut found = Vec::new();

    for root in roots {
        let root = fs::canonicalize(root).unwrap_or_else(|_| root.clone());
        debug!(root = %root.display(), "Scanning for service configs");
        scan_root(&root, options, &mut visited, &mut found);
    }

    found
}

fn scan_root(
    root: &Path,
    options: DiscoveryOptions,
    visited: &mut Visited,
    found: &mut Vec<DiscoveredService>,
) {
    let mut entries = WalkDir::new(root)
        .follow_links(true)
        .max_depth(options.max_depth)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                trace!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.depth() > 0 && is_skipped(entry.file_name()) {
            entries.skip_current_dir();
            continue;
        }

        let canonical = fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
        let remaining = options.max_depth.saturating_sub(entry.depth());
        if !visited.enter(canonical.clone(), remaining) {
            entries.skip_current_dir();
            continue;
        }

        if let Some(service) = read_service(entry.path()) {
            if visited.services.insert(canonical) {
                debug!(
                    id = %service.id,
                    name = %service.name,
                    root = %service.root_path.display(),
                    "Discovered service"
                );
                found.push(service);
            }
            if options.stop_at_match {
                entries.skip_current_dir();
            }
        }
    }
}

fn read_service(dir: &Path) -> Option<DiscoveredService> {
    let config_path = dir.join(CONFIG_RELATIVE_PATH);
    let text = fs::read_to_string(&config_path).ok()?;
    let Some((id, name)) = parse_service_config(&text) else {
        debug!(path = %config_path.display(), "Service config has no usable id");
        return None;
    };

    let name = name.unwrap_or_else(|| {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone())
    });

    Some(DiscoveredService {
        id,
        name,
        config_path,
        root_path: dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revisit_only_with_more_depth_left() {
        let mut visited = Visited::default();
        let dir = PathBuf::from("/ws/svcs");
        assert!(visited.enter(dir.clone(), 0));
        assert!(!visited.enter(dir.clone(), 0));
        assert!(visited.enter(dir.clone(), 2));
        assert!(!visited.enter(dir, 1));
    }

    #[test]
    fn test_skip_rules() {
        assert!(is_skipped(OsStr::new(".git")));
        assert!(is_skipped(OsStr::new(".venv")));
        assert!(is_skipped(OsStr::new("node_modules")));
        assert!(is_skipped(OsStr::new("target")));
        assert!(!is_skipped(OsStr::new("services")));
        assert!(!is_skipped(OsStr::new("builder")));
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let found = scan(
            &[PathBuf::from("/definitely/not/a/real/root")],
            DiscoveryOptions::default(),
        );
        assert!(found.is_empty());
    }
}

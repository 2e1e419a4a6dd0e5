//! Service resolution.
//!
//! A [`ServiceResolver`] is built once per process with the configured
//! default id, filled by [`ServiceResolver::discover`], and then asked for a
//! concrete service id on every tool call.

mod discovery;
mod extract;

pub use discovery::{DiscoveryOptions, CONFIG_RELATIVE_PATH};
pub use extract::parse_service_config;

use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{info, warn};

/// A service config found on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredService {
    pub id: String,
    pub name: String,
    pub config_path: PathBuf,
    pub root_path: PathBuf,
}

impl DiscoveredService {
    fn label(&self) -> String {
        format!("{} ({}) at {}", self.name, self.id, self.root_path.display())
    }
}

/// No single service id could be chosen.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error(
        "No Tusk Drift service configured. Pass `observableServiceId` with the request, \
         or add a .tusk/config.yaml with a `service.id` under a workspace root \
         (or set TUSK_DRIFT_SERVICE_ID)."
    )]
    NoService,

    #[error("{}", ambiguous_message(.candidates))]
    Ambiguous { candidates: Vec<DiscoveredService> },
}

fn ambiguous_message(candidates: &[DiscoveredService]) -> String {
    let mut message = format!(
        "Found {} Tusk Drift services; pass `observableServiceId` to choose one:",
        candidates.len()
    );
    for service in candidates {
        message.push_str("\n  - ");
        message.push_str(&service.label());
    }
    message
}

/// Per-process resolution context: the configured default plus the most
/// recent discovery result.
#[derive(Debug)]
pub struct ServiceResolver {
    default_service_id: Option<String>,
    options: DiscoveryOptions,
    services: RwLock<Arc<[DiscoveredService]>>,
}

impl ServiceResolver {
    pub fn new(default_service_id: Option<String>, options: DiscoveryOptions) -> Self {
        let default_service_id = default_service_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        Self {
            default_service_id,
            options,
            services: RwLock::new(Arc::from(Vec::new())),
        }
    }

    pub fn default_service_id(&self) -> Option<&str> {
        self.default_service_id.as_deref()
    }

    pub fn options(&self) -> DiscoveryOptions {
        self.options
    }

    /// Scan `roots` (the current directory when empty) and replace the
    /// service list. Returns the number of services found.
    pub async fn discover(&self, roots: &[PathBuf]) -> usize {
        let roots = if roots.is_empty() {
            vec![std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))]
        } else {
            roots.to_vec()
        };
        let options = self.options;

        let found = match tokio::task::spawn_blocking(move || discovery::scan(&roots, options)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Service discovery task failed; keeping previous results");
                return self.services().len();
            }
        };

        let count = found.len();
        self.replace(found);
        info!(count, "Service discovery complete");
        count
    }

    /// Swap in a new service list.
    pub fn replace(&self, services: Vec<DiscoveredService>) {
        let services: Arc<[DiscoveredService]> = Arc::from(services);
        match self.services.write() {
            Ok(mut guard) => *guard = services,
            Err(poisoned) => *poisoned.into_inner() = services,
        }
    }

    /// Snapshot of the current list.
    pub fn services(&self) -> Arc<[DiscoveredService]> {
        match self.services.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Pick the service id for a request.
    ///
    /// An explicit non-blank id wins and is returned verbatim, then the
    /// configured default, then the only discovered service.
    pub fn resolve_service_id(&self, provided: Option<&str>) -> Result<String, ResolveError> {
        if let Some(id) = provided.filter(|id| !id.trim().is_empty()) {
            return Ok(id.to_string());
        }
        if let Some(ref id) = self.default_service_id {
            return Ok(id.clone());
        }

        let services = self.services();
        match services.len() {
            0 => Err(ResolveError::NoService),
            1 => Ok(services[0].id.clone()),
            _ => Err(ResolveError::Ambiguous {
                candidates: services.to_vec(),
            }),
        }
    }

    pub fn has_services(&self) -> bool {
        self.default_service_id.is_some() || !self.services().is_empty()
    }

    /// Summary for assistant-facing instructions.
    pub fn services_description(&self) -> String {
        let services = self.services();

        let mut text = match (&self.default_service_id, services.len()) {
            (Some(id), _) => format!(
                "Default service: {id}. It is used when `observableServiceId` is omitted."
            ),
            (None, 0) => "No services were discovered and no default is configured. \
                          Pass `observableServiceId` with every tool call."
                .to_string(),
            (None, 1) => format!(
                "One service is available: {}. It is used when `observableServiceId` is omitted.",
                services[0].label()
            ),
            (None, n) => format!(
                "{n} services are available. Pass `observableServiceId` with every tool call:"
            ),
        };

        let list_all = services.len() > 1 || (self.default_service_id.is_some() && !services.is_empty());
        if list_all {
            if self.default_service_id.is_some() {
                text.push_str("\nDiscovered services:");
            }
            for service in services.iter() {
                text.push_str("\n  - ");
                text.push_str(&service.label());
            }
        }
        text
    }
}

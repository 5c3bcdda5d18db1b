// SQLite Reconcile - Core Library
// Reconciliation Service API over SQLite tables, shared by the CLI, the
// HTTP server and tests

pub mod error;
pub mod defaults;
pub mod store;
pub mod config;
pub mod scoring;
pub mod query;
pub mod batch;
pub mod extend;
pub mod suggest;
pub mod manifest;
pub mod request;
pub mod permissions;
pub mod settings;
pub mod api;
pub mod import;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use error::{ReconcileError, Result};
pub use store::{EntityStore, Row, SqlValue, SqliteStore};
pub use config::{check_config, EntityType, PropertySetting, ReconcileConfig};
pub use query::{find_candidates, ReconciliationCandidate, ReconciliationQuery};
pub use batch::{parse_batch, reconcile_batch, BatchResults};
pub use extend::{extend, ExtendRequest, ExtendResponse};
pub use suggest::{SuggestResponse, Suggestion};
pub use manifest::{build_manifest, ServiceManifest};
pub use request::{RequestOrigin, ServiceRequest};
pub use permissions::{check_view_permissions, AllowAll, PermissionPolicy};
pub use settings::ServiceSettings;
pub use api::{ReconcileApi, ReconcileResponse};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

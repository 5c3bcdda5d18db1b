// 🌐 Reconciliation API facade
// What the routing layer calls: one entry point per endpoint, each taking a
// `ServiceRequest` and answering with a serializable document.

use crate::batch::{parse_batch, reconcile_batch, BatchResults};
use crate::config::{check_config, ReconcileConfig};
use crate::defaults::DEFAULT_LIMIT;
use crate::error::Result;
use crate::extend::{extend, ExtendRequest, ExtendResponse};
use crate::manifest::{build_manifest, ServiceManifest};
use crate::permissions::{check_view_permissions, PermissionPolicy};
use crate::request::ServiceRequest;
use crate::store::EntityStore;
use crate::suggest::{self, SuggestResponse};
use serde::Serialize;
use serde_json::{Map, Value};

/// Answer of the root endpoint, depending on which parameter was sent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReconcileResponse {
    Manifest(ServiceManifest),
    Batch(BatchResults),
    Extend(ExtendResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposedProperty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyProposal {
    pub limit: usize,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub properties: Vec<ProposedProperty>,
}

pub struct ReconcileApi<'a, S: EntityStore + ?Sized> {
    store: &'a S,
    config: ReconcileConfig,
    database: String,
    table: String,
}

impl<'a, S: EntityStore + ?Sized> ReconcileApi<'a, S> {
    /// Resolve the table's configuration, then check the actor may see it
    pub fn for_request<P: PermissionPolicy + ?Sized>(
        raw: Option<&Map<String, Value>>,
        policy: &P,
        store: &'a S,
        database: &str,
        table: &str,
        actor: Option<&str>,
    ) -> Result<Self> {
        let config = check_config(raw, store, table)?;
        check_view_permissions(policy, actor, database, table)?;

        Ok(ReconcileApi {
            store,
            config,
            database: database.to_string(),
            table: table.to_string(),
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// `queries` runs a batch, `extend` fetches properties, neither returns
    /// the manifest
    pub fn reconcile(&self, request: &ServiceRequest) -> Result<ReconcileResponse> {
        if let Some(queries) = request.param("queries") {
            let value: Value = serde_json::from_str(queries)?;
            let queries = parse_batch(&value)?;
            let results = reconcile_batch(self.store, &self.config, &self.table, &queries)?;
            return Ok(ReconcileResponse::Batch(results));
        }

        if let Some(raw) = request.param("extend") {
            let value: Value = serde_json::from_str(raw)?;
            let extend_request = ExtendRequest::from_value(&value)?;
            let response = extend(self.store, &self.config, &self.table, &extend_request)?;
            return Ok(ReconcileResponse::Extend(response));
        }

        Ok(ReconcileResponse::Manifest(build_manifest(
            &self.config,
            &self.database,
            &self.table,
            &request.origin,
        )))
    }

    pub fn propose_properties(&self, request: &ServiceRequest) -> Result<PropertyProposal> {
        let limit = request.usize_param("limit", DEFAULT_LIMIT)?;

        Ok(PropertyProposal {
            limit,
            type_: request.param("type").map(str::to_string),
            properties: self
                .config
                .properties
                .iter()
                .take(limit)
                .map(|p| ProposedProperty {
                    id: p.name.clone(),
                    name: p.label.clone(),
                })
                .collect(),
        })
    }

    pub fn suggest_entity(&self, request: &ServiceRequest) -> Result<SuggestResponse> {
        let prefix = request.param("prefix").unwrap_or_default();
        let cursor = request.usize_param("cursor", 0)?;
        suggest::suggest_entity(self.store, &self.config, &self.table, prefix, cursor).map(Into::into)
    }

    pub fn suggest_property(&self, request: &ServiceRequest) -> Result<SuggestResponse> {
        let prefix = request.param("prefix").unwrap_or_default();
        let cursor = request.usize_param("cursor", 0)?;
        Ok(suggest::suggest_property(&self.config, prefix, cursor).into())
    }

    pub fn suggest_type(&self, request: &ServiceRequest) -> Result<SuggestResponse> {
        let prefix = request.param("prefix").unwrap_or_default();
        suggest::suggest_type(self.store, &self.config, &self.table, prefix).map(Into::into)
    }
}

// 📜 Service Manifest Builder
// The capability document a client fetches before sending any queries.

use crate::config::{EntityType, PropertySetting, ReconcileConfig};
use crate::defaults::SUPPORTED_API_VERSIONS;
use crate::request::RequestOrigin;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceManifest {
    pub versions: Vec<String>,
    pub name: String,
    #[serde(rename = "identifierSpace")]
    pub identifier_space: String,
    #[serde(rename = "schemaSpace")]
    pub schema_space: String,
    #[serde(rename = "defaultTypes")]
    pub default_types: Vec<EntityType>,
    pub view: ViewTemplate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extend: Option<ExtendCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggest: Option<SuggestCapability>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewTemplate {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEndpoint {
    pub service_url: String,
    pub service_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendCapability {
    pub propose_properties: ServiceEndpoint,
    pub property_settings: Vec<PropertySetting>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestCapability {
    pub entity: ServiceEndpoint,
    #[serde(rename = "type")]
    pub type_: ServiceEndpoint,
    pub property: ServiceEndpoint,
}

pub fn build_manifest(
    config: &ReconcileConfig,
    database: &str,
    table: &str,
    origin: &RequestOrigin,
) -> ServiceManifest {
    let view_url = config
        .view_url
        .clone()
        .unwrap_or_else(|| row_url_template(origin, database, table));

    let (extend, suggest) = if config.properties.is_empty() {
        (None, None)
    } else {
        let endpoint = |path: &str| ServiceEndpoint {
            service_url: origin.service_url(),
            service_path: format!(
                "{}/{}/-/reconcile/{}",
                urlencoding::encode(database),
                urlencoding::encode(table),
                path
            ),
        };

        (
            Some(ExtendCapability {
                propose_properties: endpoint("extend/propose"),
                property_settings: config.properties.clone(),
            }),
            Some(SuggestCapability {
                entity: endpoint("suggest/entity"),
                type_: endpoint("suggest/type"),
                property: endpoint("suggest/property"),
            }),
        )
    };

    ServiceManifest {
        versions: SUPPORTED_API_VERSIONS.iter().map(|v| v.to_string()).collect(),
        name: config
            .service_name
            .clone()
            .unwrap_or_else(|| format!("{} {} reconciliation", database, table)),
        identifier_space: config.identifier_space.clone(),
        schema_space: config.schema_space.clone(),
        default_types: config.default_types(),
        view: ViewTemplate { url: view_url },
        extend,
        suggest,
    }
}

/// Absolute row URL with the `{{id}}` placeholder clients substitute
fn row_url_template(origin: &RequestOrigin, database: &str, table: &str) -> String {
    format!(
        "{}{}/{}/{{{{id}}}}",
        origin.service_url(),
        urlencoding::encode(database),
        urlencoding::encode(table)
    )
}

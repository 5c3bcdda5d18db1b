// 🌐 HTTP surface - axum router over the reconciliation API
// Every route answers GET and POST; query-string and form fields are
// merged, form fields winning.

use crate::api::ReconcileApi;
use crate::error::{ReconcileError, Result};
use crate::request::{RequestOrigin, ServiceRequest};
use crate::settings::ServiceSettings;
use crate::store::SqliteStore;
use axum::{
    extract::{Form, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

type Params = HashMap<String, String>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    settings: Arc<ServiceSettings>,
    stores: Arc<HashMap<String, Arc<Mutex<SqliteStore>>>>,
}

impl AppState {
    /// Open every database named in the settings
    pub fn open(settings: ServiceSettings) -> Result<Self> {
        let mut stores = HashMap::new();
        for (name, db) in &settings.databases {
            if !db.path.exists() {
                return Err(ReconcileError::Settings(format!(
                    "database '{}' not found at {}",
                    name,
                    db.path.display()
                )));
            }
            tracing::info!(database = %name, path = %db.path.display(), "opened database");
            stores.insert(name.clone(), SqliteStore::open(&db.path)?);
        }
        Ok(Self::with_stores(settings, stores))
    }

    /// Use already-open stores, keyed by database name
    pub fn with_stores(settings: ServiceSettings, stores: HashMap<String, SqliteStore>) -> Self {
        AppState {
            settings: Arc::new(settings),
            stores: Arc::new(
                stores
                    .into_iter()
                    .map(|(name, store)| (name, Arc::new(Mutex::new(store))))
                    .collect(),
            ),
        }
    }

    fn store(&self, database: &str) -> Result<Arc<Mutex<SqliteStore>>> {
        self.settings.database(database)?;
        self.stores
            .get(database)
            .cloned()
            .ok_or_else(|| ReconcileError::NotFound(format!("Database not found: {}", database)))
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/:database/:table/-/reconcile", get(reconcile).post(reconcile))
        .route(
            "/:database/:table/-/reconcile/extend/propose",
            get(propose_properties).post(propose_properties),
        )
        .route(
            "/:database/:table/-/reconcile/properties",
            get(propose_properties).post(propose_properties),
        )
        .route(
            "/:database/:table/-/reconcile/suggest/entity",
            get(suggest_entity).post(suggest_entity),
        )
        .route(
            "/:database/:table/-/reconcile/suggest/property",
            get(suggest_property).post(suggest_property),
        )
        .route(
            "/:database/:table/-/reconcile/suggest/type",
            get(suggest_type).post(suggest_type),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ============================================================================
// HANDLERS
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Reconcile,
    ProposeProperties,
    SuggestEntity,
    SuggestProperty,
    SuggestType,
}

async fn reconcile(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
    Query(query): Query<Params>,
    headers: HeaderMap,
    form: Option<Form<Params>>,
) -> Result<Json<Value>> {
    dispatch(state, Endpoint::Reconcile, database, table, query, headers, form).await
}

async fn propose_properties(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
    Query(query): Query<Params>,
    headers: HeaderMap,
    form: Option<Form<Params>>,
) -> Result<Json<Value>> {
    dispatch(state, Endpoint::ProposeProperties, database, table, query, headers, form).await
}

async fn suggest_entity(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
    Query(query): Query<Params>,
    headers: HeaderMap,
    form: Option<Form<Params>>,
) -> Result<Json<Value>> {
    dispatch(state, Endpoint::SuggestEntity, database, table, query, headers, form).await
}

async fn suggest_property(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
    Query(query): Query<Params>,
    headers: HeaderMap,
    form: Option<Form<Params>>,
) -> Result<Json<Value>> {
    dispatch(state, Endpoint::SuggestProperty, database, table, query, headers, form).await
}

async fn suggest_type(
    State(state): State<AppState>,
    Path((database, table)): Path<(String, String)>,
    Query(query): Query<Params>,
    headers: HeaderMap,
    form: Option<Form<Params>>,
) -> Result<Json<Value>> {
    dispatch(state, Endpoint::SuggestType, database, table, query, headers, form).await
}

async fn dispatch(
    state: AppState,
    endpoint: Endpoint,
    database: String,
    table: String,
    query: Params,
    headers: HeaderMap,
    form: Option<Form<Params>>,
) -> Result<Json<Value>> {
    let request = service_request(&state.settings, &headers, query, form.map(|Form(f)| f));
    let store = state.store(&database)?;
    let settings = Arc::clone(&state.settings);

    // rusqlite is blocking; keep it off the async workers
    let value = tokio::task::spawn_blocking(move || -> Result<Value> {
        let store = store
            .lock()
            .map_err(|_| ReconcileError::Internal("store lock poisoned".to_string()))?;
        let raw = settings.table_settings(&database, &table)?;
        let api = ReconcileApi::for_request(
            raw,
            settings.as_ref(),
            &*store,
            &database,
            &table,
            request.actor.as_deref(),
        )?;

        let value = match endpoint {
            Endpoint::Reconcile => serde_json::to_value(api.reconcile(&request)?)?,
            Endpoint::ProposeProperties => serde_json::to_value(api.propose_properties(&request)?)?,
            Endpoint::SuggestEntity => serde_json::to_value(api.suggest_entity(&request)?)?,
            Endpoint::SuggestProperty => serde_json::to_value(api.suggest_property(&request)?)?,
            Endpoint::SuggestType => serde_json::to_value(api.suggest_type(&request)?)?,
        };
        Ok(value)
    })
    .await
    .map_err(|e| ReconcileError::Internal(e.to_string()))??;

    Ok(Json(value))
}

/// Build the core's view of the request from axum's parts
fn service_request(
    settings: &ServiceSettings,
    headers: &HeaderMap,
    query: Params,
    form: Option<Params>,
) -> ServiceRequest {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let origin = RequestOrigin::new("http", header_str(header::HOST.as_str()).unwrap_or_else(|| "localhost".to_string()))
        .with_forwarded_proto(header_str("x-forwarded-proto"))
        .with_base_url(&settings.base_url);

    let actor = header_str(header::AUTHORIZATION.as_str())
        .and_then(|auth| auth.strip_prefix("Bearer ").map(|t| t.trim().to_string()))
        .and_then(|token| settings.actor_for_token(&token).map(str::to_string));

    let mut params = query;
    params.extend(form.unwrap_or_default());

    ServiceRequest {
        origin,
        params,
        actor,
    }
}

// ============================================================================
// ERROR RESPONSES
// ============================================================================

impl IntoResponse for ReconcileError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.error_code(), error = %self, "request rejected");
        }

        let body = json!({
            "ok": false,
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ServiceSettings {
        ServiceSettings::from_toml_str(
            r#"
base_url = "/data/"

[actors]
t0ken = "alice"

[databases.test]
path = "/tmp/test.db"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_service_request_merges_params() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "example.org".parse().unwrap());
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Bearer t0ken".parse().unwrap());

        let query: Params = [("prefix".to_string(), "Fi".to_string()), ("cursor".to_string(), "1".to_string())].into();
        let form: Params = [("cursor".to_string(), "2".to_string())].into();

        let request = service_request(&settings(), &headers, query, Some(form));
        assert_eq!(request.param("prefix"), Some("Fi"));
        assert_eq!(request.param("cursor"), Some("2"));
        assert_eq!(request.actor.as_deref(), Some("alice"));
        assert_eq!(request.origin.service_url(), "https://example.org/data/");
    }

    #[test]
    fn test_unknown_token_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer nope".parse().unwrap());

        let request = service_request(&settings(), &headers, Params::new(), None);
        assert_eq!(request.actor, None);
        assert_eq!(request.origin.host, "localhost");
    }

    #[test]
    fn test_error_response_status() {
        let response = ReconcileError::NotFound("Database not found: x".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ReconcileError::bad_query("Query must be a string").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
